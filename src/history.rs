use tracing::debug;

use crate::location::{ItemType, Location};

/// Total cache bytes kept across the whole history by default.
pub const DEFAULT_CACHE_LIMIT: usize = 2 * 1024 * 1024;

/// Shown instead of silently replaying a search when going back to it.
const QUERY_NOT_CACHED: &str = "3Query not in cache\n\
i\n\
iThis location is not available in the local cache. Search queries are not \
reissued automatically. If you wish to force a reload, press F5.\n";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("out of memory")]
pub struct OutOfMemory;

/// How a view last showed a node. `None` means the view has not been there
/// yet and should pick its own defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub selected_line: Option<usize>,
    pub scroll_offset: Option<usize>,
}

impl DisplayState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone)]
pub struct HistoryNode {
    pub location: Location,
    pub cache: Option<Vec<u8>>,
    pub display: DisplayState,
}

impl HistoryNode {
    fn new(location: Location) -> Self {
        Self {
            location,
            cache: None,
            display: DisplayState::default(),
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.as_ref().map_or(0, Vec::len)
    }

    /// Stores a fetched body, failing instead of aborting when memory is short.
    pub fn store(&mut self, body: &[u8]) -> Result<(), OutOfMemory> {
        let mut cache = Vec::new();
        cache.try_reserve_exact(body.len()).map_err(|_| OutOfMemory)?;
        cache.extend_from_slice(body);
        self.cache = Some(cache);
        Ok(())
    }

    /// Forgets the cached body and how it was displayed, forcing a reload.
    pub fn invalidate(&mut self) {
        self.cache = None;
        self.display.reset();
    }
}

/// Visited locations, most recent last. The first node (the start page) is
/// never removed, so the stack is never empty.
#[derive(Debug)]
pub struct History {
    nodes: Vec<HistoryNode>,
    cache_limit: usize,
}

impl History {
    pub fn new(root: Location) -> Self {
        Self::with_cache_limit(root, DEFAULT_CACHE_LIMIT)
    }

    pub fn with_cache_limit(root: Location, cache_limit: usize) -> Self {
        Self {
            nodes: vec![HistoryNode::new(root)],
            cache_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn current(&self) -> &HistoryNode {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut HistoryNode {
        let top = self.nodes.len() - 1;
        &mut self.nodes[top]
    }

    /// The node [`History::back`] would reveal.
    pub fn previous(&self) -> Option<&HistoryNode> {
        self.nodes.len().checked_sub(2).map(|idx| &self.nodes[idx])
    }

    /// Nodes from the most recent to the root.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryNode> {
        self.nodes.iter().rev()
    }

    /// Pushes a location. Adding the location that going back would reveal
    /// is treated as going back, so bouncing between two pages does not
    /// grow the stack.
    pub fn add(&mut self, location: Location) -> Result<(), OutOfMemory> {
        if self
            .previous()
            .is_some_and(|prev| prev.location.same_resource(&location))
        {
            debug!(url = %location, "history add collapsed into back");
            self.back();
            return Ok(());
        }
        self.nodes.try_reserve(1).map_err(|_| OutOfMemory)?;
        debug!(url = %location, depth = self.nodes.len() + 1, "history add");
        self.nodes.push(HistoryNode::new(location));
        Ok(())
    }

    /// Drops the current node unless it is the root. If that exposes a search
    /// whose results are gone, a placeholder explaining why is cached instead
    /// of re-running the query.
    pub fn back(&mut self) {
        if self.nodes.len() > 1 {
            self.nodes.pop();
        }
        let top = self.current_mut();
        if top.location.item_type == ItemType::IndexSearch && top.cache.is_none() {
            // losing the placeholder to low memory only means a reload later
            let _ = top.store(QUERY_NOT_CACHED.as_bytes());
        }
        debug!(depth = self.nodes.len(), "history back");
    }

    /// Sums cache sizes from the most recent node down and empties every
    /// cache from the point where the running total first exceeds the limit.
    pub fn cleanup_cache(&mut self) {
        let mut total = 0usize;
        let limit = self.cache_limit;
        for node in self.nodes.iter_mut().rev() {
            total += node.cache_size();
            if total > limit && node.cache.is_some() {
                debug!(url = %node.location, total, limit, "evicting cached page");
                node.cache = None;
            }
        }
    }

    pub fn total_cache_size(&self) -> usize {
        self.nodes.iter().map(HistoryNode::cache_size).sum()
    }

    /// Releases every node and reports how many there were.
    pub fn flush(self) -> usize {
        let nodes = self.nodes.len();
        let bytes = self.total_cache_size();
        drop(self);
        debug!(nodes, bytes, "history flushed");
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(selector: &str) -> Location {
        Location::gopher("example.com", 70, ItemType::Directory, selector)
    }

    fn history() -> History {
        History::new(Location::parse("gopher://#welcome").unwrap())
    }

    #[test]
    fn root_is_never_popped() {
        let mut h = history();
        h.back();
        h.back();
        assert_eq!(h.len(), 1);
        assert_eq!(h.current().location.host, "#welcome");
    }

    #[test]
    fn add_and_back() {
        let mut h = history();
        h.add(dir("/a")).unwrap();
        h.add(dir("/b")).unwrap();
        assert_eq!(h.len(), 3);
        assert_eq!(h.current().location.selector, b"/b");
        h.back();
        assert_eq!(h.current().location.selector, b"/a");
    }

    #[test]
    fn re_adding_the_back_target_goes_back() {
        let mut h = history();
        h.add(dir("/a")).unwrap();
        h.add(dir("/b")).unwrap();
        for _ in 0..5 {
            let depth = h.len();
            h.add(dir("/a")).unwrap();
            assert!(h.len() < depth || h.current().location.selector == b"/a");
            h.add(dir("/b")).unwrap();
        }
        assert_eq!(h.len(), 3);
        h.add(dir("/a")).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.current().location.selector, b"/a");
    }

    #[test]
    fn flush_releases_every_node() {
        let mut h = history();
        h.add(dir("/a")).unwrap();
        h.current_mut().store(b"cached").unwrap();
        h.add(dir("/b")).unwrap();
        assert_eq!(h.flush(), 3);
    }

    #[test]
    fn adding_the_current_location_pushes() {
        let mut h = history();
        h.add(dir("/a")).unwrap();
        h.add(dir("/a")).unwrap();
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn new_nodes_have_unset_display_state() {
        let mut h = history();
        h.add(dir("/a")).unwrap();
        assert_eq!(h.current().display, DisplayState::default());
        assert!(h.current().cache.is_none());
    }

    #[test]
    fn back_to_uncached_query_gets_placeholder() {
        let mut h = history();
        h.add(Location::gopher("h", 70, ItemType::IndexSearch, "/search\tcats"))
            .unwrap();
        h.add(dir("/result")).unwrap();
        h.back();
        let cache = h.current().cache.as_deref().unwrap();
        assert!(cache.starts_with(b"3Query not in cache"));
        assert!(std::str::from_utf8(cache).unwrap().contains("F5"));
    }

    #[test]
    fn back_keeps_cached_query_results() {
        let mut h = history();
        h.add(Location::gopher("h", 70, ItemType::IndexSearch, "/s\tq"))
            .unwrap();
        h.current_mut().store(b"1Result\t/r\th\t70\n").unwrap();
        h.add(dir("/r")).unwrap();
        h.back();
        assert_eq!(h.current().cache.as_deref(), Some(&b"1Result\t/r\th\t70\n"[..]));
    }

    #[test]
    fn invalidate_resets_cache_and_display() {
        let mut h = history();
        let node = h.current_mut();
        node.store(b"data").unwrap();
        node.display.selected_line = Some(3);
        node.display.scroll_offset = Some(1);
        node.invalidate();
        assert!(node.cache.is_none());
        assert_eq!(node.display, DisplayState::default());
    }

    #[test]
    fn cleanup_keeps_total_under_limit() {
        let mut h = History::with_cache_limit(dir("/root"), 100);
        for (i, size) in [40usize, 30, 50, 20].iter().enumerate() {
            h.add(dir(&format!("/{i}"))).unwrap();
            h.current_mut().store(&vec![b'x'; *size]).unwrap();
        }
        h.cleanup_cache();
        // from the top: 20, 70, 100 kept; 140 exceeds
        let sizes: Vec<usize> = h.iter().map(HistoryNode::cache_size).collect();
        assert_eq!(sizes, [20, 50, 30, 0, 0]);
        assert!(h.total_cache_size() <= 100);
    }

    #[test]
    fn cleanup_drops_everything_past_the_first_overflow() {
        let mut h = History::with_cache_limit(dir("/root"), 100);
        for (i, size) in [10usize, 150, 10].iter().enumerate() {
            h.add(dir(&format!("/{i}"))).unwrap();
            h.current_mut().store(&vec![b'x'; *size]).unwrap();
        }
        h.cleanup_cache();
        let sizes: Vec<usize> = h.iter().map(HistoryNode::cache_size).collect();
        assert_eq!(sizes, [10, 0, 0, 0]);
    }

    #[test]
    fn default_limit_is_two_mebibytes() {
        let mut h = history();
        for i in 0..5 {
            h.add(dir(&format!("/{i}"))).unwrap();
            h.current_mut().store(&vec![0u8; 700 * 1024]).unwrap();
        }
        h.cleanup_cache();
        assert!(h.total_cache_size() <= DEFAULT_CACHE_LIMIT);
        assert_eq!(h.current().cache_size(), 700 * 1024);
    }
}
