use anyhow::Result;

use crate::browser::{Browser, ViewOrder};
use crate::embedded;
use crate::history::{DisplayState, OutOfMemory};
use crate::location::ItemType;
use crate::menu::{badge, Menu, BADGE_WIDTH};
use crate::net::Transport;
use crate::screen::{Key, Screen};
use crate::ui::{self, draw_field, draw_status_bar, LineEditor};

const QUERY_PROMPT: &str = "Enter a query: ";
const QUERY_MAX_LEN: usize = 63;
const QUERY_FIELD_WIDTH: u16 = 64;

/// Selection and scroll position in a menu. The selection, when there is
/// one, always sits on the first row of a selectable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuCursor {
    pub selected: Option<usize>,
    pub offset: usize,
}

impl MenuCursor {
    pub fn restore(display: DisplayState, menu: &Menu) -> Self {
        let selected = display
            .selected_line
            .filter(|&line| menu.is_selectable(line))
            .or_else(|| menu.first_link());
        Self {
            selected,
            offset: display.scroll_offset.unwrap_or(0),
        }
    }

    pub fn save(self) -> DisplayState {
        DisplayState {
            selected_line: self.selected,
            scroll_offset: Some(self.offset),
        }
    }

    /// Applies a movement key for a viewport `visible` rows tall. Returns
    /// `false` for keys that are not movements.
    pub fn navigate(&mut self, key: Key, menu: &Menu, visible: usize) -> bool {
        // rows below the top one: the furthest a selection may sit from `offset`
        let span = visible.saturating_sub(1);
        let jump = span.max(1);

        match key {
            Key::Home => {
                if self.selected.is_some() {
                    self.selected = menu.first_link();
                }
                self.offset = 0;
            }
            Key::End => {
                if self.selected.is_some() {
                    self.selected = menu.last_link();
                }
                self.offset = menu.len().saturating_sub(span);
            }
            Key::Up => match self.selected.and_then(|sel| menu.previous_link(sel)) {
                Some(prev) => self.selected = Some(prev),
                None => {
                    // nothing above: scroll without touching the selection
                    self.offset = self.offset.saturating_sub(1);
                    return true;
                }
            },
            Key::Down => {
                if self.selected.is_some_and(|sel| sel > self.offset + span) {
                    // selection is below the viewport; bring it closer first
                    self.offset += 1;
                    return true;
                }
                match self.selected.and_then(|sel| menu.next_link(sel)) {
                    Some(next) => self.selected = Some(next),
                    None => {
                        if self.offset < menu.len().saturating_sub(span) {
                            self.offset += 1;
                        }
                        return true;
                    }
                }
            }
            Key::PageUp => {
                if let (Some(sel), Some(first)) = (self.selected, menu.first_link()) {
                    let target = sel.saturating_sub(jump).max(first);
                    self.selected = if menu.is_selectable(target) {
                        Some(target)
                    } else {
                        menu.previous_link(target).or(Some(first))
                    };
                }
            }
            Key::PageDown => {
                if let (Some(sel), Some(last)) = (self.selected, menu.last_link()) {
                    let target = (sel + jump).min(last);
                    self.selected = if menu.is_selectable(target) {
                        Some(target)
                    } else {
                        menu.next_link(target).or(Some(last))
                    };
                }
            }
            _ => return false,
        }

        if let Some(sel) = self.selected {
            if sel < self.offset {
                self.offset = sel;
            } else if sel > self.offset + span {
                self.offset = sel - span;
            }
        }
        true
    }
}

/// `selector<TAB>query`, without aborting if memory runs out.
pub fn compose_query(selector: &[u8], query: &str) -> Result<Vec<u8>, OutOfMemory> {
    let mut composed = Vec::new();
    composed
        .try_reserve_exact(selector.len() + query.len() + 1)
        .map_err(|_| OutOfMemory)?;
    composed.extend_from_slice(selector);
    composed.push(b'\t');
    composed.extend_from_slice(query.as_bytes());
    Ok(composed)
}

impl<S: Screen, T: Transport> Browser<S, T> {
    pub(crate) fn display_menu(&mut self) -> Result<ViewOrder> {
        let cols = usize::from(self.screen.cols());
        let menu = Menu::parse(
            self.history.current().cache.as_deref().unwrap_or_default(),
            cols,
        );
        let mut cursor = MenuCursor::restore(self.history.current().display, &menu);
        let mut drawn = None;

        loop {
            self.history.current_mut().display = cursor.save();
            if drawn != Some(cursor) || !self.status.is_empty() {
                self.draw_menu(&menu, cursor);
                drawn = Some(cursor);
            }

            match self.screen.get_key()? {
                Key::Backspace => return Ok(ViewOrder::Back),
                Key::Tab => {
                    let current = self.history.current().location.clone();
                    if let Some(next) =
                        ui::edit_url(&mut self.screen, &self.theme, &mut self.status, &current)?
                    {
                        self.history.add(next)?;
                        return Ok(ViewOrder::None);
                    }
                }
                key @ (Key::Enter | Key::F9) => {
                    if self.activate(&menu, cursor, key)? {
                        return Ok(ViewOrder::None);
                    }
                    drawn = None;
                }
                Key::Escape => {
                    if ui::confirm_quit(&mut self.screen, &self.theme)? {
                        return Ok(ViewOrder::Quit);
                    }
                    drawn = None;
                }
                Key::F1 => {
                    self.history.add(embedded::manual())?;
                    return Ok(ViewOrder::None);
                }
                Key::F5 => return Ok(ViewOrder::Refresh),
                Key::Quit => return Ok(ViewOrder::Quit),
                key => {
                    let visible = self.visible_rows();
                    cursor.navigate(key, &menu, visible);
                }
            }
        }
    }

    /// Follows the selected link. F9 saves it instead of showing it, and a
    /// search item asks for a query first. Returns whether a location was
    /// pushed.
    fn activate(&mut self, menu: &Menu, cursor: MenuCursor, key: Key) -> Result<bool> {
        let Some(line) = cursor.selected.and_then(|sel| menu.lines.get(sel)) else {
            return Ok(false);
        };
        let Some(mut target) = line.location.clone() else {
            return Ok(false);
        };

        if target.item_type == ItemType::IndexSearch && key == Key::Enter {
            let Some(query) = self.prompt_query()? else {
                return Ok(false);
            };
            match compose_query(&target.selector, &query) {
                Ok(selector) => target.selector = selector,
                Err(OutOfMemory) => {
                    self.status.set("Out of memory");
                    return Ok(false);
                }
            }
        } else if key == Key::F9 {
            target.item_type = ItemType::Binary;
        }

        self.history.add(target)?;
        Ok(true)
    }

    fn prompt_query(&mut self) -> Result<Option<String>> {
        let row = self.screen.rows().saturating_sub(1);
        draw_status_bar(&mut self.screen, &self.theme, QUERY_PROMPT);
        let col = QUERY_PROMPT.len() as u16;
        let width = QUERY_FIELD_WIDTH.min(self.screen.cols().saturating_sub(col));
        let mut editor = LineEditor::new("", QUERY_MAX_LEN);
        ui::edit_string(
            &mut self.screen,
            &mut editor,
            col,
            row,
            width,
            self.theme.status_info,
        )
    }

    pub(crate) fn visible_rows(&self) -> usize {
        usize::from(self.screen.rows()).saturating_sub(2)
    }

    fn draw_menu(&mut self, menu: &Menu, cursor: MenuCursor) {
        let selected_url = cursor
            .selected
            .and_then(|sel| menu.lines.get(sel))
            .and_then(|line| line.location.as_ref());
        if let Some(url) = selected_url {
            self.status.set(url.to_string());
        }

        let cols = self.screen.cols();
        let theme = self.theme;
        for (row, y) in (cursor.offset..cursor.offset + self.visible_rows()).enumerate() {
            let row = u16::try_from(row + 1).unwrap_or(u16::MAX);
            let Some(line) = menu.lines.get(y) else {
                draw_field(&mut self.screen, "", theme.text, 0, row, cols);
                continue;
            };
            let is_selected = cursor.selected == Some(y);

            let mut xshift = 0;
            if let Some(label) = badge(line.item_type) {
                let attr = if is_selected {
                    theme.menu_current
                } else {
                    theme.menu_type
                };
                self.screen.put_str(label, attr, 0, row);
                self.screen.put_char(' ', attr, 3, row);
                xshift = BADGE_WIDTH as u16;
            }

            let attr = if is_selected {
                theme.menu_current
            } else if line.item_type == ItemType::Error {
                theme.menu_error
            } else if line.is_selectable() {
                theme.menu_selectable
            } else {
                theme.text
            };
            draw_field(
                &mut self.screen,
                &line.text,
                attr,
                xshift,
                row,
                cols.saturating_sub(xshift),
            );
        }

        self.status.draw(&mut self.screen, &self.theme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DownloadConfig, NetworkConfig};
    use crate::history::DEFAULT_CACHE_LIMIT;
    use crate::location::Location;
    use crate::net::mock::MockTransport;
    use crate::net::Fetcher;
    use crate::screen::mock::MockScreen;
    use crate::theme::Theme;

    const SAMPLE: &[u8] = b"iintro\n\
1One\t/1\th\t70\n\
igap\n\
igap\n\
0Two\t/2\th\t70\n\
1Three\t/3\th\t70\n\
itrailer\n";

    fn sample() -> Menu {
        Menu::parse(SAMPLE, 80)
    }

    fn cursor(menu: &Menu) -> MenuCursor {
        MenuCursor::restore(DisplayState::default(), menu)
    }

    #[test]
    fn starts_on_the_first_link() {
        let menu = sample();
        let c = cursor(&menu);
        assert_eq!(c.selected, Some(1));
        assert_eq!(c.offset, 0);
        assert_eq!(
            c.save(),
            DisplayState {
                selected_line: Some(1),
                scroll_offset: Some(0)
            }
        );
    }

    #[test]
    fn down_skips_unselectable_rows_and_stops_at_the_last_link() {
        let menu = sample();
        let mut c = cursor(&menu);
        c.navigate(Key::Down, &menu, 4);
        assert_eq!(c.selected, Some(4));
        c.navigate(Key::Down, &menu, 4);
        assert_eq!(c.selected, Some(5));
        assert_eq!(c.offset, 2);
        for _ in 0..10 {
            c.navigate(Key::Down, &menu, 4);
            assert_eq!(c.selected, Some(5));
        }
        // past the last link Down only scrolls, up to the end of the menu
        assert_eq!(c.offset, 4);
    }

    #[test]
    fn up_at_the_first_link_scrolls_only() {
        let menu = sample();
        let mut c = MenuCursor {
            selected: Some(1),
            offset: 1,
        };
        c.navigate(Key::Up, &menu, 4);
        assert_eq!(c, MenuCursor { selected: Some(1), offset: 0 });
        c.navigate(Key::Up, &menu, 4);
        assert_eq!(c.offset, 0);
    }

    #[test]
    fn up_clamps_the_viewport_to_the_selection() {
        let menu = sample();
        let mut c = MenuCursor {
            selected: Some(4),
            offset: 4,
        };
        c.navigate(Key::Up, &menu, 4);
        assert_eq!(c, MenuCursor { selected: Some(1), offset: 1 });
    }

    #[test]
    fn pages_snap_to_links() {
        let menu = sample();
        let mut c = cursor(&menu);
        c.navigate(Key::PageDown, &menu, 4);
        assert_eq!(c.selected, Some(4));
        c.navigate(Key::PageDown, &menu, 4);
        assert_eq!(c.selected, Some(5));
        c.navigate(Key::PageUp, &menu, 4);
        assert_eq!(c.selected, Some(1));
        assert_eq!(c.offset, 1);
    }

    #[test]
    fn home_and_end() {
        let menu = sample();
        let mut c = cursor(&menu);
        c.navigate(Key::End, &menu, 4);
        assert_eq!(c, MenuCursor { selected: Some(5), offset: 4 });
        c.navigate(Key::Home, &menu, 4);
        assert_eq!(c, MenuCursor { selected: Some(1), offset: 0 });
    }

    #[test]
    fn menus_without_links_just_scroll() {
        let menu = Menu::parse(b"ia\nib\nic\nid\nie\n", 80);
        let mut c = cursor(&menu);
        assert_eq!(c.selected, None);
        for _ in 0..5 {
            c.navigate(Key::Down, &menu, 2);
        }
        assert_eq!(c.offset, 4);
        c.navigate(Key::Up, &menu, 2);
        assert_eq!(c.offset, 3);
        c.navigate(Key::Home, &menu, 2);
        assert_eq!(c.offset, 0);
        assert_eq!(c.selected, None);
    }

    #[test]
    fn wrapped_items_are_selected_by_their_first_row() {
        let raw = b"1aaaa bbbb cccc\t/x\th\t70\n0next\t/y\th\t70\n";
        let menu = Menu::parse(raw, 9);
        assert_eq!(menu.len(), 4);
        let mut c = cursor(&menu);
        c.navigate(Key::Down, &menu, 10);
        assert_eq!(c.selected, Some(3));
        c.navigate(Key::Up, &menu, 10);
        assert_eq!(c.selected, Some(0));
    }

    #[test]
    fn restoring_a_stale_selection_falls_back() {
        let menu = sample();
        let display = DisplayState {
            selected_line: Some(2),
            scroll_offset: Some(3),
        };
        let c = MenuCursor::restore(display, &menu);
        assert_eq!(c, MenuCursor { selected: Some(1), offset: 3 });
    }

    #[test]
    fn query_composition() {
        assert_eq!(compose_query(b"/search", "cats").unwrap(), b"/search\tcats");
        assert_eq!(compose_query(b"", "").unwrap(), b"\t");
        assert_eq!(compose_query(b"/s\xe9", "q").unwrap(), b"/s\xe9\tq");
    }

    fn browser_on(raw: &[u8], keys: Vec<Key>) -> Browser<MockScreen, MockTransport> {
        let mut b = Browser::new(
            MockScreen::new(40, 10).with_keys(keys),
            Fetcher::new(MockTransport::new(), NetworkConfig::default()),
            Theme::default(),
            DEFAULT_CACHE_LIMIT,
            DownloadConfig::default(),
        );
        b.open(Location::gopher("h", 70, ItemType::Directory, "/"))
            .unwrap();
        b.history.current_mut().store(raw).unwrap();
        b
    }

    #[test]
    fn draws_badges_and_the_selected_url() {
        let mut b = browser_on(SAMPLE, vec![Key::Backspace]);
        assert_eq!(b.display_menu().unwrap(), ViewOrder::Back);
        let theme = Theme::default();
        assert_eq!(b.screen.row_text(1), "intro");
        assert_eq!(b.screen.row_text(2), "DIR One");
        assert_eq!(b.screen.attr_at(0, 2), theme.menu_current);
        assert_eq!(b.screen.row_text(5), "TXT Two");
        assert_eq!(b.screen.attr_at(0, 5), theme.menu_type);
        assert_eq!(b.screen.attr_at(4, 5), theme.menu_selectable);
        assert_eq!(b.screen.row_text(9), "gopher://h/1/1");
    }

    #[test]
    fn f9_forces_a_download() {
        let mut b = browser_on(SAMPLE, vec![Key::Down, Key::F9]);
        assert_eq!(b.display_menu().unwrap(), ViewOrder::None);
        let pushed = &b.history.current().location;
        assert_eq!(pushed.item_type, ItemType::Binary);
        assert_eq!(pushed.selector, b"/2");
    }

    #[test]
    fn cancelled_query_stays_on_the_menu() {
        let raw = b"7Search\t/s\th\t70\n";
        let keys = vec![Key::Enter, Key::Char('x'), Key::Escape, Key::F5];
        let mut b = browser_on(raw, keys);
        assert_eq!(b.display_menu().unwrap(), ViewOrder::Refresh);
        assert_eq!(b.history.len(), 2);
    }

    #[test]
    fn f9_on_a_search_item_saves_without_asking() {
        let raw = b"7Search\t/s\th\t70\n";
        let mut b = browser_on(raw, vec![Key::F9]);
        assert_eq!(b.display_menu().unwrap(), ViewOrder::None);
        assert_eq!(b.history.current().location.item_type, ItemType::Binary);
        assert_eq!(b.history.current().location.selector, b"/s");
    }

    #[test]
    fn declined_quit_keeps_browsing() {
        let mut b = browser_on(SAMPLE, vec![Key::Escape, Key::Char('n'), Key::Down, Key::Quit]);
        assert_eq!(b.display_menu().unwrap(), ViewOrder::Quit);
        assert_eq!(b.history.current().display.selected_line, Some(4));
    }

    #[test]
    fn tab_goes_to_a_typed_url() {
        let mut keys: Vec<Key> = "other.org".chars().map(Key::Char).collect();
        keys.insert(0, Key::Tab);
        keys.push(Key::Enter);
        let mut b = browser_on(SAMPLE, keys);
        assert_eq!(b.display_menu().unwrap(), ViewOrder::None);
        assert_eq!(b.history.current().location.host, "other.org");
        assert_eq!(b.history.len(), 3);
    }
}
