use tracing::debug;

use crate::location::{ItemType, Location, GOPHER_DEFAULT_PORT};
use crate::wrap::word_wrap;

/// Rows kept per menu. Anything past this is silently dropped.
pub const MAX_MENU_LINES: usize = 1024;
/// Columns taken by the type badge and the space after it.
pub const BADGE_WIDTH: usize = 4;

/// One display row of a gopher menu. A long description wraps over several
/// rows; only the first row of a selectable record carries its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuLine {
    pub item_type: ItemType,
    pub text: String,
    pub location: Option<Location>,
}

impl MenuLine {
    pub fn is_selectable(&self) -> bool {
        self.item_type.is_selectable()
    }
}

/// Three-letter label drawn in front of a row. Inline messages have none.
pub fn badge(item_type: ItemType) -> Option<&'static str> {
    let label = match item_type {
        ItemType::Info => return None,
        ItemType::Html => "HTM",
        ItemType::File => "TXT",
        ItemType::Directory => "DIR",
        ItemType::Error => "ERR",
        ItemType::DosBinary | ItemType::Binary => "BIN",
        ItemType::IndexSearch => "ASK",
        ItemType::Image | ItemType::Gif => "IMG",
        ItemType::Other('P') | ItemType::Other('d') => "PDF",
        ItemType::Continuation => "   ",
        ItemType::Invalid => "INV",
        _ => "UNK",
    };
    Some(label)
}

#[derive(Debug, Clone, Default)]
pub struct Menu {
    pub lines: Vec<MenuLine>,
}

impl Menu {
    /// Parses a raw menu and lays it out for a screen `cols` wide.
    pub fn parse(raw: &[u8], cols: usize) -> Self {
        Self {
            lines: parse_menu(raw, cols),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_selectable(&self, index: usize) -> bool {
        self.lines.get(index).is_some_and(MenuLine::is_selectable)
    }

    pub fn first_link(&self) -> Option<usize> {
        self.lines.iter().position(MenuLine::is_selectable)
    }

    pub fn last_link(&self) -> Option<usize> {
        self.lines.iter().rposition(MenuLine::is_selectable)
    }

    pub fn next_link(&self, from: usize) -> Option<usize> {
        (from + 1..self.lines.len()).find(|&idx| self.is_selectable(idx))
    }

    pub fn previous_link(&self, from: usize) -> Option<usize> {
        (0..from).rev().find(|&idx| self.is_selectable(idx))
    }
}

struct Record {
    item_type: ItemType,
    description: String,
    location: Option<Location>,
}

// Fields stay bytes until displayed; the selector goes back to the server
// exactly as received.
fn parse_record(line: &[u8]) -> Option<Record> {
    let (&first, rest) = line.split_first()?;
    let mut item_type = ItemType::from_char(char::from(first));
    if item_type == ItemType::Other('.') {
        return None;
    }

    let mut fields = rest.split(|b| *b == b'\t');
    let description = String::from_utf8_lossy(fields.next().unwrap_or_default()).into_owned();
    let selector = fields.next();
    let host = fields.next();
    let port = fields.next().map_or(GOPHER_DEFAULT_PORT, menu_port);

    let mut location = None;
    if item_type.is_selectable() {
        match (selector, host) {
            (Some(selector), Some(host)) => {
                let host = String::from_utf8_lossy(host);
                location = Some(Location::gopher(&host, port, item_type, selector));
            }
            _ => item_type = ItemType::Invalid,
        }
    }

    Some(Record {
        item_type,
        description,
        location,
    })
}

fn menu_port(raw: &[u8]) -> u16 {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let digits = &raw[start..];
    let end = digits
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    match std::str::from_utf8(&digits[..end]).map(str::parse::<u16>) {
        Ok(Ok(port)) if port >= 1 => port,
        _ => GOPHER_DEFAULT_PORT,
    }
}

/// Splits a gopher menu into display rows.
///
/// Records are `type description \t selector \t host \t port`, one per line;
/// CR bytes are ignored wherever they appear. The `.` terminator is dropped.
/// Selectable records lacking a selector or host become [`ItemType::Invalid`].
/// Descriptions wrap to `cols` for inline messages and `cols - 4` for the
/// rest; wrapped rows are continuations except for inline messages and
/// errors, which repeat their own type.
pub fn parse_menu(raw: &[u8], cols: usize) -> Vec<MenuLine> {
    let cleaned: Vec<u8> = raw.iter().copied().filter(|b| *b != b'\r').collect();
    let mut lines = Vec::new();

    'records: for record in cleaned.split(|b| *b == b'\n').filter_map(parse_record) {
        let width = if record.item_type == ItemType::Info {
            cols
        } else {
            cols.saturating_sub(BADGE_WIDTH)
        };
        let repeats_type = matches!(record.item_type, ItemType::Info | ItemType::Error);
        let mut location = record.location;
        let mut cursor = Some(0);
        let mut first = true;

        while let Some(at) = cursor {
            if lines.len() >= MAX_MENU_LINES {
                debug!(limit = MAX_MENU_LINES, "menu truncated");
                break 'records;
            }
            let wrapped = word_wrap(&record.description, at, width);
            let item_type = if first || repeats_type {
                record.item_type
            } else {
                ItemType::Continuation
            };
            lines.push(MenuLine {
                item_type,
                text: wrapped.text,
                location: location.take(),
            });
            cursor = wrapped.next;
            first = false;
        }
    }

    if lines
        .last()
        .is_some_and(|line| line.item_type == ItemType::Other('.'))
    {
        lines.pop();
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_directory_entry() {
        let lines = parse_menu(b"1Example\tfoo\texample.com\t70\r\n.\r\n", 80);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item_type, ItemType::Directory);
        assert_eq!(lines[0].text, "Example");
        assert_eq!(
            lines[0].location,
            Some(Location::gopher("example.com", 70, ItemType::Directory, "foo"))
        );
    }

    #[test]
    fn missing_host_is_invalid() {
        let lines = parse_menu(b"0Broken\tsel\n1Fine\t/x\th\t70\n", 80);
        assert_eq!(lines[0].item_type, ItemType::Invalid);
        assert!(lines[0].location.is_none());
        assert!(!lines[0].is_selectable());
        assert_eq!(lines[1].item_type, ItemType::Directory);
    }

    #[test]
    fn info_lines_need_no_host() {
        let lines = parse_menu(b"iJust text\t\terror.host\t1\n3Oops\n", 80);
        assert_eq!(lines[0].item_type, ItemType::Info);
        assert_eq!(lines[0].text, "Just text");
        assert_eq!(lines[1].item_type, ItemType::Error);
        assert!(lines.iter().all(|line| !line.is_selectable()));
    }

    #[test]
    fn bad_port_defaults_to_70() {
        let lines = parse_menu(b"0A\ts\th\t0\n0B\ts\th\tnope\n0C\ts\th\n0D\ts\th\t7070\n", 80);
        let ports: Vec<u16> = lines
            .iter()
            .map(|line| line.location.as_ref().unwrap().port)
            .collect();
        assert_eq!(ports, [70, 70, 70, 7070]);
    }

    #[test]
    fn long_descriptions_wrap_into_continuations() {
        let lines = parse_menu(b"0aaaa bbbb cccc\tsel\thost\t70\n", 9);
        let types: Vec<ItemType> = lines.iter().map(|line| line.item_type).collect();
        assert_eq!(
            types,
            [ItemType::File, ItemType::Continuation, ItemType::Continuation]
        );
        assert!(lines[0].location.is_some());
        assert!(lines[1].location.is_none());
        let texts: Vec<&str> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, ["aaaa", "bbbb", "cccc"]);
    }

    #[test]
    fn info_and_error_rows_repeat_their_type() {
        let lines = parse_menu(b"iaaaa bbbb\n3cccc dddd\n", 8);
        let types: Vec<ItemType> = lines.iter().map(|line| line.item_type).collect();
        assert_eq!(
            types,
            [ItemType::Info, ItemType::Info, ItemType::Error, ItemType::Error]
        );
    }

    #[test]
    fn rows_are_capped() {
        let mut raw = Vec::new();
        for i in 0..MAX_MENU_LINES + 50 {
            raw.extend_from_slice(format!("iline {i}\n").as_bytes());
        }
        let lines = parse_menu(&raw, 80);
        assert_eq!(lines.len(), MAX_MENU_LINES);
        assert_eq!(lines.last().unwrap().text, format!("line {}", MAX_MENU_LINES - 1));
    }

    #[test]
    fn carriage_returns_are_ignored_everywhere() {
        let lines = parse_menu(b"1Ti\rtle\t/se\rl\tho\rst\t70\r\n", 80);
        assert_eq!(lines[0].text, "Title");
        let loc = lines[0].location.as_ref().unwrap();
        assert_eq!(loc.selector, b"/sel");
        assert_eq!(loc.host, "host");
    }

    #[test]
    fn selectors_keep_their_raw_bytes() {
        let lines = parse_menu(b"0Caf\xe9\t/caf\xe9.txt\th\t70\n", 80);
        assert_eq!(lines[0].text, "Caf\u{fffd}");
        let loc = lines[0].location.as_ref().unwrap();
        assert_eq!(loc.selector, b"/caf\xe9.txt");
        assert_eq!(loc.to_string(), "gopher://h/0/caf%E9.txt");
    }

    #[test]
    fn link_navigation_skips_unselectable_rows() {
        let menu = Menu::parse(b"iheader\n1A\ta\th\t70\niinfo\n3err\n0B\tb\th\t70\niend\n", 80);
        assert_eq!(menu.first_link(), Some(1));
        assert_eq!(menu.last_link(), Some(4));
        assert_eq!(menu.next_link(1), Some(4));
        assert_eq!(menu.previous_link(4), Some(1));
        assert_eq!(menu.next_link(4), None);
    }

    #[test]
    fn badges() {
        assert_eq!(badge(ItemType::Info), None);
        assert_eq!(badge(ItemType::Directory), Some("DIR"));
        assert_eq!(badge(ItemType::Other('d')), Some("PDF"));
        assert_eq!(badge(ItemType::Other('x')), Some("UNK"));
        assert_eq!(badge(ItemType::Continuation), Some("   "));
    }
}
