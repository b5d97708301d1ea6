use std::fmt;

use percent_encoding::{percent_encode, AsciiSet, CONTROLS};

pub const GOPHER_DEFAULT_PORT: u16 = 70;
pub const HTTP_DEFAULT_PORT: u16 = 80;

/// Bytes escaped in a serialized gopher selector: everything at or below 0x1F
/// and everything at or above 0x80. DEL passes through.
const SELECTOR_ESCAPES: &AsciiSet = &CONTROLS.remove(0x7F);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported protocol: {0}")]
    UnsupportedScheme(String),
    #[error("invalid item type {0:?}")]
    InvalidItemType(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    #[default]
    Gopher,
    Http,
    Unknown,
}

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => HTTP_DEFAULT_PORT,
            Protocol::Gopher | Protocol::Unknown => GOPHER_DEFAULT_PORT,
        }
    }
}

/// Gopher item types (RFC 1436) plus the two synthetic types the menu parser
/// produces for wrapped rows and malformed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    File,
    Directory,
    CsoPhoneBook,
    Error,
    BinHex,
    DosBinary,
    Uuencoded,
    IndexSearch,
    Telnet,
    Binary,
    RedundantServer,
    Tn3270,
    Gif,
    Html,
    Info,
    Image,
    Other(char),
    Continuation,
    Invalid,
}

impl ItemType {
    pub fn from_char(ch: char) -> Self {
        match ch {
            '0' => ItemType::File,
            '1' => ItemType::Directory,
            '2' => ItemType::CsoPhoneBook,
            '3' => ItemType::Error,
            '4' => ItemType::BinHex,
            '5' => ItemType::DosBinary,
            '6' => ItemType::Uuencoded,
            '7' => ItemType::IndexSearch,
            '8' => ItemType::Telnet,
            '9' => ItemType::Binary,
            '+' => ItemType::RedundantServer,
            'T' => ItemType::Tn3270,
            'g' => ItemType::Gif,
            'h' => ItemType::Html,
            'i' => ItemType::Info,
            'I' => ItemType::Image,
            other => ItemType::Other(other),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            ItemType::File => '0',
            ItemType::Directory => '1',
            ItemType::CsoPhoneBook => '2',
            ItemType::Error => '3',
            ItemType::BinHex => '4',
            ItemType::DosBinary => '5',
            ItemType::Uuencoded => '6',
            ItemType::IndexSearch => '7',
            ItemType::Telnet => '8',
            ItemType::Binary => '9',
            ItemType::RedundantServer => '+',
            ItemType::Tn3270 => 'T',
            ItemType::Gif => 'g',
            ItemType::Html => 'h',
            ItemType::Info => 'i',
            ItemType::Image => 'I',
            ItemType::Other(ch) => ch,
            ItemType::Continuation => '\0',
            ItemType::Invalid => '\x7f',
        }
    }

    /// Rows of these types can never hold the menu cursor.
    pub fn is_selectable(self) -> bool {
        !matches!(
            self,
            ItemType::Info | ItemType::Error | ItemType::Continuation | ItemType::Invalid
        )
    }

    /// Types the browser renders itself; everything else is offered as a download.
    pub fn is_displayable(self) -> bool {
        matches!(
            self,
            ItemType::File | ItemType::Directory | ItemType::IndexSearch | ItemType::Html
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub item_type: ItemType,
    /// Raw selector bytes. Servers are free to use any encoding here, so
    /// nothing along the way may reinterpret them as text.
    pub selector: Vec<u8>,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            protocol: Protocol::Gopher,
            host: String::new(),
            port: GOPHER_DEFAULT_PORT,
            item_type: ItemType::Directory,
            selector: Vec::new(),
        }
    }
}

impl Location {
    pub fn gopher(
        host: &str,
        port: u16,
        item_type: ItemType,
        selector: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            protocol: Protocol::Gopher,
            host: host.to_string(),
            port,
            item_type,
            selector: selector.as_ref().to_vec(),
        }
    }

    /// Parses a URL leniently. Missing parts take their defaults and an
    /// unrecognised scheme yields [`Protocol::Unknown`]; the only hard error
    /// is a gopher item type outside printable ASCII.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let (protocol, rest) = split_scheme(raw);
        let mut loc = Location {
            protocol,
            port: protocol.default_port(),
            item_type: if protocol == Protocol::Http {
                ItemType::Html
            } else {
                ItemType::Directory
            },
            ..Location::default()
        };

        let host_end = rest.find([':', '/']).unwrap_or(rest.len());
        loc.host = rest[..host_end].to_string();
        let mut rest = &rest[host_end..];

        if let Some(after_colon) = rest.strip_prefix(':') {
            let port_end = after_colon.find('/').unwrap_or(after_colon.len());
            loc.port = parse_port(&after_colon[..port_end]).unwrap_or(loc.port);
            rest = &after_colon[port_end..];
        }

        let Some(path) = rest.strip_prefix('/') else {
            return Ok(loc);
        };

        match protocol {
            Protocol::Gopher => {
                let mut chars = path.chars();
                if let Some(ch) = chars.next() {
                    if !('!'..='~').contains(&ch) {
                        return Err(ParseError::InvalidItemType(ch));
                    }
                    loc.item_type = ItemType::from_char(ch);
                    loc.selector = decode_selector(chars.as_str());
                }
            }
            Protocol::Http | Protocol::Unknown => loc.selector = path.as_bytes().to_vec(),
        }

        Ok(loc)
    }

    /// Like [`Location::parse`], but refuses locations nothing can fetch.
    pub fn parse_supported(raw: &str) -> Result<Self, ParseError> {
        let loc = Self::parse(raw)?;
        if loc.protocol == Protocol::Unknown {
            let scheme = raw.split("://").next().unwrap_or_default();
            return Err(ParseError::UnsupportedScheme(scheme.to_string()));
        }
        Ok(loc)
    }

    /// Embedded pages live at pseudo-hosts starting with `#`.
    pub fn is_embedded(&self) -> bool {
        self.host.starts_with('#')
    }

    /// Two locations name the same resource when everything matches; hosts
    /// compare case-insensitively.
    pub fn same_resource(&self, other: &Location) -> bool {
        self.protocol == other.protocol
            && self.host.eq_ignore_ascii_case(&other.host)
            && self.port == other.port
            && self.item_type == other.item_type
            && self.selector == other.selector
    }

    /// Serializes and cuts the result to at most `max_chars` characters.
    /// Fixed-width fields such as the URL bar rely on this never failing.
    pub fn to_string_truncated(&self, max_chars: usize) -> String {
        let full = self.to_string();
        match full.char_indices().nth(max_chars) {
            Some((cut, _)) => full[..cut].to_string(),
            None => full,
        }
    }

    /// Last path segment of the selector, used as the default download name.
    pub fn file_name(&self) -> String {
        match self.selector.iter().rposition(|b| *b == b'/') {
            Some(idx) => String::from_utf8_lossy(&self.selector[idx + 1..]).into_owned(),
            None => String::new(),
        }
    }

    fn fmt_http(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}", self.host)?;
        if self.port != HTTP_DEFAULT_PORT {
            write!(f, ":{}", self.port)?;
        }
        write!(f, "/{}", String::from_utf8_lossy(&self.selector))
    }

    fn fmt_gopher(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.item_type == ItemType::Html {
            if let Some(target) = hurl_target(&self.selector) {
                return f.write_str(&String::from_utf8_lossy(target));
            }
        }
        f.write_str("gopher://")?;
        if self.host.is_empty() {
            return Ok(());
        }
        f.write_str(&self.host)?;
        if self.port != GOPHER_DEFAULT_PORT {
            write!(f, ":{}", self.port)?;
        }
        write!(
            f,
            "/{}{}",
            self.item_type.as_char(),
            percent_encode(&self.selector, SELECTOR_ESCAPES)
        )
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::Http => self.fmt_http(f),
            Protocol::Gopher | Protocol::Unknown => self.fmt_gopher(f),
        }
    }
}

impl std::str::FromStr for Location {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse_supported(s)
    }
}

fn split_scheme(raw: &str) -> (Protocol, &str) {
    // a '/' before any ':' means there is no scheme at all
    let Some(colon) = raw.find([':', '/']) else {
        return (Protocol::Gopher, raw);
    };
    if raw.as_bytes()[colon] != b':' {
        return (Protocol::Gopher, raw);
    }
    let Some(rest) = raw[colon + 1..].strip_prefix("//") else {
        return (Protocol::Gopher, raw);
    };
    let scheme = &raw[..colon];
    let protocol = if scheme.eq_ignore_ascii_case("gopher") {
        Protocol::Gopher
    } else if scheme.eq_ignore_ascii_case("http") {
        Protocol::Http
    } else {
        Protocol::Unknown
    };
    (protocol, rest)
}

fn parse_port(digits: &str) -> Option<u16> {
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

fn hurl_target(selector: &[u8]) -> Option<&[u8]> {
    selector
        .strip_prefix(b"URL:")
        .or_else(|| selector.strip_prefix(b"/URL:"))
}

/// Reverses the escaping done on serialization. Only `%XY` sequences that the
/// serializer would have produced are decoded, so a literal `%41` in a
/// selector survives a round trip untouched.
fn decode_selector(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let pair = &bytes[i + 1..i + 3];
            let decoded = pair
                .iter()
                .all(u8::is_ascii_hexdigit)
                .then(|| std::str::from_utf8(pair).ok())
                .flatten()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded.filter(|b| *b <= 0x1F || *b >= 0x80) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}
