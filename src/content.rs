//! Turns fetched documents into text the text view can wrap and draw.

const TAB_WIDTH: usize = 8;
/// Tag names and entity bodies are only compared on their first bytes.
const TOKEN_MAX: usize = 7;

/// How a document should be turned into display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

pub fn to_display_text(raw: &[u8], format: TextFormat) -> String {
    match format {
        TextFormat::Plain => strip_tabs_and_controls(raw),
        TextFormat::Html => html_to_text(raw),
    }
}

/// Expands tabs to eight spaces, keeps line feeds and drops every other
/// control byte (CR and DEL included). A trailing `.\n` end-of-response
/// marker is removed.
pub fn strip_tabs_and_controls(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    for &byte in raw {
        match byte {
            b'\t' => out.extend_from_slice(&[b' '; TAB_WIDTH]),
            b'\n' => out.push(b'\n'),
            b'\r' | 0x7F => {}
            byte if byte < 32 => {}
            byte => out.push(byte),
        }
    }
    if out.ends_with(b".\n") {
        out.truncate(out.len() - 2);
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Default)]
struct Tag {
    name: Vec<u8>,
    /// Set once whitespace shows up: attributes follow and are ignored.
    name_done: bool,
    len: usize,
}

impl Tag {
    fn push(&mut self, byte: u8) {
        if self.len < TOKEN_MAX && !self.name_done {
            self.name.push(byte);
        }
        self.len += 1;
    }

    fn whitespace(&mut self) {
        self.name_done = true;
    }

    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.as_bytes())
    }
}

#[derive(Default)]
struct Entity {
    body: Vec<u8>,
}

impl Entity {
    fn push(&mut self, byte: u8) {
        if self.body.len() < TOKEN_MAX {
            self.body.push(byte);
        }
    }

    fn replacement(&self) -> u8 {
        if self.body.eq_ignore_ascii_case(b"nbsp") {
            b' '
        } else {
            b'_'
        }
    }
}

/// A deliberately small tag stripper, not an HTML parser.
///
/// Whitespace runs collapse to a single space. `</p>`, `<br>`, `</tr>` and
/// `</title>` become line breaks, `<script>` hides text until `</script>`,
/// every other tag disappears. `&nbsp;` becomes a space and any other entity
/// an underscore. An entity interrupted by whitespace or a tag is kept as
/// literal text.
pub fn html_to_text(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut last_was_space = false;
    let mut in_script = false;
    let mut tag: Option<Tag> = None;
    let mut entity: Option<Entity> = None;

    for &byte in raw {
        if in_script && tag.is_none() && byte != b'<' {
            continue;
        }

        match byte {
            b'\t' | b'\n' | b'\r' | b' ' => {
                if let Some(tag) = tag.as_mut() {
                    tag.whitespace();
                    continue;
                }
                if let Some(open) = entity.take() {
                    out.push(b'&');
                    out.extend_from_slice(&open.body);
                }
                if !last_was_space {
                    out.push(b' ');
                    last_was_space = true;
                }
            }
            b'<' => {
                last_was_space = false;
                if let Some(open) = entity.take() {
                    out.push(b'&');
                    out.extend_from_slice(&open.body);
                }
                tag = Some(Tag::default());
            }
            b'>' => {
                last_was_space = false;
                let Some(closed) = tag.take() else {
                    continue;
                };
                if closed.is("/p") || closed.is("br") || closed.is("/tr") || closed.is("/title") {
                    out.push(b'\n');
                } else if closed.is("script") {
                    in_script = true;
                } else if closed.is("/script") {
                    in_script = false;
                }
            }
            byte => {
                last_was_space = false;
                if let Some(tag) = tag.as_mut() {
                    tag.push(byte);
                    continue;
                }
                if let Some(open) = entity.as_mut() {
                    if byte == b';' {
                        out.push(open.replacement());
                        entity = None;
                    } else {
                        open.push(byte);
                    }
                    continue;
                }
                if byte == b'&' {
                    entity = Some(Entity::default());
                    continue;
                }
                if byte >= 32 {
                    out.push(byte);
                }
            }
        }
    }

    if let Some(open) = entity {
        out.push(b'&');
        out.extend_from_slice(&open.body);
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_expands_tabs_and_drops_controls() {
        let got = strip_tabs_and_controls(b"a\tb\r\nc\x07d\x7fe\n");
        assert_eq!(got, "a        b\ncde\n");
    }

    #[test]
    fn plain_text_trims_gopher_terminator() {
        assert_eq!(strip_tabs_and_controls(b"line\r\n.\r\n"), "line\n");
        assert_eq!(strip_tabs_and_controls(b".\n"), "");
    }

    #[test]
    fn plain_text_keeps_utf8() {
        assert_eq!(strip_tabs_and_controls("zażółć\n".as_bytes()), "zażółć\n");
    }

    #[test]
    fn html_collapses_whitespace() {
        assert_eq!(html_to_text(b"a  \n\t b"), "a b");
    }

    #[test]
    fn html_line_breaking_tags() {
        let got = html_to_text(b"<title>T</title><p>one</p>two<BR>three<br />four");
        assert_eq!(got, "T\none\ntwo\nthree\nfour");
    }

    #[test]
    fn html_drops_other_tags() {
        assert_eq!(html_to_text(b"<b>bold</b> <a href=\"x\">link</a>"), "bold link");
    }

    #[test]
    fn html_hides_scripts() {
        let got = html_to_text(b"before<script>var x = 1 < 2;</script>after");
        assert_eq!(got, "beforeafter");
    }

    #[test]
    fn html_entities() {
        assert_eq!(html_to_text(b"a&nbsp;b&amp;c&NBSP;d"), "a b_c d");
    }

    #[test]
    fn html_long_entity_is_consumed() {
        assert_eq!(html_to_text(b"x&verylongentity;y"), "x_y");
    }

    #[test]
    fn html_broken_entity_stays_literal() {
        assert_eq!(html_to_text(b"AT&T rocks"), "AT&T rocks");
    }

    #[test]
    fn long_tag_names_are_truncated_for_matching() {
        // "/titlex" fits in the seven-byte window and does not match "/title"
        assert_eq!(html_to_text(b"a</titlex>b"), "ab");
        assert_eq!(html_to_text(b"a</titlexyz>b"), "ab");
    }

    #[test]
    fn format_dispatch() {
        assert_eq!(to_display_text(b"<p>x</p>", TextFormat::Html), "x\n");
        assert_eq!(to_display_text(b"<p>x</p>", TextFormat::Plain), "<p>x</p>");
    }
}
