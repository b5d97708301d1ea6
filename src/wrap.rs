/// One display line cut from a longer text, plus where the next one starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedLine {
    pub text: String,
    /// Byte offset of the next line in the source, `None` once exhausted.
    pub next: Option<usize>,
}

/// Produces the display line starting at byte offset `cursor` of `source`.
///
/// At most `width` characters are taken. A `\n` ends the line early (a `\r`
/// right before it is dropped) and tabs become single spaces. Without a line
/// break the text is cut at the last space seen; with no usable space, or when
/// the character right after the window is itself a space, the cut lands
/// exactly at `width`. Spaces at the start of the following line are skipped.
///
/// The function is pure: calling it again with the same cursor yields the same
/// line, and feeding back `next` walks the whole text.
pub fn word_wrap(source: &str, cursor: usize, width: usize) -> WrappedLine {
    let width = width.max(1);
    let rest = &source[cursor..];
    let mut text = String::with_capacity(width);
    let mut last_space = 0;
    let mut prev_cr = false;
    let mut chars = rest.char_indices();

    for i in 0..width {
        let Some((offset, ch)) = chars.next() else {
            return WrappedLine { text, next: None };
        };
        if ch == '\n' {
            if prev_cr {
                text.pop();
            }
            return WrappedLine {
                text,
                next: Some(cursor + offset + 1),
            };
        }
        let ch = if ch == '\t' { ' ' } else { ch };
        if ch == ' ' {
            last_space = i;
        }
        prev_cr = ch == '\r';
        text.push(ch);
    }

    let mut cut = last_space;
    if cut == 0 || matches!(chars.next(), Some((_, ' '))) {
        cut = width;
    }
    if let Some((byte, _)) = text.char_indices().nth(cut) {
        text.truncate(byte);
    }

    let cut_byte = rest
        .char_indices()
        .nth(cut)
        .map_or(rest.len(), |(byte, _)| byte);
    let tail = &rest[cut_byte..];
    let next = rest.len() - tail.trim_start_matches(' ').len();

    WrappedLine {
        text,
        next: (next < rest.len()).then_some(cursor + next),
    }
}

/// Iterator over every wrapped line of a text. An empty text yields a single
/// empty line.
pub struct WrapLines<'a> {
    source: &'a str,
    width: usize,
    cursor: Option<usize>,
}

impl<'a> Iterator for WrapLines<'a> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor?;
        let wrapped = word_wrap(self.source, cursor, self.width);
        self.cursor = wrapped.next;
        Some(wrapped.text)
    }
}

pub fn lines(source: &str, width: usize) -> WrapLines<'_> {
    WrapLines {
        source,
        width,
        cursor: Some(0),
    }
}
