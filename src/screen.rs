use anyhow::Result;

/// A CGA-style text attribute: background in the high nibble, foreground in
/// the low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attr(pub u8);

impl Attr {
    pub fn foreground(self) -> u8 {
        self.0 & 0x0F
    }

    pub fn background(self) -> u8 {
        self.0 >> 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Backspace,
    Tab,
    Enter,
    Escape,
    F1,
    F5,
    F9,
    Home,
    End,
    Up,
    Down,
    PageUp,
    PageDown,
    Left,
    Right,
    Delete,
    Char(char),
    /// Leave immediately, no questions asked.
    Quit,
    Unknown,
}

/// The cell-addressed terminal the views draw on.
pub trait Screen {
    fn rows(&self) -> u16;
    fn cols(&self) -> u16;
    fn put_char(&mut self, ch: char, attr: Attr, col: u16, row: u16);
    /// Shows everything drawn so far and blocks until a key arrives.
    fn get_key(&mut self) -> Result<Key>;
    fn key_pending(&mut self) -> Result<bool>;
    /// Shows everything drawn so far without waiting for input.
    fn refresh(&mut self) -> Result<()>;
    fn cursor_show(&mut self);
    fn cursor_hide(&mut self);
    fn move_cursor(&mut self, col: u16, row: u16);
    fn clear(&mut self);

    fn put_str(&mut self, text: &str, attr: Attr, col: u16, row: u16) {
        for (offset, ch) in text.chars().enumerate() {
            let Ok(offset) = u16::try_from(offset) else {
                break;
            };
            self.put_char(ch, attr, col.saturating_add(offset), row);
        }
    }
}
