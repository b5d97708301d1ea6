use anyhow::Result;

use crate::location::Location;
use crate::screen::{Attr, Key, Screen};
use crate::theme::Theme;

pub const URL_MAX_LEN: usize = 255;
pub const URL_PREFIX: &str = "gopher://";
const QUIT_PROMPT: &str = "!YOU ARE ABOUT TO QUIT. PRESS ESC TO CONFIRM, OR ANY OTHER KEY TO ABORT.";
/// Columns kept visible to the left of the cursor while scrolling a field.
const EDIT_LEAD: usize = 8;

/// A one-shot message line. A message only lands when none is pending, so
/// the first explanation of a problem wins; drawing consumes it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusBar {
    message: String,
}

impl StatusBar {
    pub fn set(&mut self, message: impl Into<String>) {
        if self.message.is_empty() {
            self.message = message.into();
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }

    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.message)
    }

    pub fn draw<S: Screen>(&mut self, screen: &mut S, theme: &Theme) {
        let message = self.take();
        draw_status_bar(screen, theme, &message);
    }
}

/// Writes `text` into a `width`-wide field, padding with blanks or cutting
/// it short.
pub fn draw_field<S: Screen>(screen: &mut S, text: &str, attr: Attr, col: u16, row: u16, width: u16) {
    let mut chars = text.chars();
    for offset in 0..width {
        let ch = chars.next().unwrap_or(' ');
        screen.put_char(ch, attr, col.saturating_add(offset), row);
    }
}

/// Fills the bottom row. A leading `!` marks a warning.
pub fn draw_status_bar<S: Screen>(screen: &mut S, theme: &Theme, message: &str) {
    let (text, attr) = match message.strip_prefix('!') {
        Some(rest) => (rest, theme.status_warn),
        None => (message, theme.status_info),
    };
    let row = screen.rows().saturating_sub(1);
    draw_field(screen, text, attr, 0, row, screen.cols());
}

/// Draws `[url]` across the top row.
pub fn draw_url_bar<S: Screen>(screen: &mut S, theme: &Theme, location: &Location) {
    let cols = screen.cols();
    if cols < 2 {
        return;
    }
    let width = cols - 2;
    let url = location.to_string_truncated(usize::from(width));
    screen.put_char('[', theme.url_bar_deco, 0, 0);
    draw_field(screen, &url, theme.url_bar, 1, 0, width);
    screen.put_char(']', theme.url_bar_deco, cols - 1, 0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Editing,
    Commit,
    Cancel,
}

/// Single-line text editing, independent of any screen.
///
/// The first printable key replaces the initial content (with `prefix`, if
/// any), which lets the user type a fresh URL without clearing the old one.
#[derive(Debug, Clone)]
pub struct LineEditor {
    text: Vec<char>,
    cursor: usize,
    max_len: usize,
    prefix: Option<&'static str>,
    first_key: bool,
}

impl LineEditor {
    pub fn new(initial: &str, max_len: usize) -> Self {
        let text: Vec<char> = initial.chars().take(max_len).collect();
        Self {
            cursor: text.len(),
            text,
            max_len,
            prefix: None,
            first_key: true,
        }
    }

    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn apply(&mut self, key: Key) -> EditOutcome {
        let outcome = match key {
            Key::Escape | Key::Tab | Key::Quit => EditOutcome::Cancel,
            Key::Enter => EditOutcome::Commit,
            Key::Home => {
                self.cursor = 0;
                EditOutcome::Editing
            }
            Key::End => {
                self.cursor = self.text.len();
                EditOutcome::Editing
            }
            Key::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                EditOutcome::Editing
            }
            Key::Right => {
                self.cursor = (self.cursor + 1).min(self.text.len());
                EditOutcome::Editing
            }
            Key::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.text.remove(self.cursor);
                }
                EditOutcome::Editing
            }
            Key::Delete => {
                if self.cursor < self.text.len() {
                    self.text.remove(self.cursor);
                }
                EditOutcome::Editing
            }
            Key::Char(ch) if (' '..='~').contains(&ch) => {
                if self.first_key {
                    self.text = self.prefix.unwrap_or_default().chars().collect();
                    self.cursor = self.text.len();
                }
                if self.text.len() < self.max_len {
                    self.text.insert(self.cursor, ch);
                    self.cursor += 1;
                }
                EditOutcome::Editing
            }
            _ => EditOutcome::Editing,
        };
        self.first_key = false;
        outcome
    }

    /// First character shown in a field `width` columns wide.
    pub fn display_offset(&self, width: usize) -> usize {
        let visible = width.saturating_sub(1);
        let offset = self.text.len().saturating_sub(visible);
        offset.min(self.cursor.saturating_sub(EDIT_LEAD))
    }
}

/// Runs `editor` in a field on screen until the user commits or cancels.
pub fn edit_string<S: Screen>(
    screen: &mut S,
    editor: &mut LineEditor,
    col: u16,
    row: u16,
    width: u16,
    attr: Attr,
) -> Result<Option<String>> {
    screen.cursor_show();
    let outcome = loop {
        let offset = editor.display_offset(usize::from(width));
        let cursor_col = u16::try_from(editor.cursor() - offset).unwrap_or(u16::MAX);
        screen.move_cursor(col.saturating_add(cursor_col), row);
        let visible: String = editor.text().chars().skip(offset).collect();
        draw_field(screen, &visible, attr, col, row, width);

        match editor.apply(screen.get_key()?) {
            EditOutcome::Editing => continue,
            done => break done,
        }
    };
    screen.cursor_hide();
    Ok((outcome == EditOutcome::Commit).then(|| editor.text()))
}

/// Lets the user edit the URL bar. Returns the location to go to, if any.
pub fn edit_url<S: Screen>(
    screen: &mut S,
    theme: &Theme,
    status: &mut StatusBar,
    current: &Location,
) -> Result<Option<Location>> {
    let mut editor =
        LineEditor::new(&current.to_string_truncated(URL_MAX_LEN), URL_MAX_LEN).with_prefix(URL_PREFIX);
    let width = screen.cols().saturating_sub(2);
    let entered = edit_string(screen, &mut editor, 1, 0, width, theme.url_bar)?;
    draw_url_bar(screen, theme, current);
    let Some(entered) = entered else {
        return Ok(None);
    };
    match Location::parse_supported(entered.trim()) {
        Ok(location) => Ok(Some(location)),
        Err(err) => {
            tracing::debug!(url = %entered, error = %err, "rejected url");
            status.set("!Invalid URL");
            Ok(None)
        }
    }
}

/// Asks before leaving. Escape (or the quit key) confirms.
pub fn confirm_quit<S: Screen>(screen: &mut S, theme: &Theme) -> Result<bool> {
    draw_status_bar(screen, theme, QUIT_PROMPT);
    let key = screen.get_key()?;
    Ok(matches!(key, Key::Escape | Key::Quit))
}
