use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::Terminal;

use crate::screen::{Attr, Key, Screen};

/// CGA palette index to the terminal's named colors.
const PALETTE: [Color; 16] = [
    Color::Black,
    Color::Blue,
    Color::Green,
    Color::Cyan,
    Color::Red,
    Color::Magenta,
    Color::Yellow,
    Color::Gray,
    Color::DarkGray,
    Color::LightBlue,
    Color::LightGreen,
    Color::LightCyan,
    Color::LightRed,
    Color::LightMagenta,
    Color::LightYellow,
    Color::White,
];

fn style(attr: Attr) -> Style {
    Style::default()
        .fg(PALETTE[usize::from(attr.foreground())])
        .bg(PALETTE[usize::from(attr.background())])
}

/// Translates a key press. `None` for events the browser ignores.
pub fn map_key(key: KeyEvent) -> Option<Key> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let mapped = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Quit,
        KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Unknown,
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Tab => Key::Tab,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Escape,
        KeyCode::F(1) => Key::F1,
        KeyCode::F(5) => Key::F5,
        KeyCode::F(9) => Key::F9,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Delete => Key::Delete,
        _ => Key::Unknown,
    };
    Some(mapped)
}

/// The real terminal. Cells are drawn into a back buffer that is pushed to
/// the screen whenever the browser waits for a key.
pub struct CrosstermScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    cells: Buffer,
    cursor: (u16, u16),
    cursor_visible: bool,
    restored: bool,
}

impl CrosstermScreen {
    pub fn new() -> Result<Self> {
        enable_raw_mode().context("enable raw mode")?;
        let mut stdout = io::stdout();
        stdout
            .execute(EnterAlternateScreen)
            .context("enter alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout)).context("create terminal")?;
        let area = terminal.size().context("query terminal size")?;
        Ok(Self {
            terminal,
            cells: Buffer::empty(Rect::new(0, 0, area.width, area.height)),
            cursor: (0, 0),
            cursor_visible: false,
            restored: false,
        })
    }

    /// Leaves raw mode and the alternate screen. Safe to call twice.
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        self.terminal.backend_mut().execute(LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let cells = &self.cells;
        let cursor = self.cursor_visible.then_some(self.cursor);
        self.terminal.draw(|frame| {
            let area = frame.size().intersection(cells.area);
            let target = frame.buffer_mut();
            for y in area.top()..area.bottom() {
                for x in area.left()..area.right() {
                    *target.get_mut(x, y) = cells.get(x, y).clone();
                }
            }
            if let Some((x, y)) = cursor {
                frame.set_cursor(x, y);
            }
        })?;
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.cells.resize(Rect::new(0, 0, cols, rows));
    }
}

impl Drop for CrosstermScreen {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

impl Screen for CrosstermScreen {
    fn rows(&self) -> u16 {
        self.cells.area.height
    }

    fn cols(&self) -> u16 {
        self.cells.area.width
    }

    fn put_char(&mut self, ch: char, attr: Attr, col: u16, row: u16) {
        if col < self.cols() && row < self.rows() {
            self.cells.get_mut(col, row).set_char(ch).set_style(style(attr));
        }
    }

    fn get_key(&mut self) -> Result<Key> {
        self.present()?;
        loop {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(mapped) = map_key(key) {
                        return Ok(mapped);
                    }
                }
                Event::Resize(cols, rows) => self.resize(cols, rows),
                _ => {}
            }
        }
    }

    fn key_pending(&mut self) -> Result<bool> {
        Ok(event::poll(Duration::ZERO)?)
    }

    fn refresh(&mut self) -> Result<()> {
        self.present()
    }

    fn cursor_show(&mut self) {
        self.cursor_visible = true;
    }

    fn cursor_hide(&mut self) {
        self.cursor_visible = false;
    }

    fn move_cursor(&mut self, col: u16, row: u16) {
        self.cursor = (col, row);
    }

    fn clear(&mut self) {
        self.cells.reset();
    }
}
