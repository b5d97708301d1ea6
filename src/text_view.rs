use anyhow::Result;

use crate::browser::{Browser, ViewOrder};
use crate::content::{to_display_text, TextFormat};
use crate::embedded;
use crate::location::ItemType;
use crate::net::Transport;
use crate::screen::{Key, Screen};
use crate::ui::{self, draw_field};
use crate::wrap;

/// Reading position in a wrapped document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextScroller {
    pub first_line: usize,
    line_count: usize,
    visible: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Moved,
    AtTop,
    AtEnd,
}

impl TextScroller {
    pub fn new(first_line: usize, line_count: usize, visible: usize) -> Self {
        Self {
            first_line,
            line_count,
            visible,
        }
    }

    /// True once the last line is on screen with room to spare.
    pub fn at_end(&self) -> bool {
        self.line_count < self.first_line + self.visible
    }

    /// Moves by `delta` lines. Moving up from the top or down past the
    /// end leaves the position alone.
    pub fn scroll(&mut self, delta: isize) -> Scroll {
        if delta < 0 && self.first_line == 0 {
            return Scroll::AtTop;
        }
        if delta > 0 && self.at_end() {
            return Scroll::AtEnd;
        }
        self.first_line = self.first_line.saturating_add_signed(delta);
        Scroll::Moved
    }
}

impl<S: Screen, T: Transport> Browser<S, T> {
    pub(crate) fn display_text(&mut self, format: TextFormat) -> Result<ViewOrder> {
        let node = self.history.current();
        let raw = node.cache.as_deref().unwrap_or_default();
        self.status.set(format!("File loaded ({} bytes)", raw.len()));

        let text = to_display_text(raw, format);
        let cols = usize::from(self.screen.cols());
        let lines: Vec<String> = wrap::lines(&text, cols).collect();
        let mut scroller = TextScroller::new(
            node.display.scroll_offset.unwrap_or(0),
            lines.len(),
            self.visible_rows(),
        );
        // 0 redraws in place
        let mut pending = Some(0isize);

        loop {
            if let Some(delta) = pending.take() {
                scroller.visible = self.visible_rows();
                match scroller.scroll(delta) {
                    Scroll::AtTop => self.status.set("Reached top of file"),
                    Scroll::AtEnd => self.status.set("Reached end of file"),
                    Scroll::Moved => self.draw_text(&lines, scroller.first_line),
                }
                self.history.current_mut().display.scroll_offset = Some(scroller.first_line);
                self.status.draw(&mut self.screen, &self.theme);
            }

            let page = self.visible_rows().saturating_sub(1) as isize;
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
                    pending = Some(0);
                }
                Key::Escape => {
                    if ui::confirm_quit(&mut self.screen, &self.theme)? {
                        return Ok(ViewOrder::Quit);
                    }
                    pending = Some(0);
                }
                Key::F1 => {
                    self.history.add(embedded::manual())?;
                    return Ok(ViewOrder::None);
                }
                Key::F5 => return Ok(ViewOrder::Refresh),
                Key::F9 => {
                    let mut target = self.history.current().location.clone();
                    target.item_type = ItemType::Binary;
                    self.history.add(target)?;
                    return Ok(ViewOrder::None);
                }
                Key::Up => pending = Some(-1),
                Key::Down => pending = Some(1),
                Key::Home => pending = Some(-(scroller.first_line as isize)),
                Key::PageUp => pending = Some(-page),
                Key::PageDown => pending = Some(page),
                Key::Quit => return Ok(ViewOrder::Quit),
                // End has no meaning here; neither do the rest
                _ => {}
            }
        }
    }

    fn draw_text(&mut self, lines: &[String], first_line: usize) {
        let cols = self.screen.cols();
        let attr = self.theme.text;
        for row in 0..self.visible_rows() {
            let text = lines.get(first_line + row).map_or("", String::as_str);
            let row = u16::try_from(row + 1).unwrap_or(u16::MAX);
            draw_field(&mut self.screen, text, attr, 0, row, cols);
        }
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

    #[test]
    fn scroller_reports_the_edges() {
        let mut s = TextScroller::new(0, 10, 4);
        assert_eq!(s.scroll(-1), Scroll::AtTop);
        assert_eq!(s.scroll(3), Scroll::Moved);
        assert_eq!(s.first_line, 3);
        assert_eq!(s.scroll(3), Scroll::Moved);
        assert_eq!(s.first_line, 6);
        // lines 6..10 fill the screen exactly, so one more step is allowed
        assert!(!s.at_end());
        assert_eq!(s.scroll(1), Scroll::Moved);
        assert!(s.at_end());
        assert_eq!(s.scroll(1), Scroll::AtEnd);
        assert_eq!(s.scroll(-100), Scroll::Moved);
        assert_eq!(s.first_line, 0);
    }

    fn numbered(count: usize) -> Vec<u8> {
        (0..count)
            .map(|i| format!("line {i}\n"))
            .collect::<String>()
            .into_bytes()
    }

    fn browser_on(raw: &[u8], keys: Vec<Key>) -> Browser<MockScreen, MockTransport> {
        let mut b = Browser::new(
            MockScreen::new(40, 6).with_keys(keys),
            Fetcher::new(MockTransport::new(), NetworkConfig::default()),
            Theme::default(),
            DEFAULT_CACHE_LIMIT,
            DownloadConfig::default(),
        );
        b.open(Location::gopher("h", 70, ItemType::File, "/doc.txt"))
            .unwrap();
        b.history.current_mut().store(raw).unwrap();
        b
    }

    #[test]
    fn shows_size_and_first_page() {
        let raw = numbered(20);
        let mut b = browser_on(&raw, vec![Key::Backspace]);
        assert_eq!(b.display_text(TextFormat::Plain).unwrap(), ViewOrder::Back);
        assert_eq!(b.screen.row_text(1), "line 0");
        assert_eq!(b.screen.row_text(4), "line 3");
        assert_eq!(b.screen.row_text(5), format!("File loaded ({} bytes)", raw.len()));
    }

    #[test]
    fn scrolling_is_remembered() {
        let raw = numbered(20);
        let keys = vec![Key::Down, Key::PageDown, Key::Quit];
        let mut b = browser_on(&raw, keys);
        assert_eq!(b.display_text(TextFormat::Plain).unwrap(), ViewOrder::Quit);
        assert_eq!(b.screen.row_text(1), "line 4");
        assert_eq!(b.history.current().display.scroll_offset, Some(4));

        b.screen.push_key(Key::Quit);
        b.display_text(TextFormat::Plain).unwrap();
        assert_eq!(b.screen.row_text(1), "line 4");
    }

    #[test]
    fn top_and_end_are_reported() {
        // two lines plus the empty tail fit in four rows
        let raw = numbered(2);
        let mut b = browser_on(&raw, vec![Key::Up]);
        b.display_text(TextFormat::Plain).unwrap();
        assert_eq!(b.screen.row_text(5), "Reached top of file");

        let mut b = browser_on(&raw, vec![Key::Down]);
        b.display_text(TextFormat::Plain).unwrap();
        assert_eq!(b.screen.row_text(5), "Reached end of file");
        assert_eq!(b.screen.row_text(1), "line 0");
    }

    #[test]
    fn end_does_nothing() {
        let raw = numbered(20);
        let mut b = browser_on(&raw, vec![Key::End, Key::Quit]);
        b.display_text(TextFormat::Plain).unwrap();
        assert_eq!(b.screen.row_text(1), "line 0");
        assert_eq!(b.history.current().display.scroll_offset, Some(0));
    }

    #[test]
    fn home_returns_to_the_top() {
        let raw = numbered(20);
        let mut b = browser_on(&raw, vec![Key::PageDown, Key::PageDown, Key::Home, Key::Quit]);
        b.display_text(TextFormat::Plain).unwrap();
        assert_eq!(b.screen.row_text(1), "line 0");
    }

    #[test]
    fn html_is_converted() {
        let raw = b"<html><title>Hi</title><p>one &amp; two</p></html>";
        let mut b = browser_on(raw, vec![Key::Quit]);
        b.display_text(TextFormat::Html).unwrap();
        assert_eq!(b.screen.row_text(1), "Hi");
        assert_eq!(b.screen.row_text(2), "one _ two");
    }

    #[test]
    fn f9_saves_the_current_document() {
        let mut b = browser_on(b"text", vec![Key::F9]);
        assert_eq!(b.display_text(TextFormat::Plain).unwrap(), ViewOrder::None);
        let pushed = &b.history.current().location;
        assert_eq!(pushed.item_type, ItemType::Binary);
        assert_eq!(pushed.selector, b"/doc.txt");
    }

    #[test]
    fn f1_and_f5() {
        let mut b = browser_on(b"text", vec![Key::F5]);
        assert_eq!(b.display_text(TextFormat::Plain).unwrap(), ViewOrder::Refresh);
        let mut b = browser_on(b"text", vec![Key::F1]);
        assert_eq!(b.display_text(TextFormat::Plain).unwrap(), ViewOrder::None);
        assert_eq!(b.history.current().location, embedded::manual());
    }
}
