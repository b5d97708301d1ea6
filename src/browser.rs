use anyhow::Result;
use tracing::{debug, error};

use crate::config::DownloadConfig;
use crate::content::TextFormat;
use crate::embedded;
use crate::history::{History, OutOfMemory};
use crate::location::{ItemType, Location};
use crate::net::{FetchObserver, Fetcher, Transport};
use crate::screen::{Key, Screen};
use crate::theme::Theme;
use crate::ui::{self, draw_status_bar, draw_url_bar, LineEditor, StatusBar};

const DOWNLOAD_PROMPT: &str = "Download as: ";
const FILE_NAME_MAX_LEN: usize = 63;

/// What a view asks the main loop to do once it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOrder {
    /// Show whatever is now on top of the history.
    None,
    Back,
    /// Drop the current page's cache and display state, then show it again.
    Refresh,
    Quit,
}

/// Owns the history and the two external surfaces, and runs the
/// fetch/display loop.
pub struct Browser<S: Screen, T: Transport> {
    pub(crate) screen: S,
    pub(crate) fetcher: Fetcher<T>,
    pub(crate) history: History,
    pub(crate) theme: Theme,
    pub(crate) status: StatusBar,
    downloads: DownloadConfig,
}

/// Shows fetch progress on the status row and turns Escape or Backspace
/// into an abort.
struct ScreenObserver<'a, S: Screen> {
    screen: &'a mut S,
    theme: &'a Theme,
}

impl<S: Screen> FetchObserver for ScreenObserver<'_, S> {
    fn progress(&mut self, message: &str) {
        draw_status_bar(self.screen, self.theme, message);
        if let Err(err) = self.screen.refresh() {
            debug!(error = %err, "could not refresh the screen");
        }
    }

    fn abort_requested(&mut self) -> bool {
        let mut abort = false;
        loop {
            match self.screen.key_pending() {
                Ok(true) => {}
                Ok(false) | Err(_) => break,
            }
            match self.screen.get_key() {
                Ok(Key::Escape | Key::Backspace) => abort = true,
                Ok(_) => {}
                Err(_) => break,
            }
        }
        abort
    }
}

impl<S: Screen, T: Transport> Browser<S, T> {
    /// A browser sitting on the welcome page.
    pub fn new(
        screen: S,
        fetcher: Fetcher<T>,
        theme: Theme,
        cache_limit: usize,
        downloads: DownloadConfig,
    ) -> Self {
        Self {
            screen,
            fetcher,
            history: History::with_cache_limit(embedded::welcome(), cache_limit),
            theme,
            status: StatusBar::default(),
            downloads,
        }
    }

    /// Queues a location on top of the welcome page.
    pub fn open(&mut self, location: Location) -> Result<(), OutOfMemory> {
        self.history.add(location)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    /// Ends the session: the history goes first, then the screen, which
    /// hands the terminal back. Returns the number of pages released.
    pub fn shutdown(self) -> usize {
        let Self {
            screen, history, ..
        } = self;
        let released = history.flush();
        drop(screen);
        released
    }

    /// Runs until the user quits. Returns the last status message, if one
    /// was never shown, so the caller can print it after the screen is gone.
    pub fn run(&mut self) -> Result<Option<String>> {
        self.screen.cursor_hide();
        self.screen.clear();

        loop {
            match self.step() {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) if err.is::<OutOfMemory>() => {
                    error!("out of memory, leaving");
                    self.status.take();
                    self.status.set("Out of memory!");
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        self.screen.cursor_show();
        let farewell = self.status.take();
        Ok((!farewell.is_empty()).then_some(farewell))
    }

    /// Shows the top of the history once. `false` means quit.
    fn step(&mut self) -> Result<bool> {
        let location = self.history.current().location.clone();

        if !location.item_type.is_displayable() {
            self.download(&location)?;
            self.history.back();
            return Ok(true);
        }

        draw_url_bar(&mut self.screen, &self.theme, &location);

        if self.history.current().cache.is_none() {
            let mut observer = ScreenObserver {
                screen: &mut self.screen,
                theme: &self.theme,
            };
            match self.fetcher.fetch(&location, &mut observer) {
                Ok(body) => {
                    self.history.cleanup_cache();
                    self.history.current_mut().store(&body)?;
                }
                Err(err) => {
                    debug!(url = %location, error = %err, "fetch failed, going back");
                    self.status.set(err.status_message());
                    self.history.back();
                    return Ok(true);
                }
            }
        }

        let order = match location.item_type {
            ItemType::File => self.display_text(TextFormat::Plain)?,
            ItemType::Html => self.display_text(TextFormat::Html)?,
            _ => self.display_menu()?,
        };

        match order {
            ViewOrder::None => {}
            ViewOrder::Back => self.history.back(),
            ViewOrder::Refresh => self.history.current_mut().invalidate(),
            ViewOrder::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Asks for a file name and saves the resource under it.
    fn download(&mut self, location: &Location) -> Result<()> {
        self.status.take();
        let row = self.screen.rows().saturating_sub(1);
        draw_status_bar(&mut self.screen, &self.theme, "");
        self.screen
            .put_str(DOWNLOAD_PROMPT, self.theme.status_info, 0, row);

        let prompt_width = DOWNLOAD_PROMPT.len() as u16;
        let field_width = self.screen.cols().saturating_sub(prompt_width);
        let mut editor = LineEditor::new(&location.file_name(), FILE_NAME_MAX_LEN);
        let entered = ui::edit_string(
            &mut self.screen,
            &mut editor,
            prompt_width,
            row,
            field_width,
            self.theme.status_info,
        )?;
        let Some(name) = entered.filter(|name| !name.trim().is_empty()) else {
            return Ok(());
        };

        let path = self.downloads.target(name.trim());
        let mut observer = ScreenObserver {
            screen: &mut self.screen,
            theme: &self.theme,
        };
        match self.fetcher.download(location, &path, &mut observer) {
            Ok(written) => self.status.set(format!("Saved {written} bytes on disk")),
            Err(err) => self.status.set(err.status_message()),
        }
        Ok(())
    }
}
