use anyhow::{Context, Result};
use tracing::info;

use crate::browser::Browser;
use crate::config;
use crate::location::Location;
use crate::net::{Fetcher, TcpTransport};
use crate::terminal::CrosstermScreen;
use crate::theme::Theme;

/// Runs a browsing session on the real terminal, starting from the
/// welcome page or from `start` pushed on top of it.
pub fn run(start: Option<Location>) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let theme = Theme::resolve(Some(&cfg.ui.color_scheme));

    let transport = TcpTransport::new(cfg.network.connect_timeout);
    let fetcher = Fetcher::new(transport, cfg.network.clone());
    let screen = CrosstermScreen::new().context("initialise terminal")?;

    let mut browser = Browser::new(
        screen,
        fetcher,
        theme,
        cfg.history.cache_limit_bytes,
        cfg.downloads.clone(),
    );
    if let Some(location) = start {
        info!(url = %location, "opening start location");
        browser.open(location).context("open start location")?;
    }

    let farewell = browser.run();
    // restores the terminal before anything is printed
    let released = browser.shutdown();
    info!(pages = released, "session closed");

    if let Some(message) = farewell? {
        println!("{message}");
    }
    Ok(())
}
