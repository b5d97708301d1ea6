#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod browser;
pub mod config;
pub mod content;
pub mod embedded;
pub mod history;
pub mod location;
pub mod menu;
pub mod menu_view;
pub mod net;
pub mod screen;
pub mod terminal;
pub mod text_view;
pub mod theme;
pub mod ui;
pub mod wrap;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
