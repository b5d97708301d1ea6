use tracing::warn;

use crate::screen::Attr;

pub const DEFAULT_SCHEME: &str = "177047707818141220";

/// Resolved attributes for every part of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub text: Attr,
    pub status_info: Attr,
    pub status_warn: Attr,
    pub url_bar: Attr,
    pub url_bar_deco: Attr,
    pub menu_type: Attr,
    pub menu_error: Attr,
    pub menu_selectable: Attr,
    pub menu_current: Attr,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            text: Attr(0x17),
            status_info: Attr(0x70),
            status_warn: Attr(0x47),
            url_bar: Attr(0x70),
            url_bar_deco: Attr(0x78),
            menu_type: Attr(0x18),
            menu_error: Attr(0x14),
            menu_selectable: Attr(0x12),
            menu_current: Attr(0x20),
        }
    }
}

impl Theme {
    /// Decodes an 18-hex-digit scheme, one byte per interface element.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        if scheme.len() != 18 {
            return None;
        }
        let bytes = hex::decode(scheme).ok()?;
        let [text, status_info, status_warn, url_bar, url_bar_deco, menu_type, menu_error, menu_selectable, menu_current] =
            <[u8; 9]>::try_from(bytes).ok()?;
        Some(Self {
            text: Attr(text),
            status_info: Attr(status_info),
            status_warn: Attr(status_warn),
            url_bar: Attr(url_bar),
            url_bar_deco: Attr(url_bar_deco),
            menu_type: Attr(menu_type),
            menu_error: Attr(menu_error),
            menu_selectable: Attr(menu_selectable),
            menu_current: Attr(menu_current),
        })
    }

    /// Falls back to the built-in scheme when `scheme` is missing or malformed.
    pub fn resolve(scheme: Option<&str>) -> Self {
        match scheme {
            None => Self::default(),
            Some(raw) => Self::from_scheme(raw.trim()).unwrap_or_else(|| {
                warn!(scheme = raw, "ignoring malformed color scheme");
                Self::default()
            }),
        }
    }
}
