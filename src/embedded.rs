//! Pages served from memory for the `#welcome`, `#manual` and `#license`
//! pseudo-hosts.

use crate::location::{ItemType, Location};

const WELCOME: &str = concat!(
    "i\n",
    "i  ***  gopher-tui v", env!("CARGO_PKG_VERSION"), "  ***\n",
    "i\n",
    "i Welcome to gopher-tui, a keyboard-driven gopher client for the terminal.\n",
    "i\n",
    "i Below are a few gopher holes to start your journey. If you already know\n",
    "i where you want to go, press TAB and type the address into the URL bar.\n",
    "i Press F1 at any time for the manual.\n",
    "i\n",
    "1Veronica-2 - search gopherspace\t/v2\tgopher.floodgap.com\t70\n",
    "1Floodgap Systems gopher server\t\tgopher.floodgap.com\t70\n",
    "1SDF Public Access UNIX System\t\tsdf.org\t70\n",
    "1Bitreich\t\tbitreich.org\t70\n",
    "i\n",
    "iOffline documentation:\n",
    "0The gopher-tui manual\t\t#manual\t70\n",
    "0License\t\t#license\t70\n",
);

const MANUAL: &str = concat!(
    "\n",
    " gopher-tui v", env!("CARGO_PKG_VERSION"), "\n",
    "\n",
    " ** Key bindings **\n",
    "\n",
    "   TAB       - Edit the URL bar\n",
    "   ESC       - Quit (asks for confirmation)\n",
    "   CTRL+C    - Quit immediately\n",
    "   UP/DOWN   - Select the previous/next link, or scroll by one line\n",
    "   PGUP/PGDN - Move by one page\n",
    "   HOME/END  - Go to the beginning/end of a menu\n",
    "   ENTER     - Open the selected link\n",
    "   BACKSPACE - Go back to the previous location\n",
    "   F1        - Show this manual\n",
    "   F5        - Reload the current location\n",
    "   F9        - Save the selected link (or the current document) to disk\n",
    "\n",
    " While a page loads, ESC or BACKSPACE aborts the transfer.\n",
    "\n",
    " ** Color scheme **\n",
    "\n",
    " Colors are set with the ui.color_scheme option of the configuration file\n",
    " (or the GOPHER_TUI_UI__COLOR_SCHEME environment variable). The value holds\n",
    " exactly 18 hexadecimal digits: nine attributes of two digits each, XY,\n",
    " where X is the background and Y the foreground color, using the CGA\n",
    " palette:\n",
    "\n",
    "   0 black       4 red          8 dark gray     C light red\n",
    "   1 blue        5 magenta      9 light blue    D light magenta\n",
    "   2 green       6 brown        A light green   E yellow\n",
    "   3 cyan        7 light gray   B light cyan    F white\n",
    "\n",
    " Attributes, in order:\n",
    "   1. normal text            6. item type column in menus\n",
    "   2. status bar (info)      7. error items in menus\n",
    "   3. status bar (warning)   8. selectable items in menus\n",
    "   4. URL bar                9. selected item in menus\n",
    "   5. URL bar decorations\n",
    "\n",
    " Default scheme ..............: 177047707818141220\n",
    " Black and white .............: 077070707808070770\n",
    " Green phosphor ..............: 022020202002020220\n",
    "\n",
    " ** Standards **\n",
    "\n",
    "   RFC 1436: The Internet Gopher Protocol\n",
    "   RFC 4266: The gopher URI Scheme\n",
);

const LICENSE: &str = concat!(
    "\n",
    " gopher-tui v", env!("CARGO_PKG_VERSION"), "\n",
    "\n",
    " Permission is hereby granted, free of charge, to any person obtaining a copy\n",
    " of this software and associated documentation files (the \"Software\"), to\n",
    " deal in the Software without restriction, including without limitation the\n",
    " rights to use, copy, modify, merge, publish, distribute, sublicense, and/or\n",
    " sell copies of the Software, and to permit persons to whom the Software is\n",
    " furnished to do so, subject to the following conditions:\n",
    "\n",
    " The above copyright notice and this permission notice shall be included in\n",
    " all copies or substantial portions of the Software.\n",
    "\n",
    " THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR\n",
    " IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,\n",
    " FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.\n",
);

/// Body of the embedded page named by a `#name` host. Unknown names get the
/// welcome page.
pub fn page(host: &str) -> &'static [u8] {
    let name = host.trim_start_matches('#');
    let page = match name.chars().next() {
        Some('m') => MANUAL,
        Some('l') => LICENSE,
        _ => WELCOME,
    };
    page.as_bytes()
}

pub fn welcome() -> Location {
    Location::gopher("#welcome", 70, ItemType::Directory, "")
}

pub fn manual() -> Location {
    Location::gopher("#manual", 70, ItemType::File, "")
}
