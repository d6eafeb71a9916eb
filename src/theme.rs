//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::item::ItemKind;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Pastel shades per item kind and UI colours.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Shades indexed by `kind_slot(kind)`; item `shade` picks within the list.
    pub shades: [Vec<Color>; 6],
    /// Board background.
    pub bg: Color,
    /// Border lines.
    pub div_line: Color,
    /// Text (score, level).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text (help line).
    pub inactive_fg: Color,
    /// Frozen tile tint.
    pub frost: Color,
    /// Cursor outline.
    pub cursor: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::pastel_default()
    }
}

/// Theme key and default shades for each kind, in `kind_slot` order.
const KIND_DEFAULTS: [(&str, &[&str]); 6] = [
    ("donut", &["#f7b2d9", "#ffd1b3", "#bcdcff", "#b8f3dc", "#c7b6f7"]),
    ("cookie", &["#e6cfb2", "#ffd8a8", "#ffe8cc"]),
    ("croissant", &["#ffd79a", "#f6c37b", "#f9b365"]),
    ("pudding", &["#d3bdf0", "#c0e7d8", "#ffe0e9"]),
    ("boba", &["#bcdcff", "#f7b2d9", "#b8f3dc", "#ffd1b3"]),
    ("burst", &["#ffcc66"]),
];

fn kind_slot(kind: ItemKind) -> usize {
    match kind {
        ItemKind::Donut => 0,
        ItemKind::Cookie => 1,
        ItemKind::Croissant => 2,
        ItemKind::Pudding => 3,
        ItemKind::Boba => 4,
        ItemKind::Burst => 5,
    }
}

fn hex_list(values: &[&str]) -> Vec<Color> {
    values.iter().filter_map(|v| parse_hex(v).ok()).collect()
}

impl Theme {
    /// Hardcoded pastel defaults.
    pub fn pastel_default() -> Self {
        Self {
            shades: KIND_DEFAULTS.map(|(_, hexes)| hex_list(hexes)),
            bg: Color::Rgb(0x2b, 0x26, 0x33),
            div_line: Color::Rgb(0x6e, 0x5f, 0x80),
            main_fg: Color::Rgb(0xf5, 0xee, 0xf8),
            title: Color::Rgb(0xf7, 0xb2, 0xd9),
            inactive_fg: Color::Rgb(0x8a, 0x80, 0x96),
            frost: Color::Rgb(0x82, 0xb4, 0xf0),
            cursor: Color::Rgb(0xff, 0xff, 0xff),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Kind keys (`donut`, `cookie`, ...) take a space-separated list of hex shades.
    /// Falls back to pastel defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path.filter(|p| p.exists()) {
            Some(p) => Self::from_map(&parse_theme_file(&std::fs::read_to_string(p)?)),
            None => Self::pastel_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Replace kind colours with one strong colour per kind (shades collapse).
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        let strong: [&str; 6] = match palette {
            crate::Palette::Normal => return,
            crate::Palette::HighContrast => {
                ["#FF00FF", "#FFAA00", "#FFFF00", "#00FFFF", "#00FF00", "#FFFFFF"]
            }
            crate::Palette::Colorblind => {
                ["#EE3377", "#EE7733", "#BBBB00", "#0077BB", "#009988", "#FFFFFF"]
            }
        };
        self.shades = strong.map(|hex| hex_list(&[hex]));
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let defaults = Self::pastel_default();
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let mut shades = defaults.shades.clone();
        for (slot, (key, _)) in KIND_DEFAULTS.iter().enumerate() {
            if let Some(list) = map.get(*key) {
                let parsed: Vec<Color> = list
                    .split_whitespace()
                    .filter_map(|v| parse_hex(v).ok())
                    .collect();
                if !parsed.is_empty() {
                    shades[slot] = parsed;
                }
            }
        }
        Self {
            shades,
            bg: get("main_bg").or_else(|| get("meter_bg")).unwrap_or(defaults.bg),
            div_line: get("div_line").unwrap_or(defaults.div_line),
            main_fg: get("main_fg").unwrap_or(defaults.main_fg),
            title: get("title").unwrap_or(defaults.title),
            inactive_fg: get("inactive_fg").unwrap_or(defaults.inactive_fg),
            frost: get("frost").or_else(|| get("cpu_box")).unwrap_or(defaults.frost),
            cursor: get("selected_fg").or_else(|| get("hi_fg")).unwrap_or(defaults.cursor),
        }
    }

    /// Colour for an item of `kind` with cosmetic `shade`.
    #[inline]
    pub fn item_color(&self, kind: ItemKind, shade: u8) -> Color {
        let list = &self.shades[kind_slot(kind)];
        if list.is_empty() {
            return self.main_fg;
        }
        list[(shade as usize) % list.len()]
    }
}

/// Collect `theme[key]="value"` entries; comments, blank lines and empty values are skipped.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.strip_prefix("theme[")?.split_once(']')?;
            let value = value.trim_start().strip_prefix('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!value.is_empty()).then(|| (key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>, scale: u8| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .map(|v| v * scale)
            .ok_or_else(|| ThemeError::InvalidHex(s.to_string()))
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2, 1)?, channel(2..4, 1)?, channel(4..6, 1)?),
        3 => (channel(0..1, 17)?, channel(1..2, 17)?, channel(2..3, 17)?),
        _ => return Err(ThemeError::InvalidHex(s.to_string())),
    };
    Ok(Color::Rgb(r, g, b))
}
