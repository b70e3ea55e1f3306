//! Colour specs and style slots.
//!
//! Every colour carries both an 8-colour and a 256-colour code; the palette
//! decides at startup which set the terminal gets. Styles have independent
//! foreground and background slots so nested paints override per slot.

use std::fmt::Write as _;

/// A named colour with codes for both terminal depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub c8: u8,
    pub c256: u8,
}

pub const REGULAR: Color = Color { c8: 7, c256: 7 };
pub const MUTED: Color = Color { c8: 4, c256: 244 };
pub const STRING: Color = Color { c8: 2, c256: 77 };
pub const KEYWORD: Color = Color { c8: 1, c256: 214 };
pub const KEY: Color = Color { c8: 5, c256: 177 };

/// Background used for the selected row.
pub const SELECT_BG: Color = Color { c8: 7, c256: 237 };
/// Background used for search-match highlights.
pub const MATCH_BG: Color = Color { c8: 3, c256: 88 };

/// One slot of a style override: paint the foreground or the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Fg(Color),
    Bg(Color),
}

/// The style state a span is drawn with. `None` means the terminal default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

impl Style {
    /// Returns this style with one slot overridden.
    pub fn with(self, paint: Paint) -> Self {
        match paint {
            Paint::Fg(c) => Style { fg: Some(c), ..self },
            Paint::Bg(c) => Style { bg: Some(c), ..self },
        }
    }
}

/// Escape emitter bound to the terminal's colour depth.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    deep: bool,
}

impl Palette {
    pub fn new(deep: bool) -> Self {
        Palette { deep }
    }

    /// Detects 256-colour support from the environment.
    pub fn detect() -> Self {
        let deep = std::env::var("TERM").map_or(false, |t| t.contains("256color"))
            || std::env::var("COLORTERM").is_ok();
        Palette { deep }
    }

    /// The sequence that sets the given foreground, or restores the default.
    pub fn fg(&self, color: Option<Color>) -> String {
        let mut s = String::new();
        match color {
            Some(c) if self.deep => {
                let _ = write!(s, "\x1b[38;5;{}m", c.c256);
            }
            Some(c) => {
                let _ = write!(s, "\x1b[3{}m", c.c8);
            }
            None => s.push_str("\x1b[39m"),
        }
        s
    }

    /// The sequence that sets the given background, or restores the default.
    pub fn bg(&self, color: Option<Color>) -> String {
        let mut s = String::new();
        match color {
            Some(c) if self.deep => {
                let _ = write!(s, "\x1b[48;5;{}m", c.c256);
            }
            Some(c) => {
                let _ = write!(s, "\x1b[4{}m", c.c8);
            }
            None => s.push_str("\x1b[49m"),
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_palette_emits_256_sequences() {
        let p = Palette::new(true);
        assert_eq!(p.fg(Some(STRING)), "\x1b[38;5;77m");
        assert_eq!(p.bg(Some(MATCH_BG)), "\x1b[48;5;88m");
    }

    #[test]
    fn shallow_palette_emits_8_colour_sequences() {
        let p = Palette::new(false);
        assert_eq!(p.fg(Some(KEYWORD)), "\x1b[31m");
        assert_eq!(p.bg(Some(SELECT_BG)), "\x1b[47m");
    }

    #[test]
    fn default_slots_reset() {
        let p = Palette::new(true);
        assert_eq!(p.fg(None), "\x1b[39m");
        assert_eq!(p.bg(None), "\x1b[49m");
    }

    #[test]
    fn style_overrides_one_slot() {
        let s = Style::default().with(Paint::Fg(KEY)).with(Paint::Bg(SELECT_BG));
        assert_eq!(s.fg, Some(KEY));
        assert_eq!(s.bg, Some(SELECT_BG));
        let s2 = s.with(Paint::Fg(MUTED));
        assert_eq!(s2.fg, Some(MUTED));
        assert_eq!(s2.bg, Some(SELECT_BG));
    }
}
