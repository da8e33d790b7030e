#![forbid(unsafe_code)]

use ratatui::style::Color;

use crate::board::model::{Priority, TaskStatus, hex_rgb};
use crate::config::ThemeName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub name: ThemeName,
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub accent_text: Color,
    pub border: Color,
}

impl Theme {
    #[must_use]
    pub const fn for_name(name: ThemeName) -> Self {
        match name {
            ThemeName::Light => Self {
                name,
                background: Color::Rgb(0xf5, 0xf5, 0xf5),
                text: Color::Rgb(0x33, 0x33, 0x33),
                muted: Color::Rgb(0x88, 0x88, 0x88),
                accent: Color::Rgb(0x4a, 0x90, 0xe2),
                accent_text: Color::White,
                border: Color::Rgb(0xcc, 0xcc, 0xcc),
            },
            ThemeName::Dark => Self {
                name,
                background: Color::Rgb(0x1e, 0x1e, 0x1e),
                text: Color::Rgb(0xe0, 0xe0, 0xe0),
                muted: Color::Rgb(0x80, 0x80, 0x80),
                accent: Color::Rgb(0xbb, 0x86, 0xfc),
                accent_text: Color::Black,
                border: Color::Rgb(0x44, 0x44, 0x44),
            },
            ThemeName::Sepia => Self {
                name,
                background: Color::Rgb(0xf4, 0xec, 0xd8),
                text: Color::Rgb(0x5b, 0x46, 0x36),
                muted: Color::Rgb(0x9c, 0x85, 0x6c),
                accent: Color::Rgb(0xa0, 0x52, 0x2d),
                accent_text: Color::Rgb(0xf4, 0xec, 0xd8),
                border: Color::Rgb(0xd3, 0xc4, 0xa5),
            },
            ThemeName::Forest => Self {
                name,
                background: Color::Rgb(0x1b, 0x2d, 0x1b),
                text: Color::Rgb(0xd8, 0xe8, 0xd0),
                muted: Color::Rgb(0x7d, 0x99, 0x7a),
                accent: Color::Rgb(0x4c, 0xaf, 0x50),
                accent_text: Color::Rgb(0x10, 0x20, 0x10),
                border: Color::Rgb(0x2e, 0x4a, 0x2e),
            },
        }
    }
}

/// `#RRGGBB` as a terminal color.
#[must_use]
pub fn hex_color(hex: &str) -> Option<Color> {
    hex_rgb(hex).map(|(r, g, b)| Color::Rgb(r, g, b))
}

#[must_use]
pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
        Priority::Unset => Color::Gray,
    }
}

#[must_use]
pub fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NotStarted => "○",
        TaskStatus::InProgress => "◐",
        TaskStatus::Done => "●",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_palette_colors() {
        assert_eq!(hex_color("#FF6B6B"), Some(Color::Rgb(0xff, 0x6b, 0x6b)));
        assert_eq!(hex_color("red"), None);
    }

    #[test]
    fn every_theme_is_distinct() {
        let backgrounds: Vec<Color> = ThemeName::ALL
            .iter()
            .map(|n| Theme::for_name(*n).background)
            .collect();
        for (i, a) in backgrounds.iter().enumerate() {
            assert!(backgrounds[i + 1..].iter().all(|b| b != a));
        }
    }
}
