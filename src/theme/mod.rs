//! Color themes for the upload dialog

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeKind {
    #[default]
    Nord,
    Paper,
}

impl ThemeKind {
    #[cfg(test)]
    pub const ALL: [ThemeKind; 2] = [ThemeKind::Nord, ThemeKind::Paper];

    pub fn name(&self) -> &'static str {
        match self {
            ThemeKind::Nord => "Nord",
            ThemeKind::Paper => "Paper",
        }
    }

    /// Parse theme from name string (case-insensitive), unknown names give the default
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().replace([' ', '-'], "").as_str() {
            "nord" | "dark" => ThemeKind::Nord,
            "paper" | "light" => ThemeKind::Paper,
            _ => ThemeKind::default(),
        }
    }

    pub fn colors(&self) -> &'static ThemeColors {
        match self {
            ThemeKind::Nord => &NORD,
            ThemeKind::Paper => &PAPER,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThemeColors {
    pub bg_primary: Color,
    pub bg_secondary: Color,
    pub bg_highlight: Color,

    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_dim: Color,
    pub text_accent: Color,

    pub border_normal: Color,
    pub border_focus: Color,

    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,

    pub progress_fill: Color,
    pub progress_empty: Color,
}

pub const NORD: ThemeColors = ThemeColors {
    bg_primary: Color::Rgb(46, 52, 64),
    bg_secondary: Color::Rgb(59, 66, 82),
    bg_highlight: Color::Rgb(76, 86, 106),

    text_primary: Color::Rgb(236, 239, 244),
    text_secondary: Color::Rgb(216, 222, 233),
    text_dim: Color::Rgb(110, 120, 140),
    text_accent: Color::Rgb(136, 192, 208),

    border_normal: Color::Rgb(76, 86, 106),
    border_focus: Color::Rgb(136, 192, 208),

    success: Color::Rgb(163, 190, 140),
    warning: Color::Rgb(235, 203, 139),
    error: Color::Rgb(191, 97, 106),
    info: Color::Rgb(129, 161, 193),

    progress_fill: Color::Rgb(136, 192, 208),
    progress_empty: Color::Rgb(67, 76, 94),
};

pub const PAPER: ThemeColors = ThemeColors {
    bg_primary: Color::Rgb(250, 248, 242),
    bg_secondary: Color::Rgb(236, 232, 222),
    bg_highlight: Color::Rgb(214, 226, 240),

    text_primary: Color::Rgb(40, 40, 46),
    text_secondary: Color::Rgb(84, 84, 96),
    text_dim: Color::Rgb(150, 148, 140),
    text_accent: Color::Rgb(30, 96, 170),

    border_normal: Color::Rgb(190, 186, 176),
    border_focus: Color::Rgb(30, 96, 170),

    success: Color::Rgb(46, 125, 50),
    warning: Color::Rgb(176, 110, 0),
    error: Color::Rgb(183, 28, 28),
    info: Color::Rgb(21, 101, 192),

    progress_fill: Color::Rgb(30, 96, 170),
    progress_empty: Color::Rgb(222, 218, 208),
};

impl ThemeColors {
    pub fn text(&self) -> Style {
        Style::default().fg(self.text_primary)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.text_secondary)
    }

    /// Hints and disabled controls
    pub fn text_dimmed(&self) -> Style {
        Style::default().fg(self.text_dim)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.text_accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.border_normal)
    }

    pub fn border_focused(&self) -> Style {
        Style::default().fg(self.border_focus)
    }

    pub fn selected(&self) -> Style {
        Style::default().fg(self.text_accent).bg(self.bg_highlight)
    }

    pub fn success(&self) -> Style {
        Style::default().fg(self.success)
    }

    pub fn warning(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn info(&self) -> Style {
        Style::default().fg(self.info)
    }

    /// The key itself in a hint
    pub fn key(&self) -> Style {
        Style::default()
            .fg(self.text_accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn progress(&self) -> Style {
        Style::default()
            .fg(self.progress_fill)
            .bg(self.progress_empty)
    }

    pub fn background(&self) -> Style {
        Style::default().bg(self.bg_primary)
    }

    /// Header/footer background
    pub fn bar(&self) -> Style {
        Style::default().bg(self.bg_secondary)
    }
}
