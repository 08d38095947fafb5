//! Dashboard color themes and table density

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Colors behind the dashboard's CSS custom properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub surface: &'static str,
    pub text: &'static str,
    pub text_secondary: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
    pub accent: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Midnight,
    Ocean,
    Sunset,
}

impl Theme {
    pub const ALL: [Theme; 5] = [Theme::Light, Theme::Dark, Theme::Midnight, Theme::Ocean, Theme::Sunset];

    pub fn id(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Midnight => "midnight",
            Theme::Ocean => "ocean",
            Theme::Sunset => "sunset",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Theme::Light => "Light",
            Theme::Dark => "Dark",
            Theme::Midnight => "Midnight",
            Theme::Ocean => "Ocean",
            Theme::Sunset => "Sunset",
        }
    }

    /// Dark and midnight get the `dark-mode` body class.
    pub fn is_dark(self) -> bool {
        matches!(self, Theme::Dark | Theme::Midnight)
    }

    /// Light toggles to dark, every other theme back to light.
    pub fn toggled(self) -> Theme {
        if self == Theme::Light {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Light => Palette {
                background: "linear-gradient(135deg, #667eea 0%, #764ba2 100%)",
                surface: "rgba(255, 255, 255, 0.95)",
                text: "#1e293b",
                text_secondary: "#64748b",
                primary: "#6366f1",
                secondary: "#10b981",
                accent: "#ec4899",
            },
            Theme::Dark => Palette {
                background: "linear-gradient(135deg, #0f172a 0%, #1e1b4b 100%)",
                surface: "rgba(30, 41, 59, 0.95)",
                text: "#f1f5f9",
                text_secondary: "#cbd5e1",
                primary: "#818cf8",
                secondary: "#34d399",
                accent: "#f472b6",
            },
            Theme::Midnight => Palette {
                background: "linear-gradient(135deg, #000000 0%, #1a1a2e 100%)",
                surface: "rgba(26, 26, 46, 0.95)",
                text: "#ffffff",
                text_secondary: "#a0aec0",
                primary: "#bb86fc",
                secondary: "#03dac6",
                accent: "#cf6679",
            },
            Theme::Ocean => Palette {
                background: "linear-gradient(135deg, #0077be 0%, #004e7a 100%)",
                surface: "rgba(255, 255, 255, 0.95)",
                text: "#1e293b",
                text_secondary: "#64748b",
                primary: "#0ea5e9",
                secondary: "#06b6d4",
                accent: "#8b5cf6",
            },
            Theme::Sunset => Palette {
                background: "linear-gradient(135deg, #ff6b6b 0%, #feca57 100%)",
                surface: "rgba(255, 255, 255, 0.95)",
                text: "#1e293b",
                text_secondary: "#64748b",
                primary: "#f97316",
                secondary: "#eab308",
                accent: "#ec4899",
            },
        }
    }

    /// `--theme-*` custom property declarations for a `:root` block.
    pub fn css_variables(self) -> String {
        let p = self.palette();
        format!(
            "--theme-background: {}; --theme-surface: {}; --theme-text: {}; \
             --theme-textSecondary: {}; --theme-primary: {}; --theme-secondary: {}; --theme-accent: {};",
            p.background, p.surface, p.text, p.text_secondary, p.primary, p.secondary, p.accent
        )
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown theme '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    #[default]
    Comfortable,
    Compact,
}

impl Density {
    pub fn id(self) -> &'static str {
        match self {
            Density::Comfortable => "comfortable",
            Density::Compact => "compact",
        }
    }

    /// Table cell padding in rem
    pub fn cell_padding(self) -> f32 {
        match self {
            Density::Comfortable => 0.75,
            Density::Compact => 0.35,
        }
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Density {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "comfortable" => Ok(Density::Comfortable),
            "compact" => Ok(Density::Compact),
            other => Err(format!("unknown density '{}'", other)),
        }
    }
}
