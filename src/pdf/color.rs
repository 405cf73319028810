//! Highlight colors

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// RGB color of a highlight annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl HighlightColor {
    pub const YELLOW: HighlightColor = HighlightColor::new(255, 255, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    fn named(name: &str) -> Option<Self> {
        let color = match name {
            "yellow" => Self::YELLOW,
            "green" => Self::new(0, 255, 0),
            "blue" => Self::new(0, 0, 255),
            "red" => Self::new(255, 0, 0),
            "orange" => Self::new(255, 165, 0),
            "pink" => Self::new(255, 192, 203),
            "purple" => Self::new(128, 0, 128),
            "cyan" => Self::new(0, 255, 255),
            "magenta" => Self::new(255, 0, 255),
            "gray" | "grey" => Self::new(128, 128, 128),
            _ => return None,
        };
        Some(color)
    }

    fn from_hex(hex: &str) -> Option<Self> {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;

        match digits.as_slice() {
            [r, g, b] => Some(Self::new(r * 17, g * 17, b * 17)),
            [r1, r2, g1, g2, b1, b2] => {
                Some(Self::new(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2))
            }
            _ => None,
        }
    }

    fn from_rgb_function(args: &str) -> Option<Self> {
        let parts: Vec<u8> = args
            .split(',')
            .map(|p| p.trim().parse::<u8>().ok())
            .collect::<Option<_>>()?;

        match parts.as_slice() {
            [r, g, b] => Some(Self::new(*r, *g, *b)),
            _ => None,
        }
    }
}

impl Default for HighlightColor {
    fn default() -> Self {
        Self::YELLOW
    }
}

impl FromStr for HighlightColor {
    type Err = Error;

    /// Accepts a color name, `#RGB`, `#RRGGBB` or `rgb(r, g, b)`.
    /// An empty string selects the default.
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_lowercase();
        if value.is_empty() {
            return Ok(Self::default());
        }

        let parsed = if let Some(hex) = value.strip_prefix('#') {
            Self::from_hex(hex)
        } else if let Some(args) = value
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Self::from_rgb_function(args)
        } else {
            Self::named(&value)
        };

        parsed.ok_or_else(|| Error::InvalidColor {
            value: s.to_string(),
        })
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}
