//! RGB colors used for channel tinting.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rgb {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);
    pub const CYAN: Self = Self::new(0, 255, 255);
    pub const MAGENTA: Self = Self::new(255, 0, 255);
    pub const YELLOW: Self = Self::new(255, 255, 0);

    /// Creates a color from components.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components as an array.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Scales every component by `level / 255`.
    #[inline]
    #[must_use]
    pub fn scaled(self, level: u8) -> [u8; 3] {
        let scale = |c: u8| {
            let v = u16::from(c) * u16::from(level) / 255;
            u8::try_from(v).unwrap_or(u8::MAX)
        };
        [scale(self.r), scale(self.g), scale(self.b)]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(v: [u8; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = Error;

    /// Parses `#rrggbb`; the leading `#` is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(Error::InvalidColor(s.to_owned()));
        }
        let component = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| Error::InvalidColor(s.to_owned()))
        };
        Ok(Self::new(component(0..2)?, component(2..4)?, component(4..6)?))
    }
}

/// Colors handed out to new channels, chosen to stay distinguishable
/// under the common forms of color blindness.
pub const COLORBLIND_FRIENDLY: [Rgb; 7] = [
    Rgb::new(0, 114, 178),
    Rgb::new(213, 94, 0),
    Rgb::new(0, 158, 115),
    Rgb::RED,
    Rgb::CYAN,
    Rgb::YELLOW,
    Rgb::WHITE,
];

/// Default tint for the channel at `index`.
#[must_use]
pub fn default_channel_color(index: usize) -> Rgb {
    COLORBLIND_FRIENDLY
        .get(index)
        .copied()
        .unwrap_or(Rgb::WHITE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_endpoints() {
        let c = Rgb::new(200, 100, 0);
        assert_eq!(c.scaled(0), [0, 0, 0]);
        assert_eq!(c.scaled(255), [200, 100, 0]);
        assert_eq!(c.scaled(128), [100, 50, 0]);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!("#d55e00".parse::<Rgb>(), Ok(Rgb::new(213, 94, 0)));
        assert_eq!("00ff00".parse::<Rgb>(), Ok(Rgb::GREEN));
        assert_eq!(Rgb::new(1, 2, 3).to_string().parse::<Rgb>(), Ok(Rgb::new(1, 2, 3)));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_default_channel_colors() {
        assert_eq!(default_channel_color(0), Rgb::new(0, 114, 178));
        assert_eq!(default_channel_color(3), Rgb::RED);
        assert_eq!(default_channel_color(42), Rgb::WHITE);
    }
}
