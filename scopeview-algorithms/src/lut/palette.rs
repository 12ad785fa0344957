//! Built-in palettes defined by RGB control points.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Palettes that replace the single-color ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Palette {
    /// Black through blue and red to yellow and white.
    Fire,
    /// Black through red to yellow and white.
    RedHot,
    /// Full hue sweep from red back to red.
    Spectrum,
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Palette::Fire => write!(f, "Fire"),
            Palette::RedHot => write!(f, "Red Hot"),
            Palette::Spectrum => write!(f, "Spectrum"),
        }
    }
}

impl Palette {
    /// Control points spread evenly across the table.
    #[must_use]
    pub fn control_points(self) -> &'static [[u8; 3]] {
        match self {
            Palette::Fire => &FIRE,
            Palette::RedHot => &RED_HOT,
            Palette::Spectrum => &SPECTRUM,
        }
    }
}

const FIRE: [[u8; 3]; 32] = [
    [0, 0, 0],
    [0, 0, 61],
    [1, 0, 96],
    [25, 0, 130],
    [49, 0, 165],
    [73, 0, 192],
    [98, 0, 220],
    [122, 0, 227],
    [146, 0, 210],
    [162, 0, 181],
    [173, 0, 151],
    [184, 0, 122],
    [195, 0, 93],
    [207, 14, 64],
    [217, 35, 35],
    [229, 57, 5],
    [240, 79, 0],
    [252, 101, 0],
    [255, 117, 0],
    [255, 133, 0],
    [255, 147, 0],
    [255, 161, 0],
    [255, 175, 0],
    [255, 190, 0],
    [255, 205, 0],
    [255, 219, 0],
    [255, 234, 0],
    [255, 248, 35],
    [255, 255, 98],
    [255, 255, 160],
    [255, 255, 223],
    [255, 255, 255],
];

const RED_HOT: [[u8; 3]; 6] = [
    [0, 0, 0],
    [128, 0, 0],
    [255, 0, 0],
    [255, 128, 0],
    [255, 255, 0],
    [255, 255, 255],
];

const SPECTRUM: [[u8; 3]; 7] = [
    [255, 0, 0],
    [255, 255, 0],
    [0, 255, 0],
    [0, 255, 255],
    [0, 0, 255],
    [255, 0, 255],
    [255, 0, 0],
];
