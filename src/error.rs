use std::fmt::Display;

use crate::common::{MAX_IMAGES, MAX_UNIQUE_TILES, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Conditions raised while turning images into a ROM.
///
/// `Dimension`, `Palette`, `TooManyImages` and `BaseRomTooSmall` abort the
/// whole run. `TileOverflow` and `PaletteUnderflow` are only ever logged; the
/// affected image is still converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    Dimension { width: u32, height: u32 },
    Palette { distinct_colors: usize },
    TileOverflow { unique_tiles: usize },
    PaletteUnderflow { distinct_colors: usize },
    TooManyImages { count: usize },
    BaseRomTooSmall { len: usize, required: usize },
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::Dimension { width, height } => write!(
                f,
                "Image must be exactly {}x{} (got {}x{})",
                SCREEN_WIDTH, SCREEN_HEIGHT, width, height
            ),
            ConvertError::Palette { distinct_colors } => write!(
                f,
                "Image must contain no more than 4 unique colors (found at least {})",
                distinct_colors
            ),
            ConvertError::TileOverflow { unique_tiles } => write!(
                f,
                "Could not optimize image to below {} tiles ({} unique)",
                MAX_UNIQUE_TILES, unique_tiles
            ),
            ConvertError::PaletteUnderflow { distinct_colors } => write!(
                f,
                "Image has only {} unique colors (instead of exactly 4)",
                distinct_colors
            ),
            ConvertError::TooManyImages { count } => write!(
                f,
                "Please keep it under {} images (got {})",
                MAX_IMAGES, count
            ),
            ConvertError::BaseRomTooSmall { len, required } => write!(
                f,
                "Base ROM is {} bytes, at least {} are required",
                len, required
            ),
        }
    }
}

impl std::error::Error for ConvertError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_messages() {
        assert_eq!(
            ConvertError::TileOverflow { unique_tiles: 300 }.to_string(),
            "Could not optimize image to below 256 tiles (300 unique)"
        );
        assert_eq!(
            ConvertError::PaletteUnderflow { distinct_colors: 2 }.to_string(),
            "Image has only 2 unique colors (instead of exactly 4)"
        );
    }

    #[test]
    fn dimension_message_names_both_sizes() {
        let msg = ConvertError::Dimension {
            width: 320,
            height: 200,
        }
        .to_string();
        assert_eq!(msg, "Image must be exactly 160x144 (got 320x200)");
    }
}
