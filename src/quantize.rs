use anyhow::{bail, Context, Result};
use log::{debug, warn};

use crate::{
    common::{ColorIdx, ColorRGB, SCREEN_HEIGHT, SCREEN_WIDTH},
    error::ConvertError,
};

/// A decoded raster image, row-major, one RGB triple per pixel.
#[derive(Clone, Debug)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<ColorRGB>,
}

impl RgbImage {
    pub fn new(width: u32, height: u32, pixels: Vec<ColorRGB>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    #[cfg(test)]
    pub fn filled(width: u32, height: u32, color: ColorRGB) -> Self {
        Self::new(width, height, vec![color; width as usize * height as usize])
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    // Darkest first.
    pub colors: [ColorRGB; 4],
    pub distinct_colors: usize,
}

fn brightness(c: &ColorRGB) -> u32 {
    c.0 as u32 + c.1 as u32 + c.2 as u32
}

impl Palette {
    /// Builds the 4-entry palette from up to 4 distinct colors given in
    /// encounter order.
    pub fn from_distinct(mut colors: Vec<ColorRGB>) -> Result<Self> {
        // Stable, so equally bright colors keep encounter order.
        colors.sort_by_key(brightness);
        let padded = match colors[..] {
            [c0] => [c0, c0, c0, c0],
            [c0, c1] => [c0, c1, c1, c1],
            [c0, c1, c2] => [c0, c1, c1, c2],
            [c0, c1, c2, c3] => [c0, c1, c2, c3],
            [] => bail!("Image contains no pixels"),
            _ => bail!(ConvertError::Palette {
                distinct_colors: colors.len()
            }),
        };
        Ok(Palette {
            colors: padded,
            distinct_colors: colors.len(),
        })
    }

    /// Color to palette index. A color occupying several padded slots
    /// resolves to the last of them.
    pub fn index_of(&self, color: ColorRGB) -> Option<ColorIdx> {
        self.colors
            .iter()
            .rposition(|&c| c == color)
            .map(|i| i as ColorIdx)
    }
}

#[derive(Clone, Debug)]
pub struct QuantizedImage {
    pub palette: Palette,
    pub pixels: Vec<ColorIdx>, // SCREEN_WIDTH * SCREEN_HEIGHT, row-major
}

impl QuantizedImage {
    pub fn get(&self, x: usize, y: usize) -> ColorIdx {
        self.pixels[y * SCREEN_WIDTH + x]
    }
}

/// Collects distinct colors in encounter order, stopping as soon as a fifth
/// one shows up.
fn scan_colors(image: &RgbImage) -> Vec<ColorRGB> {
    let mut colors: Vec<ColorRGB> = vec![];
    for &pxl in &image.pixels {
        if !colors.contains(&pxl) {
            colors.push(pxl);
            if colors.len() > 4 {
                break;
            }
        }
    }
    colors
}

pub fn quantize(image: &RgbImage) -> Result<QuantizedImage> {
    if image.width as usize != SCREEN_WIDTH || image.height as usize != SCREEN_HEIGHT {
        bail!(ConvertError::Dimension {
            width: image.width,
            height: image.height,
        });
    }

    let colors = scan_colors(image);
    if colors.len() > 4 {
        bail!(ConvertError::Palette {
            distinct_colors: colors.len()
        });
    } else if colors.len() < 4 {
        warn!(
            "{}",
            ConvertError::PaletteUnderflow {
                distinct_colors: colors.len()
            }
        );
        if colors.len() == 1 {
            warn!("This image only has a single, solid color.");
        }
    }

    let palette = Palette::from_distinct(colors)?;
    debug!("Palette: {:?}", palette.colors);

    let pixels = image
        .pixels
        .iter()
        .map(|&c| palette.index_of(c))
        .collect::<Option<Vec<ColorIdx>>>()
        .context("pixel color missing from palette")?;

    Ok(QuantizedImage { palette, pixels })
}
