use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use json_pretty_compact::PrettyCompactFormatter;
use log::{debug, info};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Serializer;

use crate::{common::ColorRGB, quantize::RgbImage, rom::BASE_ROM_SIZE};

pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    info!("Saving {}", path.display());
    let formatter = PrettyCompactFormatter::new();
    let mut data_bytes = vec![];
    let mut ser = Serializer::with_formatter(&mut data_bytes, formatter);
    data.serialize(&mut ser)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, &data_bytes)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    info!("Loading {}", path.display());
    let data_bytes = std::fs::read(path)?;
    let data: T = serde_json::from_slice(&data_bytes)?;
    Ok(data)
}

/// Decodes a PNG of any color type into 8-bit RGB. Alpha is dropped.
pub fn decode_png(png_bytes: &[u8]) -> Result<RgbImage> {
    let mut decoder = png::Decoder::new(png_bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    ensure!(
        info.bit_depth == png::BitDepth::Eight,
        "Unexpected PNG bit depth after expansion: {:?}",
        info.bit_depth
    );

    let channels = match info.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        png::ColorType::Indexed => bail!("Indexed PNG was not expanded"),
    };
    debug!(
        "PNG {}x{} {:?}",
        info.width, info.height, info.color_type
    );

    let width = info.width as usize;
    let mut pixels: Vec<ColorRGB> = Vec::with_capacity(width * info.height as usize);
    for row in buf.chunks(info.line_size).take(info.height as usize) {
        for px in row[..width * channels].chunks_exact(channels) {
            pixels.push(match channels {
                1 | 2 => (px[0], px[0], px[0]),
                _ => (px[0], px[1], px[2]),
            });
        }
    }
    Ok(RgbImage::new(info.width, info.height, pixels))
}

pub fn load_png(path: &Path) -> Result<RgbImage> {
    let png_bytes = fs::read(path)?;
    decode_png(&png_bytes)
}

/// Reads the template ROM, keeping only the part that goes in front of the
/// image table.
pub fn load_base_rom(path: &Path) -> Result<Vec<u8>> {
    info!("Loading base ROM {}", path.display());
    let mut data = fs::read(path)
        .with_context(|| format!("Unable to read base ROM {}", path.display()))?;
    data.truncate(BASE_ROM_SIZE);
    Ok(data)
}

pub fn save_rom(path: &Path, rom: &[u8]) -> Result<()> {
    info!("Saving {} ({} bytes)", path.display(), rom.len());
    fs::write(path, rom)?;
    Ok(())
}

/// Expands image arguments that contain wildcards. Arguments without
/// wildcards are passed through as-is, so missing files surface when loaded.
pub fn expand_image_args(args: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = vec![];
    for arg in args {
        if !arg.contains(&['*', '?', '['][..]) {
            paths.push(PathBuf::from(arg));
            continue;
        }
        let start = paths.len();
        for entry in glob::glob(arg)? {
            paths.push(entry?);
        }
        if paths.len() == start {
            bail!("No images match {}", arg);
        }
    }
    Ok(paths)
}
