use anyhow::{bail, ensure, Context, Result};
use itertools::izip;
use log::{info, warn};
use serde::Serialize;

use crate::{
    assemble::{assemble, ConvertedImage},
    common::MAX_IMAGES,
    error::ConvertError,
    quantize::{quantize, Palette, RgbImage},
    rom::{build_rom, finalize_rom, read_image_table, verify_checksums, ImageEntry},
};

pub struct SourceImage {
    pub name: String,
    pub image: RgbImage,
}

#[derive(Serialize, Debug)]
pub struct ImageReport {
    pub name: String,
    pub bank: u8,
    pub address: u16,
    pub tile_count: u8,
    pub colors: usize,
    pub unique_tiles: usize,
    pub optimized: bool,
    pub payload_bytes: usize,
}

#[derive(Serialize, Debug)]
pub struct ConversionReport {
    pub rom_size: usize,
    pub size_code: u8,
    pub images: Vec<ImageReport>,
}

#[derive(Debug)]
pub struct Conversion {
    pub rom: Vec<u8>,
    pub report: ConversionReport,
}

fn convert_image(source: &SourceImage) -> Result<(Palette, ConvertedImage)> {
    info!("Processing {}", source.name);
    let quantized = quantize(&source.image)?;
    Ok((quantized.palette, assemble(&quantized)))
}

fn image_report(
    source: &SourceImage,
    palette: &Palette,
    image: &ConvertedImage,
    entry: ImageEntry,
) -> ImageReport {
    ImageReport {
        name: source.name.clone(),
        bank: entry.location.bank,
        address: entry.location.addr,
        tile_count: entry.tile_count,
        colors: palette.distinct_colors,
        unique_tiles: image.unique_tiles,
        optimized: image.is_optimized(),
        payload_bytes: image.payload_len(),
    }
}

/// Runs the whole pipeline in memory. Any fatal condition in any image aborts
/// the run before a ROM is produced.
pub fn convert(base_rom: &[u8], sources: &[SourceImage]) -> Result<Conversion> {
    if sources.len() > MAX_IMAGES {
        bail!(ConvertError::TooManyImages {
            count: sources.len()
        });
    }

    let (palettes, images): (Vec<Palette>, Vec<ConvertedImage>) = sources
        .iter()
        .map(|s| convert_image(s).with_context(|| format!("Failed to convert {}", s.name)))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .unzip();

    let (mut rom, entries) = build_rom(base_rom, &images)?;
    let size_code = finalize_rom(&mut rom)?;

    ensure!(
        read_image_table(&rom)? == entries,
        "Image table does not read back as written"
    );
    let status = verify_checksums(&rom)?;
    ensure!(status.header_ok, "Header checksum does not verify");
    if !status.global_ok {
        warn!("Base ROM has nonzero global checksum bytes; emulators may flag the result");
    }

    let reports = izip!(sources, &palettes, &images, entries)
        .map(|(source, palette, image, entry)| image_report(source, palette, image, entry))
        .collect();

    Ok(Conversion {
        report: ConversionReport {
            rom_size: rom.len(),
            size_code,
            images: reports,
        },
        rom,
    })
}
