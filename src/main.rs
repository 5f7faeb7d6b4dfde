use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

mod assemble;
mod common;
mod config;
mod convert;
mod error;
mod persist;
mod quantize;
mod rom;
mod tile;

use common::MAX_IMAGES;
use config::{load_global_config, GlobalConfig};
use convert::{convert, SourceImage};
use error::ConvertError;
use persist::{expand_image_args, load_base_rom, load_png, save_json, save_rom};

/// Packs 160x144 four-color images into a Game Boy ROM.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// ROM file to write
    output: PathBuf,

    /// Images to include, in order (wildcards allowed)
    #[arg(required = true)]
    images: Vec<String>,

    /// Template ROM supplying the first 16KB
    #[arg(long)]
    base_rom: Option<PathBuf>,

    /// Write a JSON summary of the image table
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

pub fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = load_global_config().unwrap_or_else(|e| {
        warn!("Ignoring global config: {:#}", e);
        GlobalConfig::default()
    });

    let paths = expand_image_args(&args.images)?;
    if paths.len() > MAX_IMAGES {
        bail!(ConvertError::TooManyImages { count: paths.len() });
    }

    let base_rom = load_base_rom(&config.resolve_base_rom(args.base_rom))?;
    let sources = paths
        .iter()
        .map(|path| {
            let image = load_png(path)
                .with_context(|| format!("Unable to load image {}", path.display()))?;
            Ok(SourceImage {
                name: path.display().to_string(),
                image,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let conversion = convert(&base_rom, &sources)?;
    save_rom(&args.output, &conversion.rom)?;
    if let Some(report_path) = &args.report {
        save_json(report_path, &conversion.report)?;
    }
    info!("Wrote {} images.", sources.len());
    Ok(())
}
