use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::persist::load_json;

pub const DEFAULT_BASE_ROM: &str = "imagerom.gbbase";

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct GlobalConfig {
    pub base_rom: Option<PathBuf>,
}

fn get_global_config_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("", "", "gb_image_rom")
        .context("Unable to open global config directory.")?;
    let config_dir = project_dirs.config_dir();
    let config_path = config_dir.join("config.json");
    Ok(config_path)
}

fn load_config_at(path: &Path) -> Result<GlobalConfig> {
    if !path.exists() {
        return Ok(GlobalConfig::default());
    }
    load_json(path)
}

pub fn load_global_config() -> Result<GlobalConfig> {
    load_config_at(&get_global_config_path()?)
}

impl GlobalConfig {
    // The command line wins over the config file.
    pub fn resolve_base_rom(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.base_rom.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_ROM))
    }
}
