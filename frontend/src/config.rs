//! `marquee.toml`: persistent front-end settings.
//!
//! Every key is optional. Command-line flags override the file, and the
//! merged result becomes the session [`Options`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use marquee_core::session::{Options, Orientation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILE: &str = "marquee.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("ui_rotation must be 0, 90, 180 or 270, not {0}")]
    Rotation(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directories or ZIP files searched for ROM sets, in order.
    pub rom_path: Vec<PathBuf>,
    /// Where NVRAM, input settings and writable disk images are kept.
    pub data_dir: Option<PathBuf>,
    pub language_file: Option<PathBuf>,
    pub color_depth: Option<u8>,
    pub sample_rate: u32,
    /// UI rotation in degrees.
    pub ui_rotation: u16,
    pub cheat: bool,
    pub skip_disclaimer: bool,
    pub skip_warnings: bool,
    pub pause_brightness: f32,
}

impl Default for Config {
    fn default() -> Self {
        let options = Options::default();
        Self {
            rom_path: vec![PathBuf::from("roms")],
            data_dir: None,
            language_file: None,
            color_depth: None,
            sample_rate: options.sample_rate,
            ui_rotation: 0,
            cheat: false,
            skip_disclaimer: false,
            skip_warnings: false,
            pause_brightness: options.pause_brightness,
        }
    }
}

/// `<config dir>/marquee`, e.g. `~/.config/marquee` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("marquee"))
}

impl Config {
    /// Read `path`, or the per-user file when `path` is `None`. A missing
    /// per-user file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read(path),
            None => match config_dir().map(|dir| dir.join(CONFIG_FILE)) {
                Some(path) if path.is_file() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// NVRAM, `cfg/` and `diff/` live under here.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("marquee")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn to_options(&self) -> Result<Options, ConfigError> {
        let ui_orientation = match self.ui_rotation {
            0 => Orientation::Rot0,
            90 => Orientation::Rot90,
            180 => Orientation::Rot180,
            270 => Orientation::Rot270,
            other => return Err(ConfigError::Rotation(other)),
        };
        Ok(Options {
            language_file: self.language_file.clone(),
            color_depth: self.color_depth,
            sample_rate: self.sample_rate,
            ui_orientation,
            cheat: self.cheat,
            skip_disclaimer: self.skip_disclaimer,
            skip_warnings: self.skip_warnings,
            pause_brightness: self.pause_brightness.clamp(0.0, 1.0),
            ..Options::default()
        })
    }
}
