//! Drum kit configuration.
//!
//! Maps each drum kind to a pad rectangle and explicit image/sound asset
//! paths. Defaults reproduce the classic four-pad layout; an optional
//! `drumkit.json` in the working directory overrides it. Asset presence is
//! validated once at startup so missing files fail loudly before the loop
//! starts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kit::{DrumKind, PadRect};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "drumkit.json";

/// Errors raised while loading or validating the kit configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("missing {what} asset for {kind:?}: {path}")]
    MissingAsset {
        kind: DrumKind,
        what: &'static str,
        path: PathBuf,
    },
}

/// One pad: drum kind, hit rectangle, asset paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadConfig {
    pub kind: DrumKind,
    pub rect: PadRect,
    pub image: PathBuf,
    pub sound: PathBuf,
}

impl PadConfig {
    fn conventional(kind: DrumKind, rect: PadRect) -> Self {
        let stem = kind.asset_stem();
        Self {
            kind,
            rect,
            image: PathBuf::from(format!("assets/{stem}.png")),
            sound: PathBuf::from(format!("assets/{stem}_sound.mp3")),
        }
    }
}

/// Full kit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitConfig {
    pub pads: Vec<PadConfig>,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            pads: vec![
                PadConfig::conventional(DrumKind::SnareDrum, PadRect::new(100, 200, 100, 100)),
                PadConfig::conventional(DrumKind::BassDrum, PadRect::new(200, 300, 100, 100)),
                PadConfig::conventional(DrumKind::HiHat, PadRect::new(500, 200, 100, 100)),
                PadConfig::conventional(DrumKind::TomDrum, PadRect::new(400, 300, 100, 100)),
            ],
        }
    }
}

impl KitConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if it exists, otherwise fall back to the default layout.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            log::info!("Loading kit config from {}", path.display());
            Self::load(path)
        } else {
            log::info!("No config at {}, using default kit", path.display());
            Ok(Self::default())
        }
    }

    /// Check that every referenced asset file exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pad in &self.pads {
            if !pad.image.is_file() {
                return Err(ConfigError::MissingAsset {
                    kind: pad.kind,
                    what: "image",
                    path: pad.image.clone(),
                });
            }
            if !pad.sound.is_file() {
                return Err(ConfigError::MissingAsset {
                    kind: pad.kind,
                    what: "sound",
                    path: pad.sound.clone(),
                });
            }
        }
        Ok(())
    }
}
