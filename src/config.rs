// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{CameraBackendType, SessionPreset};
use crate::constants::{APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_JPEG_QUALITY};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// User configuration, read from `config.json` in the app's config directory
///
/// Missing keys take their defaults. The file is never written by the app.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (V4L2 or synthetic)
    pub backend: CameraBackendType,
    /// Capture quality preset
    pub session_preset: SessionPreset,
    /// Where photos are saved (defaults to the pictures directory)
    pub photo_directory: Option<PathBuf>,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Mirror camera preview horizontally (selfie mode)
    pub mirror_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            session_preset: SessionPreset::default(),
            photo_directory: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            mirror_preview: true, // Default to mirrored (selfie mode)
        }
    }
}

impl Config {
    /// Location of the config file, if the platform has a config directory
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the user's config, falling back to defaults on any problem
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            debug!("No config directory, using defaults");
            return Self::default();
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// JPEG quality clamped to the encoder's range
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality.clamp(1, 100)
    }

    /// Directory photos are saved to
    pub fn photo_directory(&self) -> PathBuf {
        self.photo_directory.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
        })
    }
}
