use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "BOOKSHELF_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    pub position: Vec3,
    pub look_at: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(-3.5, 5.5, -1.0),
            look_at: Vec3::new(-6.0, 4.5, -1.0),
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Directory holding `models/`, `pages/` and the glTF files.
    pub asset_root: PathBuf,
    pub window_title: String,
    /// Hex colour, `#rrggbb`.
    pub background: String,
    pub camera: CameraConfig,
    pub language: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            window_title: "Bookshelf".to_string(),
            background: "#e7e7e7".to_string(),
            camera: CameraConfig::default(),
            language: "english".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Resolves the config from `BOOKSHELF_CONFIG`, then the first CLI argument,
    /// falling back to defaults when neither is set.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| std::env::args_os().nth(1).map(PathBuf::from));

        match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                log::info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Background colour as linear-ish RGB in `[0, 1]`. Malformed values fall back
    /// to the default grey.
    pub fn background_rgb(&self) -> [f64; 3] {
        parse_hex_color(&self.background).unwrap_or_else(|| {
            log::warn!("Invalid background colour {:?}", self.background);
            [231.0 / 255.0; 3]
        })
    }
}

fn parse_hex_color(value: &str) -> Option<[f64; 3]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(hex.get(range)?, 16)
            .ok()
            .map(|value| value as f64 / 255.0)
    };
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = AppConfig::from_json(r#"{ "language": "portuguese" }"#).unwrap();
        assert_eq!(config.language, "portuguese");
        assert_eq!(config.camera, CameraConfig::default());
        assert_eq!(config.asset_root, PathBuf::from("assets"));
    }

    #[test]
    fn parses_background_hex() {
        let config = AppConfig {
            background: "#ff0080".into(),
            ..Default::default()
        };
        let [r, g, b] = config.background_rgb();
        assert_eq!(r, 1.0);
        assert_eq!(g, 0.0);
        assert!((b - 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_background_falls_back() {
        let config = AppConfig {
            background: "grey".into(),
            ..Default::default()
        };
        assert_eq!(config.background_rgb(), [231.0 / 255.0; 3]);
    }
}
