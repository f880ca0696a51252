//! Configuration management for vidcap
//!
//! Loads and saves the capture defaults used by the command-line tool:
//! which device to open, the preferred format and the log filter.

use crate::errors::CaptureError;
use crate::types::{FormatSpec, FrameEncoding};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VidcapConfig {
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Index into the enumeration snapshot
    pub device_index: usize,
    pub width: u32,
    pub height: u32,
    pub encoding: FrameEncoding,
    pub frame_rate: u32,
    /// Frames written by `capture`
    pub frames: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `RUST_LOG`-style filter, used when the variable is unset
    pub filter: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let format = FormatSpec::default();
        Self {
            device_index: 0,
            width: format.width(),
            height: format.height(),
            encoding: format.encoding,
            frame_rate: format.frame_rate,
            frames: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "vidcap=info".to_string(),
        }
    }
}

impl VidcapConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("Failed to read config file: {}", e)))?;

        let config: VidcapConfig = toml::from_str(&contents)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CaptureError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("vidcap.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        let capture = &self.capture;
        if capture.width == 0 || capture.height == 0 {
            return Err(CaptureError::Config("Invalid resolution".to_string()));
        }
        if capture.frame_rate == 0 || capture.frame_rate > 240 {
            return Err(CaptureError::Config(
                "Invalid frame rate (must be 1-240)".to_string(),
            ));
        }
        if capture.frames == 0 {
            return Err(CaptureError::Config(
                "Frame count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn preferred_format(&self) -> FormatSpec {
        FormatSpec::new(
            self.capture.width,
            self.capture.height,
            self.capture.encoding,
            self.capture.frame_rate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_default_config() {
        let config = VidcapConfig::default();
        assert_eq!(config.preferred_format(), FormatSpec::default());
        assert_eq!(config.capture.device_index, 0);
        assert_eq!(config.logging.filter, "vidcap=info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = VidcapConfig::default();
        bad.capture.width = 0;
        assert_eq!(bad.validate().unwrap_err().kind(), ErrorKind::Config);

        let mut bad_fps = VidcapConfig::default();
        bad_fps.capture.frame_rate = 500;
        assert!(bad_fps.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vidcap.toml");

        let mut config = VidcapConfig::default();
        config.capture.encoding = FrameEncoding::Yuy2;
        config.capture.frame_rate = 60;
        config.save_to_file(&path).unwrap();

        let loaded = VidcapConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidcap.toml");
        fs::write(&path, "[capture]\nwidth = 1280\nheight = 720\n").unwrap();

        let loaded = VidcapConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.capture.width, 1280);
        assert_eq!(loaded.capture.encoding, FrameEncoding::Mjpeg);
        assert_eq!(loaded.logging, LoggingConfig::default());
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&VidcapConfig::default()).unwrap();
        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("encoding = \"MJPEG\""));
    }

    #[test]
    fn test_unparseable_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidcap.toml");
        fs::write(&path, "[capture\nwidth = ").unwrap();
        let err = VidcapConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = VidcapConfig::load_from_file("nonexistent_vidcap.toml");
        assert_eq!(result.unwrap(), VidcapConfig::default());
    }
}
