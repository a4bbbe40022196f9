//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::camera::FacingMode;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Camera acquisition settings
    pub camera: CameraSettings,
    /// Live preview settings
    pub preview: PreviewSettings,
    /// Capture preprocessing settings
    pub preprocessing: PreprocessSettings,
    /// Text recognition settings
    pub recognition: RecognitionSettings,
}

/// Camera acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Preferred camera facing
    pub facing: FacingMode,
    /// Ideal capture width in pixels
    pub ideal_width: u32,
    /// Ideal capture height in pixels
    pub ideal_height: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Live preview settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSettings {
    /// Overscan zoom factor; values below 1.0 are treated as 1.0
    pub overscan: f32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self { overscan: 1.0 }
    }
}

/// Capture preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSettings {
    /// Gaussian denoise sigma
    pub blur_sigma: f32,
    /// Adaptive threshold block radius (window spans 2 * radius + 1 pixels)
    pub threshold_block_radius: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            threshold_block_radius: 5,
        }
    }
}

/// Text recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSettings {
    /// Recognition model language tag
    pub language: String,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: "jpn".to_string(),
        }
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("jp", "kyosan-map", "signcam")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.camera.facing, FacingMode::Environment);
        assert_eq!(config.camera.ideal_width, 1280);
        assert_eq!(config.camera.ideal_height, 720);

        assert!((config.preview.overscan - 1.0).abs() < 0.01);

        assert!((config.preprocessing.blur_sigma - 1.5).abs() < 0.01);
        assert_eq!(config.preprocessing.threshold_block_radius, 5);

        assert_eq!(config.recognition.language, "jpn");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.camera.facing, config.camera.facing);
        assert_eq!(parsed.camera.ideal_width, config.camera.ideal_width);
        assert_eq!(parsed.recognition.language, config.recognition.language);
        assert_eq!(
            parsed.preprocessing.threshold_block_radius,
            config.preprocessing.threshold_block_radius
        );
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.camera.facing = FacingMode::User;
        config.preview.overscan = 1.8;
        config.recognition.language = "eng".to_string();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.camera.facing, FacingMode::User);
        assert!((parsed.preview.overscan - 1.8).abs() < 0.01);
        assert_eq!(parsed.recognition.language, "eng");
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.camera.ideal_width, config.camera.ideal_width);
        assert_eq!(loaded.recognition.language, config.recognition.language);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
