// Capture configuration with validation and JSON loading

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Target frame rate for paced sources (fps)
    pub frame_rate: u32,
    /// JPEG quality factor on a 0.0–1.0 scale
    pub jpeg_quality: f32,
    /// Directory that receives the snapshot files
    pub output_dir: PathBuf,
    /// Bound of the frame delivery channel
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            jpeg_quality: 0.5,
            output_dir: default_output_dir(),
            queue_depth: 32,
        }
    }
}

/// Default snapshot location: the user's document directory, falling back to
/// the system temp directory when no document directory is known
fn default_output_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("screensnap")
        .join("snapshots")
}

impl CaptureConfig {
    /// Create a new configuration builder
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder::new()
    }

    /// Validate this configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err("Frame rate must be between 1 and 120 fps".to_string());
        }

        if !(0.0..=1.0).contains(&self.jpeg_quality) {
            return Err("JPEG quality must be between 0.0 and 1.0".to_string());
        }

        if self.queue_depth == 0 {
            return Err("Queue depth must be greater than 0".to_string());
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }

        Ok(())
    }

    /// JPEG quality as the 1–100 factor the encoder expects
    pub fn jpeg_quality_factor(&self) -> u8 {
        ((self.jpeg_quality * 100.0).round() as u8).clamp(1, 100)
    }

    /// Load and validate a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for CaptureConfig
#[derive(Debug, Clone)]
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl CaptureConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CaptureConfig::default(),
        }
    }

    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.config.frame_rate = fps;
        self
    }

    pub fn jpeg_quality(mut self, quality: f32) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.config.queue_depth = depth;
        self
    }

    /// Build with validation
    pub fn build(self) -> Result<CaptureConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for CaptureConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.jpeg_quality_factor(), 50);
    }

    #[test]
    fn rejects_zero_frame_rate() {
        let config = CaptureConfig {
            frame_rate: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let config = CaptureConfig {
            jpeg_quality: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_applies_settings() {
        let config = CaptureConfig::builder()
            .frame_rate(60)
            .jpeg_quality(0.8)
            .output_dir("/tmp/snaps")
            .queue_depth(8)
            .build()
            .unwrap();
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.jpeg_quality_factor(), 80);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/snaps"));
        assert_eq!(config.queue_depth, 8);
    }

    #[test]
    fn builder_rejects_invalid_settings() {
        assert!(CaptureConfig::builder().queue_depth(0).build().is_err());
    }
}
