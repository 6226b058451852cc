//! Player configuration for tagmix
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/tagmix/config.yaml

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::vision::Projection;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Projector output settings
    pub display: DisplayConfig,
    /// Camera-to-display calibration (nudgeable live from the keyboard)
    pub projection: Projection,
    /// Marker detection settings
    pub detector: DetectorConfig,
    /// Tick and decay settings
    pub mixer: MixerConfig,
    /// Playback settings
    pub audio: AudioConfig,
    /// Path to the track library root
    /// Default: ~/Music/tagmix-library
    pub library_root: PathBuf,
    /// Overlay texture file name looked up in the library's textures folder,
    /// or `null` to draw no overlay
    pub overlay_texture: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let library_root = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Music")
            .join("tagmix-library");

        Self {
            display: DisplayConfig::default(),
            projection: Projection::default(),
            detector: DetectorConfig::default(),
            mixer: MixerConfig::default(),
            audio: AudioConfig::default(),
            library_root,
            overlay_texture: Some("logo.png".to_string()),
        }
    }
}

impl PlayerConfig {
    /// Replace values that would break the session with their defaults
    ///
    /// A zero display dimension would put a division by zero into the
    /// position-to-volume mapping, and a decay step that is not a positive
    /// number would keep hidden channels from fading out.
    fn sanitize(&mut self) {
        if self.display.width == 0 || self.display.height == 0 {
            let fallback = DisplayConfig::default();
            log::warn!(
                "sanitize: Display {}x{} is unusable, using {}x{}",
                self.display.width,
                self.display.height,
                fallback.width,
                fallback.height
            );
            self.display = fallback;
        }
        if self.mixer.decay_step.is_nan() || self.mixer.decay_step <= 0.0 {
            let fallback = MixerConfig::default().decay_step;
            log::warn!(
                "sanitize: Decay step {} is unusable, using {}",
                self.mixer.decay_step,
                fallback
            );
            self.mixer.decay_step = fallback;
        }
    }
}

/// Projector output section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels; marker height maps onto this range
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280, // 720p projector output
            height: 720,
        }
    }
}

/// Marker detection section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Binarization threshold applied to camera frames before detection
    pub threshold: u8,
    /// Physical marker edge length in meters, for detectors that want it
    pub marker_size_m: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 128,     // Mid-gray split works under projector light
            marker_size_m: 0.08, // Printed sheets are 8cm
        }
    }
}

/// Tick and decay section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Tick period in milliseconds
    pub tick_ms: u64,
    /// Volume units removed per tick while a channel's marker is hidden
    pub decay_step: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,     // 100 ticks per second
            decay_step: 5.0, // Hidden marker fades out in ~200ms from full
        }
    }
}

impl MixerConfig {
    /// Tick period as a `Duration`, floored at 1ms so the loop never spins
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Playback section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Restart stems from the top when they run out
    /// Sessions run unattended, so ending a track should not end the show
    pub loop_stems: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { loop_stems: true }
    }
}

/// Get the default config file path
///
/// Returns: ~/.config/tagmix/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("tagmix")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
/// Loaded values that would break the session fall back to their defaults.
pub fn load_config(path: &Path) -> PlayerConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return PlayerConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<PlayerConfig>(&contents) {
            Ok(mut config) => {
                config.sanitize();
                log::info!(
                    "load_config: Loaded config - library: {:?}, display: {}x{}, tick: {}ms",
                    config.library_root,
                    config.display.width,
                    config.display.height,
                    config.mixer.tick_ms
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                PlayerConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_config: Failed to read config file: {}, using defaults",
                e
            );
            PlayerConfig::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &PlayerConfig, path: &Path) -> Result<()> {
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Config saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.display.width, 1280);
        assert_eq!(config.display.height, 720);
        assert_eq!(config.detector.threshold, 128);
        assert_eq!(config.projection.scale, 2.14);
        assert_eq!(config.mixer.tick_ms, 10);
        assert_eq!(config.mixer.decay_step, 5.0);
        assert!(config.audio.loop_stems);
        assert_eq!(config.overlay_texture.as_deref(), Some("logo.png"));
    }

    #[test]
    fn test_tick_interval_never_zero() {
        let mixer = MixerConfig {
            tick_ms: 0,
            decay_step: 5.0,
        };
        assert_eq!(mixer.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = PlayerConfig {
            display: DisplayConfig {
                width: 1920,
                height: 1080,
            },
            projection: Projection {
                scale: 1.5,
                offset_x: 12.0,
                offset_y: -3.0,
            },
            detector: DetectorConfig {
                threshold: 96,
                marker_size_m: 0.1,
            },
            mixer: MixerConfig {
                tick_ms: 20,
                decay_step: 2.5,
            },
            audio: AudioConfig { loop_stems: false },
            library_root: PathBuf::from("/tmp/test-library"),
            overlay_texture: None,
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: PlayerConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.display.height, 1080);
        assert_eq!(parsed.projection.scale, 1.5);
        assert_eq!(parsed.detector.threshold, 96);
        assert_eq!(parsed.mixer.tick_ms, 20);
        assert!(!parsed.audio.loop_stems);
        assert_eq!(parsed.library_root, PathBuf::from("/tmp/test-library"));
        assert_eq!(parsed.overlay_texture, None);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let parsed: PlayerConfig =
            serde_yaml::from_str("mixer:\n  decay_step: 7.5\n").unwrap();
        assert_eq!(parsed.mixer.decay_step, 7.5);
        assert_eq!(parsed.mixer.tick_ms, 10);
        assert_eq!(parsed.display.width, 1280);
    }

    #[test]
    fn test_load_config_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.yaml"));
        assert_eq!(config.display.width, 1280);
        assert_eq!(config.mixer.decay_step, 5.0);
    }

    #[test]
    fn test_load_config_unparsable_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "display: [not a mapping").unwrap();
        let config = load_config(&path);
        assert_eq!(config.display.height, 720);
        assert!(config.audio.loop_stems);
    }

    #[test]
    fn test_load_config_replaces_degenerate_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "display:\n  width: 0\n  height: 0\nmixer:\n  decay_step: -2.0\n",
        )
        .unwrap();
        let config = load_config(&path);
        assert_eq!(config.display.width, 1280);
        assert_eq!(config.display.height, 720);
        assert_eq!(config.mixer.decay_step, 5.0);
    }

    #[test]
    fn test_load_config_replaces_nan_decay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "mixer:\n  decay_step: .nan\n").unwrap();
        let config = load_config(&path);
        assert_eq!(config.mixer.decay_step, 5.0);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = PlayerConfig::default();
        config.display.height = 1080;
        config.overlay_texture = None;
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path);
        assert_eq!(loaded.display.height, 1080);
        assert_eq!(loaded.overlay_texture, None);
    }
}
