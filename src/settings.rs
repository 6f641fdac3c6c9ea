use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::viewer::{DEFAULT_CACHE_SIZE, DEFAULT_WORKERS, ReadingDirection, ScaleLimits};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const PROGRESS_FILENAME: &str = "progress.json";
const APP_NAME: &str = "pageturn";

/// User preferences shared by every document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub night_mode: bool,

    #[serde(default)]
    pub reading_direction: ReadingDirection,

    #[serde(default = "default_min_scale")]
    pub min_scale: f32,

    #[serde(default = "default_max_scale")]
    pub max_scale: f32,

    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_min_scale() -> f32 {
    ScaleLimits::DEFAULT_MIN
}

fn default_max_scale() -> f32 {
    ScaleLimits::DEFAULT_MAX
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            night_mode: false,
            reading_direction: ReadingDirection::default(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            cache_size: default_cache_size(),
            workers: default_workers(),
        }
    }
}

impl Settings {
    /// Zoom range, validated
    #[must_use]
    pub fn scale_limits(&self) -> ScaleLimits {
        ScaleLimits::new(self.min_scale, self.max_scale)
    }

    /// Load settings from `path`.
    ///
    /// A missing file is created with defaults; an unreadable or malformed
    /// one is logged and defaults are used.
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file not found, creating with defaults at {path:?}");
            let settings = Self::default();
            settings.save_to_path(path);
            return settings;
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
                Ok(mut settings) => {
                    debug!("Loaded settings from {path:?}");
                    if settings.version < CURRENT_VERSION {
                        migrate_settings(&mut settings);
                        settings.save_to_path(path);
                    }
                    settings
                }
                Err(e) => {
                    error!("Failed to parse settings file {path:?}: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read settings file {path:?}: {e}");
                Self::default()
            }
        }
    }

    /// Load from the per-user config location, or defaults if there is none
    pub fn load() -> Self {
        match preferred_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => {
                warn!("Could not determine config directory, using default settings");
                Self::default()
            }
        }
    }

    /// Write settings to `path`; failures are logged, never fatal
    pub fn save_to_path(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create config directory {parent:?}: {e}");
                    return;
                }
            }
        }

        match fs::write(path, generate_settings_yaml(self)) {
            Ok(()) => debug!("Saved settings to {path:?}"),
            Err(e) => error!("Failed to save settings to {path:?}: {e}"),
        }
    }
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Default location of the reading progress file
pub fn preferred_progress_path() -> Option<PathBuf> {
    dirs::data_dir().map(|data| data.join(APP_NAME).join(PROGRESS_FILENAME))
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    settings.version = CURRENT_VERSION;
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let direction = match settings.reading_direction {
        ReadingDirection::RightToLeft => "right_to_left",
        ReadingDirection::LeftToRight => "left_to_right",
    };

    let mut content = String::new();
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("night_mode: {}\n", settings.night_mode));
    content.push_str("# Tap zones: right_to_left turns forward on the left third\n");
    content.push_str(&format!("reading_direction: {direction}\n"));
    content.push_str(&format!("min_scale: {}\n", settings.min_scale));
    content.push_str(&format!("max_scale: {}\n", settings.max_scale));
    content.push_str("# Rasterized slots kept in memory\n");
    content.push_str(&format!("cache_size: {}\n", settings.cache_size));
    content.push_str(&format!("workers: {}\n", settings.workers));
    content
}
