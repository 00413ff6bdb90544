use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, PoisonError, RwLock};
use std::time::Duration;

use crate::anchor::{EngineConfig, MatchConfig, TextLayerConfig};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagemark";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// How long to wait for a switched-to page before matching anyway
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_notification_duration_ms")]
    pub notification_duration_ms: u64,

    #[serde(default = "default_context_token_limit")]
    pub context_token_limit: usize,

    #[serde(default = "default_context_min_token_len")]
    pub context_min_token_len: usize,

    #[serde(default = "default_context_min_shared_tokens")]
    pub context_min_shared_tokens: usize,

    /// Average glyph advance as a fraction of the font size, used when the
    /// renderer reports no run width
    #[serde(default = "default_avg_glyph_width")]
    pub avg_glyph_width: f64,

    #[serde(default = "default_ascent_ratio")]
    pub ascent_ratio: f64,

    #[serde(default = "default_text_layer_cache_size")]
    pub text_layer_cache_size: usize,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_notification_duration_ms() -> u64 {
    4000
}

fn default_context_token_limit() -> usize {
    5
}

fn default_context_min_token_len() -> usize {
    4
}

fn default_context_min_shared_tokens() -> usize {
    2
}

fn default_avg_glyph_width() -> f64 {
    0.5
}

fn default_ascent_ratio() -> f64 {
    1.0
}

fn default_text_layer_cache_size() -> usize {
    16
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            settle_delay_ms: default_settle_delay_ms(),
            notification_duration_ms: default_notification_duration_ms(),
            context_token_limit: default_context_token_limit(),
            context_min_token_len: default_context_min_token_len(),
            context_min_shared_tokens: default_context_min_shared_tokens(),
            avg_glyph_width: default_avg_glyph_width(),
            ascent_ratio: default_ascent_ratio(),
            text_layer_cache_size: default_text_layer_cache_size(),
        }
    }
}

impl From<&Settings> for MatchConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            context_token_limit: settings.context_token_limit,
            context_min_token_len: settings.context_min_token_len,
            context_min_shared_tokens: settings.context_min_shared_tokens.max(1),
        }
    }
}

impl From<&Settings> for TextLayerConfig {
    fn from(settings: &Settings) -> Self {
        let defaults = TextLayerConfig::default();
        let avg_glyph_width = settings.avg_glyph_width;
        let avg_glyph_width = if avg_glyph_width.is_finite() && avg_glyph_width > 0.0 {
            avg_glyph_width
        } else {
            warn!(
                "Invalid avg_glyph_width {}, using {}",
                settings.avg_glyph_width, defaults.avg_glyph_width
            );
            defaults.avg_glyph_width
        };
        let ascent_ratio = if settings.ascent_ratio.is_finite() && settings.ascent_ratio >= 0.0 {
            settings.ascent_ratio
        } else {
            warn!(
                "Invalid ascent_ratio {}, using {}",
                settings.ascent_ratio, defaults.ascent_ratio
            );
            defaults.ascent_ratio
        };
        Self {
            avg_glyph_width,
            ascent_ratio,
        }
    }
}

impl From<&Settings> for EngineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            settle_delay: Duration::from_millis(settings.settle_delay_ms),
            notification_duration: Duration::from_millis(settings.notification_duration_ms),
            matching: MatchConfig::from(settings),
            layer: TextLayerConfig::from(settings),
            cache_size: settings.text_layer_cache_size,
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the user config directory, creating the file with
/// defaults when it does not exist yet.
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };

    if path.exists() {
        if let Err(e) = load_settings_from_path(&path) {
            error!("{e:#}");
        }
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = get_settings();
        if let Err(e) = save_settings_to_file(&settings, &path) {
            error!("{e:#}");
        }
    }
}

/// Load settings from an explicit file and make them current.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {path:?}"))?;
    let mut settings = serde_yaml::from_str::<Settings>(&content)
        .with_context(|| format!("Failed to parse settings file {path:?}"))?;
    debug!("Loaded settings from {path:?}");

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
        save_settings_to_file(&settings, path)?;
    }

    set_settings(settings.clone());
    Ok(settings)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }
    }

    fs::write(path, generate_settings_yaml(settings))
        .with_context(|| format!("Failed to save settings to {path:?}"))?;
    debug!("Saved settings to {path:?}");
    Ok(())
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str("# Wait for a switched-to page before matching anyway\n");
    content.push_str(&format!("settle_delay_ms: {}\n", settings.settle_delay_ms));
    content.push_str(&format!(
        "notification_duration_ms: {}\n",
        settings.notification_duration_ms
    ));
    content.push('\n');
    content.push_str("# Paragraph-context matching\n");
    content.push_str(&format!(
        "context_token_limit: {}\n",
        settings.context_token_limit
    ));
    content.push_str(&format!(
        "context_min_token_len: {}\n",
        settings.context_min_token_len
    ));
    content.push_str(&format!(
        "context_min_shared_tokens: {}\n",
        settings.context_min_shared_tokens
    ));
    content.push('\n');
    content.push_str("# Text layer geometry\n");
    content.push_str(&format!("avg_glyph_width: {:?}\n", settings.avg_glyph_width));
    content.push_str(&format!("ascent_ratio: {:?}\n", settings.ascent_ratio));
    content.push_str(&format!(
        "text_layer_cache_size: {}\n",
        settings.text_layer_cache_size
    ));

    content
}

// Public API for accessing/modifying settings

pub fn get_settings() -> Settings {
    SETTINGS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn set_settings(settings: Settings) {
    *SETTINGS.write().unwrap_or_else(PoisonError::into_inner) = settings;
}

pub fn engine_config() -> EngineConfig {
    EngineConfig::from(&get_settings())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_yaml::from_str("settle_delay_ms: 250\n").unwrap();
        assert_eq!(settings.settle_delay_ms, 250);
        assert_eq!(settings.notification_duration_ms, 4000);
        assert_eq!(settings.context_min_token_len, 4);
        assert_eq!(settings.version, CURRENT_VERSION);
    }

    #[test]
    fn generated_yaml_parses_back() {
        let settings = Settings {
            ascent_ratio: 0.8,
            text_layer_cache_size: 4,
            ..Settings::default()
        };
        let parsed: Settings = serde_yaml::from_str(&generate_settings_yaml(&settings)).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn engine_config_follows_settings() {
        let settings = Settings {
            settle_delay_ms: 1500,
            context_min_shared_tokens: 3,
            avg_glyph_width: -1.0,
            ..Settings::default()
        };
        let config = EngineConfig::from(&settings);
        assert_eq!(config.settle_delay, Duration::from_millis(1500));
        assert_eq!(config.matching.context_min_shared_tokens, 3);
        assert_eq!(config.layer.avg_glyph_width, 0.5);
    }

    #[test]
    #[serial]
    fn load_from_path_replaces_global() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nsettle_delay_ms: 300\n").unwrap();

        let loaded = load_settings_from_path(&path).unwrap();
        assert_eq!(loaded.settle_delay_ms, 300);
        assert_eq!(engine_config().settle_delay, Duration::from_millis(300));

        set_settings(Settings::default());
    }

    #[test]
    #[serial]
    fn old_version_is_migrated_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\nnotification_duration_ms: 2000\n").unwrap();

        let loaded = load_settings_from_path(&path).unwrap();
        assert_eq!(loaded.version, CURRENT_VERSION);

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("version: 1"));
        assert!(rewritten.contains("notification_duration_ms: 2000"));

        set_settings(Settings::default());
    }

    #[test]
    #[serial]
    fn unreadable_file_keeps_previous_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "settle_delay_ms: [not a number]\n").unwrap();

        assert!(load_settings_from_path(&path).is_err());
        assert_eq!(get_settings(), Settings::default());
    }
}
