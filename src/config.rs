use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

use crate::prefs::AccessibilityPrefs;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub prefs: Option<AccessibilityPrefs>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// API key resolution order: environment, then config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.gemini_api_key.clone())
    }

    pub fn resolve_model(&self) -> String {
        self.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Preferences from the config file, clamped back into range in case
    /// the file was edited by hand.
    pub fn resolve_prefs(&self) -> AccessibilityPrefs {
        self.prefs.unwrap_or_default().sanitized()
    }

    /// Persist updated accessibility preferences, keeping the rest of
    /// the config as stored on disk.
    pub fn save_prefs(prefs: AccessibilityPrefs) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.prefs = Some(prefs);
        config.save()
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("easyread").join("config.json"))
    }

    /// Directory for the log file, alongside the config.
    pub fn log_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("easyread"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::FontFamily;

    #[test]
    fn test_missing_file_yields_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config::load_from(&path).unwrap();
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.resolve_model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            gemini_api_key: Some("key-123".to_string()),
            model: Some("gemini-1.5-pro".to_string()),
            prefs: Some(AccessibilityPrefs {
                font_size_px: 24,
                line_spacing: 2.0,
                font_family: FontFamily::Verdana,
            }),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.gemini_api_key.as_deref(), Some("key-123"));
        assert_eq!(loaded.resolve_model(), "gemini-1.5-pro");
        assert_eq!(loaded.resolve_prefs().font_size_px, 24);
    }

    #[test]
    fn test_out_of_range_prefs_are_sanitized_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"gemini_api_key": null, "model": null,
                "prefs": {"font_size_px": 90, "line_spacing": 0.2, "font_family": "Arial"}}"#,
        )
        .unwrap();

        let prefs = Config::load_from(&path).unwrap().resolve_prefs();
        assert_eq!(prefs.font_size_px, 32);
        assert_eq!(prefs.line_spacing, 1.0);
    }
}
