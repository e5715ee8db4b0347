//! Configuration management for kbqa
//!
//! TOML-based configuration with defaults and validation.
//! Location: ~/.kbqa/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{KbqaError, Result};
use crate::retrieval::RetrievalConfig;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retrieval: RetrievalConfig,
    pub ollama: OllamaConfig,
    pub paths: PathsConfig,
    pub telemetry: TelemetryConfig,
}

/// Generation endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub temperature: f32,
    pub timeout_sec: u64,
}

/// File system locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub knowledge_dir: String,
    pub history_file: String,
}

/// Terminal output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub show_summary: bool,
    pub color_output: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: "deepseek-r1:1.5b".to_string(),
            temperature: 0.1,
            timeout_sec: 120,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            knowledge_dir: "knowledge".to_string(),
            history_file: "~/.kbqa/history.txt".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            show_summary: true,
            color_output: true,
        }
    }
}

impl Config {
    /// Load from `path` if given, else from the default location, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(config_path) => Self::load_from_file(config_path),
            None => Self::load_default(),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| KbqaError::Config(format!("Failed to read config {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| KbqaError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(config_path) if config_path.exists() => Self::load_from_file(&config_path),
            _ => Ok(Config::default()),
        }
    }

    /// `~/.kbqa/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".kbqa").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;

        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            return Err(KbqaError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.ollama.timeout_sec == 0 {
            return Err(KbqaError::Config(
                "timeout_sec must be greater than 0".to_string(),
            ));
        }

        if self.paths.knowledge_dir.trim().is_empty() {
            return Err(KbqaError::Config(
                "knowledge_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Write pretty TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| KbqaError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Expand a leading `~/`
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.knowledge_dir)
    }

    pub fn history_file(&self) -> PathBuf {
        Self::expand_path(&self.paths.history_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.ollama.model, "deepseek-r1:1.5b");
        assert_eq!(config.ollama.temperature, 0.1);
        assert_eq!(config.retrieval.recent_heading_capacity, 3);
        assert_eq!(config.retrieval.answer_list_marker, "answers.txt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_temperature() {
        let mut config = Config::default();
        config.ollama.temperature = 2.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_weight_ordering() {
        let mut config = Config::default();
        config.retrieval.weights.heading_base = 20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_thresholds() {
        let mut config = Config::default();
        config.retrieval.thresholds.passage_emit = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[retrieval]\nheading_body_lines = 4\n\n[retrieval.thresholds]\nqa_accept = 20.0\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.retrieval.heading_body_lines, 4);
        assert_eq!(config.retrieval.thresholds.qa_accept, 20.0);
        assert_eq!(config.retrieval.thresholds.line_accept, 9.0);
        assert_eq!(config.ollama, OllamaConfig::default());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ollama]\ntemperature = 9.0\n").unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(KbqaError::Config(_))));

        std::fs::write(&path, "not toml [").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(KbqaError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.ollama.model = "llama3".to_string();
        config.save(&path).unwrap();

        assert_eq!(Config::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_ollama_url() {
        assert_eq!(Config::default().ollama_url(), "http://127.0.0.1:11434");
    }

    #[test]
    fn test_expand_path() {
        assert!(!Config::expand_path("~/.kbqa").to_string_lossy().contains('~'));
        assert_eq!(Config::expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    }
}
