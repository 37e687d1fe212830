//! Harness settings.
//!
//! A YAML-backed settings provider exposing dotted-key lookups with
//! defaults, e.g. `settings.get_str("mock.host", "localhost")`.

use crate::error::{Error, Result};
use std::path::Path;

/// Settings tree loaded from a YAML document.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    root: serde_yaml::Value,
}

impl Settings {
    /// Settings with no values; every lookup yields its default.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let root = serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { root })
    }

    /// Walk a dotted key through nested mappings.
    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        let mut current = &self.root;
        for segment in key.split('.') {
            let lookup = serde_yaml::Value::String(segment.to_string());
            current = current.as_mapping()?.get(&lookup)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
base_url: http://localhost:9000
timeout_seconds: 15
mock:
  host: 127.0.0.1
  port: 8888
  log_requests: true
"#;

    #[test]
    fn test_dotted_lookups() {
        let settings = Settings::from_yaml(SAMPLE).unwrap();
        assert_eq!(settings.get_str("mock.host", "localhost"), "127.0.0.1");
        assert_eq!(settings.get_u64("mock.port", 0), 8888);
        assert!(settings.get_bool("mock.log_requests", false));
        assert_eq!(settings.get_str("base_url", ""), "http://localhost:9000");
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let settings = Settings::from_yaml(SAMPLE).unwrap();
        assert_eq!(settings.get_str("mock.missing", "fallback"), "fallback");
        assert_eq!(settings.get_u64("retries", 3), 3);
        // Dotted path through a scalar resolves to nothing
        assert!(settings.get("base_url.nested").is_none());
    }

    #[test]
    fn test_empty_settings() {
        let settings = Settings::empty();
        assert_eq!(settings.get_u64("anything", 7), 7);
    }

    #[test]
    fn test_invalid_yaml_is_a_config_error() {
        assert!(matches!(
            Settings::from_yaml("a: [unclosed"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.get_u64("mock.port", 0), 8888);
    }
}
