use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Application configuration, loaded from `agroassist.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub log_dir: String,
    pub data_dir: String,
    pub export_dir: String,
    pub refresh_interval_secs: u64,
    pub reload_delay_ms: u64,
    pub notification_ttl_secs: u64,
    pub chart_width: usize,
    pub request_timeout_secs: Option<u64>,
    pub recommendations_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            log_dir: "logs".to_string(),
            data_dir: "data".to_string(),
            export_dir: "exports".to_string(),
            refresh_interval_secs: 30 * 60,
            reload_delay_ms: 2000,
            notification_ttl_secs: 5,
            chart_width: 40,
            request_timeout_secs: None,
            recommendations_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration with the chain: `./agroassist.toml` -> `~/agroassist.toml` -> defaults.
    pub fn load() -> Self {
        let candidates = Self::config_paths();
        for path in &candidates {
            if let Ok(contents) = fs::read_to_string(path) {
                match toml::from_str::<AppConfig>(&contents) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: failed to parse {}: {}", path.display(), e);
                    }
                }
            }
        }
        Self::default()
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("agroassist.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("agroassist.toml"));
        }
        paths
    }

    /// File holding the persisted chat history (the widget's storage key).
    pub fn history_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("chat_history.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.base_url, "http://localhost:5000");
        assert_eq!(cfg.log_dir, "logs");
        assert_eq!(cfg.data_dir, "data");
        assert_eq!(cfg.export_dir, "exports");
        assert_eq!(cfg.refresh_interval_secs, 1800);
        assert_eq!(cfg.reload_delay_ms, 2000);
        assert_eq!(cfg.notification_ttl_secs, 5);
        assert_eq!(cfg.chart_width, 40);
        assert!(cfg.request_timeout_secs.is_none());
        assert!(cfg.recommendations_file.is_none());
    }

    #[test]
    fn test_partial_toml_deserialize() {
        let toml_str = r#"
            base_url = "http://farm.example:8080"
            chart_width = 60
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.base_url, "http://farm.example:8080");
        assert_eq!(cfg.chart_width, 60);
        // Other fields should be defaults
        assert_eq!(cfg.refresh_interval_secs, 1800);
        assert_eq!(cfg.notification_ttl_secs, 5);
    }

    #[test]
    fn test_full_toml_deserialize() {
        let toml_str = r#"
            base_url = "https://agro.example.com"
            log_dir = "my_logs"
            data_dir = "my_data"
            export_dir = "my_exports"
            refresh_interval_secs = 60
            reload_delay_ms = 500
            notification_ttl_secs = 10
            chart_width = 80
            request_timeout_secs = 15
            recommendations_file = "recs.json"
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.base_url, "https://agro.example.com");
        assert_eq!(cfg.log_dir, "my_logs");
        assert_eq!(cfg.data_dir, "my_data");
        assert_eq!(cfg.export_dir, "my_exports");
        assert_eq!(cfg.refresh_interval_secs, 60);
        assert_eq!(cfg.reload_delay_ms, 500);
        assert_eq!(cfg.notification_ttl_secs, 10);
        assert_eq!(cfg.chart_width, 80);
        assert_eq!(cfg.request_timeout_secs, Some(15));
        assert_eq!(cfg.recommendations_file.as_deref(), Some("recs.json"));
    }

    #[test]
    fn test_history_path_under_data_dir() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.history_path(), PathBuf::from("data").join("chat_history.json"));
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        // When no config file exists, load() returns defaults
        let cfg = AppConfig::load();
        assert_eq!(cfg.chart_width, AppConfig::default().chart_width);
    }
}
