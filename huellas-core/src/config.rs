use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub logbook: LogbookConfig,
    #[serde(default)]
    pub share: ShareConfig,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<CoreConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.quota.validate()
            .with_context(|| format!("invalid [quota] in {}", path.display()))?;
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.storage.kv_path = absolutize(root, &self.storage.kv_path);
        self.storage.remote_path = absolutize(root, &self.storage.remote_path);
        self.logbook.path = absolutize(root, &self.logbook.path);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "SystemConfig::default_name")]
    pub name: String,
    #[serde(default = "SystemConfig::default_version")]
    pub version: String,
}

impl SystemConfig {
    fn default_name() -> String {
        "huellas".to_string()
    }

    fn default_version() -> String {
        "0.1.0".to_string()
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            version: Self::default_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Local key-value store (quota counters).
    #[serde(default = "StorageConfig::default_kv_path")]
    pub kv_path: PathBuf,
    /// Local emulator of the remote document store.
    #[serde(default = "StorageConfig::default_remote_path")]
    pub remote_path: PathBuf,
}

impl StorageConfig {
    fn default_kv_path() -> PathBuf {
        PathBuf::from("cache/kv.db")
    }

    fn default_remote_path() -> PathBuf {
        PathBuf::from("cache/remote.db")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kv_path: Self::default_kv_path(),
            remote_path: Self::default_remote_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "QuotaConfig::default_candles_per_day")]
    pub candles_per_day: u32,
    #[serde(default = "QuotaConfig::default_ai_messages_per_month")]
    pub ai_messages_per_month: u32,
    #[serde(default = "QuotaConfig::default_free_photos_per_memorial")]
    pub free_photos_per_memorial: u32,
}

impl QuotaConfig {
    /// Every cap must be a positive integer.
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("candles_per_day", self.candles_per_day),
            ("ai_messages_per_month", self.ai_messages_per_month),
            ("free_photos_per_memorial", self.free_photos_per_memorial),
        ] {
            anyhow::ensure!(value > 0, "`{name}` must be at least 1, got {value}");
        }
        Ok(())
    }

    fn default_candles_per_day() -> u32 {
        2
    }

    fn default_ai_messages_per_month() -> u32 {
        3
    }

    fn default_free_photos_per_memorial() -> u32 {
        3
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            candles_per_day: Self::default_candles_per_day(),
            ai_messages_per_month: Self::default_ai_messages_per_month(),
            free_photos_per_memorial: Self::default_free_photos_per_memorial(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogbookConfig {
    #[serde(default = "LogbookConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "LogbookConfig::default_path")]
    pub path: PathBuf,
}

impl LogbookConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_path() -> PathBuf {
        PathBuf::from("logbook.jsonl")
    }
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            path: Self::default_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    /// Prefix of share links; the token is appended as the last path segment.
    #[serde(default = "ShareConfig::default_link_base")]
    pub link_base: String,
}

impl ShareConfig {
    fn default_link_base() -> String {
        "https://huellas.app/m/".to_string()
    }

    pub fn link_for(&self, token: &str) -> String {
        format!("{}/{}", self.link_base.trim_end_matches('/'), token)
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            link_base: Self::default_link_base(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CoreConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.quota.candles_per_day, 2);
        assert_eq!(cfg.quota.ai_messages_per_month, 3);
        assert_eq!(cfg.storage.kv_path, dir.path().join("cache/kv.db"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[quota]\ncandles_per_day = 5\n\n[storage]\nremote_path = \"/tmp/remote.db\"\n",
        )
        .unwrap();
        let cfg = CoreConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.quota.candles_per_day, 5);
        assert_eq!(cfg.quota.ai_messages_per_month, 3);
        assert_eq!(cfg.storage.remote_path, PathBuf::from("/tmp/remote.db"));
        assert_eq!(cfg.storage.kv_path, dir.path().join("cache/kv.db"));
    }

    #[test]
    fn zero_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), "[quota]\ncandles_per_day = 0\n").unwrap();
        let err = CoreConfig::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("candles_per_day"));
    }

    #[test]
    fn share_link_appends_token() {
        let share = ShareConfig::default();
        assert_eq!(share.link_for("AB12CD34"), "https://huellas.app/m/AB12CD34");
    }
}
