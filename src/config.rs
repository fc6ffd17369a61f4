use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/ftm/config.toml`.
///
/// Pool capacities are derived from these values once, when the coordinator
/// starts; editing the file (or the loaded struct) afterwards does not resize
/// pools that already exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtmConfig {
    /// Base resource budget for each download pool, in bytes. Multiplied by
    /// [`PRIVILEGED_BUDGET_MULTIPLIER`] when `privileged_account` is set.
    pub download_budget_bytes: i64,
    /// Resource budget for the single upload pool, in bytes.
    pub upload_budget_bytes: i64,
    /// Privileged accounts get a larger download budget. Read once at
    /// coordinator start-up.
    pub privileged_account: bool,
    /// Whether a persistent resumable-download cache is configured. Without
    /// one, pools run unmetered. Read once at coordinator start-up.
    pub resumable_cache: bool,
    /// Endpoint that serves web-hosted files.
    pub web_endpoint: i32,
}

/// Budget multiplier applied to download pools for privileged accounts.
pub const PRIVILEGED_BUDGET_MULTIPLIER: i64 = 8;

impl Default for FtmConfig {
    fn default() -> Self {
        Self {
            download_budget_bytes: 1 << 20,
            upload_budget_bytes: 4 << 20,
            privileged_account: false,
            resumable_cache: true,
            web_endpoint: 4,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ftm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FtmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FtmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FtmConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = FtmConfig::default();
        assert_eq!(cfg.download_budget_bytes, 1 << 20);
        assert_eq!(cfg.upload_budget_bytes, 4 << 20);
        assert!(!cfg.privileged_account);
        assert!(cfg.resumable_cache);
        assert_eq!(cfg.web_endpoint, 4);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = FtmConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: FtmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.download_budget_bytes, cfg.download_budget_bytes);
        assert_eq!(parsed.upload_budget_bytes, cfg.upload_budget_bytes);
        assert_eq!(parsed.privileged_account, cfg.privileged_account);
        assert_eq!(parsed.resumable_cache, cfg.resumable_cache);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            download_budget_bytes = 2097152
            privileged_account = true
            resumable_cache = false
        "#;
        let cfg: FtmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download_budget_bytes, 2 << 20);
        assert!(cfg.privileged_account);
        assert!(!cfg.resumable_cache);
        // Unlisted fields keep their defaults.
        assert_eq!(cfg.upload_budget_bytes, 4 << 20);
        assert_eq!(cfg.web_endpoint, 4);
    }
}
