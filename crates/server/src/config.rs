use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

const MIN_AUTO_CONCURRENCY: usize = 8;
const MAX_AUTO_CONCURRENCY: usize = 32;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub version: u32,
    pub music_root: String,
    pub public_path: String,
    pub cover_cache_path: String,
    pub fallback_cover_url: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<String>,
    pub cover_size: u32,
    pub cover_quality: u8,
    pub cover_timeout_secs: u64,
    /// Per-listing limit on concurrent track resolutions; 0 picks one from the
    /// core count.
    pub resolve_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: "/music".to_string(),
            public_path: "public".to_string(),
            cover_cache_path: "public/covers".to_string(),
            fallback_cover_url: "/default-cover.png".to_string(),
            port: 3000,
            bind_addr: None,
            cover_size: 300,
            cover_quality: 85,
            cover_timeout_secs: 20,
            resolve_concurrency: 0,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        match self.bind_addr.as_deref().map(str::trim) {
            Some(addr) if !addr.is_empty() => addr.to_string(),
            _ => format!("0.0.0.0:{}", if self.port == 0 { 3000 } else { self.port }),
        }
    }

    pub fn cover_timeout(&self) -> Duration {
        Duration::from_secs(self.cover_timeout_secs.max(1))
    }

    pub fn resolve_concurrency(&self) -> usize {
        if self.resolve_concurrency > 0 {
            return self.resolve_concurrency;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cores * 2).clamp(MIN_AUTO_CONCURRENCY, MAX_AUTO_CONCURRENCY)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("ALMANAC_MUSIC_ROOT") {
            if !value.trim().is_empty() {
                self.music_root = value;
            }
        }
        if let Ok(value) = env::var("ALMANAC_PORT") {
            if let Ok(port) = value.trim().parse::<u16>() {
                self.port = port;
            }
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

/// `ALMANAC_CONFIG` if set, otherwise `config.yaml` in the working directory.
pub fn config_path_from_env() -> PathBuf {
    env::var("ALMANAC_CONFIG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

/// Loads the config, writing defaults out first if the file does not exist.
/// The boolean is true when the file was created.
pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    let (mut config, created) = if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        (config, false)
    } else {
        let config = ServerConfig::default();
        save_config(path, &config)?;
        (config, true)
    };

    let defaults = ServerConfig::default();
    if config.public_path.trim().is_empty() {
        config.public_path = defaults.public_path;
    }
    if config.cover_cache_path.trim().is_empty() {
        config.cover_cache_path = defaults.cover_cache_path;
    }
    if config.fallback_cover_url.trim().is_empty() {
        config.fallback_cover_url = defaults.fallback_cover_url;
    }
    if config.cover_size == 0 {
        config.cover_size = defaults.cover_size;
    }
    if config.cover_quality == 0 || config.cover_quality > 100 {
        config.cover_quality = defaults.cover_quality;
    }
    config.apply_env_overrides();
    Ok((config, created))
}

fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value.trim());
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{load_or_create_config, resolve_path, ServerConfig};

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.yaml");
        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(config.cover_cache_path, "public/covers");

        let (_, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
    }

    #[test]
    fn fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "port: 8080\ncover_quality: 0\nresolve_concurrency: 3\n").unwrap();
        let (config, _) = load_or_create_config(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cover_quality, 85);
        assert_eq!(config.cover_size, 300);
        assert_eq!(config.resolve_concurrency(), 3);
    }

    #[test]
    fn auto_concurrency_is_bounded() {
        let config = ServerConfig::default();
        let limit = config.resolve_concurrency();
        assert!((8..=32).contains(&limit));
    }

    #[test]
    fn listen_addr_prefers_bind_addr() {
        let mut config = ServerConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:3000");
        config.bind_addr = Some("127.0.0.1:9000".to_string());
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let config_path = Path::new("/etc/almanac/config.yaml");
        assert_eq!(
            resolve_path(config_path, "public/covers"),
            Path::new("/etc/almanac/public/covers")
        );
        assert_eq!(resolve_path(config_path, "/music"), Path::new("/music"));
    }
}
