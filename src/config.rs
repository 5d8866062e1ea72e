// src/config.rs

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::{env, fs, io, path::Path};
use tracing::{info, warn};
use url::Url;

/// Environment variable carrying the catalog provider key(s);
/// comma-separation is tolerated.
pub const CATALOG_KEYS_ENV: &str = "WATCHLIST_TMDB_API_KEY";

/// Environment variables for the ratings provider key slots.
pub const RATINGS_KEY_ENVS: [&str; 5] = [
    "WATCHLIST_OMDB_API_KEY_1",
    "WATCHLIST_OMDB_API_KEY_2",
    "WATCHLIST_OMDB_API_KEY_3",
    "WATCHLIST_OMDB_API_KEY_4",
    "WATCHLIST_OMDB_API_KEY_5",
];

const DEFAULT_CATALOG_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_RATINGS_BASE_URL: &str = "https://www.omdbapi.com";

/// Fully resolved application configuration.
///
/// Credentials come only from environment variables; the optional YAML
/// file supplies server settings and base URL overrides. A provider
/// with zero keys is a valid, degraded configuration — startup never
/// fails for missing keys.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub catalog: ProviderConfig,
    pub ratings: ProviderConfig,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    8080
}

/// Shape of the optional YAML file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    server: Option<ServerConfig>,
    #[serde(default)]
    catalog_base_url: Option<String>,
    #[serde(default)]
    ratings_base_url: Option<String>,
}

/// Loads configuration: optional YAML file first, then credentials
/// from the environment.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let path_str = path.display().to_string();

    let file_config = match fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => {
            warn!("config file '{path_str}' is empty; using defaults");
            FileConfig::default()
        }
        Ok(contents) => {
            let parsed: FileConfig = serde_yaml::from_str(&contents)?;
            info!("loaded configuration file '{path_str}'");
            parsed
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("optional config file '{path_str}' not found; using defaults");
            FileConfig::default()
        }
        Err(e) => {
            return Err(AppError::Io(io::Error::new(
                e.kind(),
                format!("failed to read config file '{path_str}': {e}"),
            )))
        }
    };

    let catalog_keys = dedup_keys(
        env::var(CATALOG_KEYS_ENV)
            .map(|v| v.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
    );
    let ratings_keys = dedup_keys(
        RATINGS_KEY_ENVS
            .iter()
            .filter_map(|name| env::var(name).ok())
            .collect(),
    );

    if catalog_keys.is_empty() {
        warn!("no catalog keys configured ({CATALOG_KEYS_ENV} unset); catalog routes will return 503");
    }
    if ratings_keys.is_empty() {
        warn!("no ratings keys configured; rating lookups will return \"N/A\"");
    }

    let config = AppConfig {
        server: file_config.server.unwrap_or_default(),
        catalog: ProviderConfig {
            base_url: file_config
                .catalog_base_url
                .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string()),
            keys: catalog_keys,
        },
        ratings: ProviderConfig {
            base_url: file_config
                .ratings_base_url
                .unwrap_or_else(|| DEFAULT_RATINGS_BASE_URL.to_string()),
            keys: ratings_keys,
        },
    };

    validate_config(&config)?;
    info!(
        catalog_keys = config.catalog.keys.len(),
        ratings_keys = config.ratings.keys.len(),
        server.port = config.server.port,
        "configuration loaded"
    );
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.host.trim().is_empty() || config.server.port == 0 {
        return Err(AppError::Config(format!(
            "invalid server configuration: host='{}', port={}",
            config.server.host, config.server.port
        )));
    }
    for (name, base_url) in [
        ("catalog", &config.catalog.base_url),
        ("ratings", &config.ratings.base_url),
    ] {
        Url::parse(base_url).map_err(|e| {
            AppError::Config(format!("invalid {name} base URL '{base_url}': {e}"))
        })?;
    }
    Ok(())
}

/// Trims, drops blanks, and de-duplicates preserving first-seen order.
fn dedup_keys(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn create_temp_config_file(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let file_path = dir.path().join("test_config.yaml");
        let mut file = File::create(&file_path).expect("failed to create temp config file");
        writeln!(file, "{content}").expect("failed to write temp config file");
        file_path
    }

    fn cleanup_env() {
        env::remove_var(CATALOG_KEYS_ENV);
        for name in RATINGS_KEY_ENVS {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn loads_from_env_without_config_file() {
        cleanup_env();
        env::set_var(CATALOG_KEYS_ENV, "tmdb-key");
        env::set_var("WATCHLIST_OMDB_API_KEY_1", "omdb-1");
        env::set_var("WATCHLIST_OMDB_API_KEY_3", "omdb-3");

        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("missing.yaml")).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.catalog.keys, vec!["tmdb-key"]);
        assert_eq!(config.ratings.keys, vec!["omdb-1", "omdb-3"]);
        assert_eq!(config.catalog.base_url, DEFAULT_CATALOG_BASE_URL);
        assert_eq!(config.ratings.base_url, DEFAULT_RATINGS_BASE_URL);
        cleanup_env();
    }

    #[test]
    #[serial]
    fn zero_keys_is_a_valid_degraded_configuration() {
        cleanup_env();
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("missing.yaml")).unwrap();
        assert!(config.catalog.keys.is_empty());
        assert!(config.ratings.keys.is_empty());
    }

    #[test]
    #[serial]
    fn catalog_keys_may_be_comma_separated() {
        cleanup_env();
        env::set_var(CATALOG_KEYS_ENV, "k1, k2 ,k1,,k3");
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("missing.yaml")).unwrap();
        assert_eq!(config.catalog.keys, vec!["k1", "k2", "k3"]);
        cleanup_env();
    }

    #[test]
    #[serial]
    fn file_overrides_server_and_base_urls() {
        cleanup_env();
        let dir = tempdir().unwrap();
        let path = create_temp_config_file(
            &dir,
            r#"
server: { host: "127.0.0.1", port: 9999 }
catalog_base_url: "http://localhost:1234/catalog"
ratings_base_url: "http://localhost:1234/ratings"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.catalog.base_url, "http://localhost:1234/catalog");
        assert_eq!(config.ratings.base_url, "http://localhost:1234/ratings");
    }

    #[test]
    #[serial]
    fn invalid_base_url_is_rejected() {
        cleanup_env();
        let dir = tempdir().unwrap();
        let path = create_temp_config_file(&dir, r#"catalog_base_url: "::not a url::""#);
        let result = load_config(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    #[serial]
    fn malformed_yaml_is_rejected() {
        cleanup_env();
        let dir = tempdir().unwrap();
        let path = create_temp_config_file(&dir, "server: [not, a, map]");
        let result = load_config(&path);
        assert!(matches!(result, Err(AppError::YamlParsing(_))));
    }
}
