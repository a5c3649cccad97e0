//! Configuration loader
//!
//! Loads engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment, if one exists
//! 2. If any `FLAGGATE_*` variable is set, builds the config from the
//!    environment (unset variables keep their defaults)
//! 3. Otherwise probes the working directory for a config file
//! 4. Otherwise uses defaults
//!
//! Every loaded config is validated before it is returned.
//!
//! ## Environment Variables
//! - `FLAGGATE_CACHE_TTL_SECS`: Cache lifetime and refresh interval
//! - `FLAGGATE_STORE_TIMEOUT_MS`: Bound on store calls made while evaluating
//! - `FLAGGATE_REFRESH_ENABLED`: Whether the background refresh runs
//! - `FLAGGATE_REFRESH_TIMEOUT_SECS`: Bound on a single refresh
//! - `FLAGGATE_DB_PATH`: SQLite database path (in-memory store when unset)
//! - `FLAGGATE_DB_POOL_SIZE`: Connection pool size
//!
//! ## File Locations
//! `./flaggate.json` or `./flaggate.toml` in the current working directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use flaggate_domain::{Config, FlagError, Result};

const ENV_CACHE_TTL_SECS: &str = "FLAGGATE_CACHE_TTL_SECS";
const ENV_STORE_TIMEOUT_MS: &str = "FLAGGATE_STORE_TIMEOUT_MS";
const ENV_REFRESH_ENABLED: &str = "FLAGGATE_REFRESH_ENABLED";
const ENV_REFRESH_TIMEOUT_SECS: &str = "FLAGGATE_REFRESH_TIMEOUT_SECS";
const ENV_DB_PATH: &str = "FLAGGATE_DB_PATH";
const ENV_DB_POOL_SIZE: &str = "FLAGGATE_DB_POOL_SIZE";

const ENV_KEYS: [&str; 6] = [
    ENV_CACHE_TTL_SECS,
    ENV_STORE_TIMEOUT_MS,
    ENV_REFRESH_ENABLED,
    ENV_REFRESH_TIMEOUT_SECS,
    ENV_DB_PATH,
    ENV_DB_POOL_SIZE,
];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `FlagError::Config` if a source is present but malformed, or the
/// resulting config fails validation.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }

    if let Some(config) = load_from_env()? {
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No configuration found; using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables
///
/// Returns `Ok(None)` when no `FLAGGATE_*` variable is set.
///
/// # Errors
/// Returns `FlagError::Config` if a variable has an invalid value.
pub fn load_from_env() -> Result<Option<Config>> {
    if !ENV_KEYS.iter().any(|key| std::env::var_os(key).is_some()) {
        return Ok(None);
    }

    let mut config = Config::default();

    if let Some(ttl) = env_parse(ENV_CACHE_TTL_SECS)? {
        config.cache.ttl_seconds = ttl;
    }
    if let Some(timeout) = env_parse(ENV_STORE_TIMEOUT_MS)? {
        config.cache.store_timeout_ms = timeout;
    }
    if let Some(enabled) = env_bool(ENV_REFRESH_ENABLED)? {
        config.refresh.enabled = enabled;
    }
    if let Some(timeout) = env_parse(ENV_REFRESH_TIMEOUT_SECS)? {
        config.refresh.timeout_seconds = timeout;
    }
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        config.database.path = Some(path).filter(|p| !p.trim().is_empty());
    }
    if let Some(pool_size) = env_parse(ENV_DB_POOL_SIZE)? {
        config.database.pool_size = pool_size;
    }

    config.validate()?;
    Ok(Some(config))
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the working directory for a config file.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `FlagError::Config` if:
/// - File not found
/// - File format is invalid
/// - The parsed config fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FlagError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths()
            .ok_or_else(|| FlagError::Config("No config file found".to_string()))?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FlagError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FlagError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FlagError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(FlagError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing `flaggate.json` / `flaggate.toml` in the working directory.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    [cwd.join("flaggate.json"), cwd.join("flaggate.toml")].into_iter().find(|path| path.exists())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| FlagError::Config(format!("Invalid value for {key} ({raw:?}): {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str) -> Result<Option<bool>> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(FlagError::Config(format!("Invalid boolean for {key}: {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (raw, expected) in
            [("1", true), ("TRUE", true), ("yes", true), ("on", true), ("0", false), ("off", false)]
        {
            std::env::set_var("FLAGGATE_TEST_BOOL", raw);
            assert_eq!(env_bool("FLAGGATE_TEST_BOOL").expect("valid bool"), Some(expected));
        }

        std::env::set_var("FLAGGATE_TEST_BOOL", "maybe");
        assert!(matches!(env_bool("FLAGGATE_TEST_BOOL"), Err(FlagError::Config(_))));

        std::env::remove_var("FLAGGATE_TEST_BOOL");
        assert_eq!(env_bool("FLAGGATE_TEST_BOOL").expect("unset is fine"), None);
    }

    #[test]
    fn test_load_from_env_without_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        assert!(load_from_env().expect("no vars is not an error").is_none());
    }

    #[test]
    fn test_load_from_env_overlays_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(ENV_CACHE_TTL_SECS, "60");
        std::env::set_var(ENV_REFRESH_ENABLED, "false");
        std::env::set_var(ENV_DB_PATH, "/tmp/flags.db");

        let config = load_from_env().expect("valid env").expect("vars are set");
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.cache.store_timeout_ms, Config::default().cache.store_timeout_ms);
        assert!(!config.refresh.enabled);
        assert_eq!(config.database.path.as_deref(), Some("/tmp/flags.db"));

        clear_env();
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(ENV_DB_POOL_SIZE, "not-a-number");
        assert!(matches!(load_from_env(), Err(FlagError::Config(_))));

        clear_env();
    }

    #[test]
    fn test_load_from_env_rejects_zero_ttl() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(ENV_CACHE_TTL_SECS, "0");
        assert!(matches!(load_from_env(), Err(FlagError::Config(_))));

        clear_env();
    }

    #[test]
    fn test_parse_config_json() {
        let json = r#"{ "cache": { "ttl_seconds": 120 } }"#;
        let config = parse_config(json, Path::new("flaggate.json")).expect("valid JSON");
        assert_eq!(config.cache.ttl_seconds, 120);
        assert!(config.refresh.enabled);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml = "[refresh]\nenabled = false\n\n[database]\npath = \"flags.db\"\n";
        let config = parse_config(toml, Path::new("flaggate.toml")).expect("valid TOML");
        assert!(!config.refresh.enabled);
        assert_eq!(config.database.path.as_deref(), Some("flags.db"));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("cache: {}", Path::new("flaggate.yaml"));
        assert!(matches!(result, Err(FlagError::Config(_))));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/flaggate.json")));
        assert!(matches!(result, Err(FlagError::Config(_))));
    }
}
