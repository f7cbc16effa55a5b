//! # fpconfig - configuration de FilterPlay
//!
//! A single YAML tree, built once per process:
//!
//! 1. the defaults compiled into the binary (`filterplay.yaml`),
//! 2. overlaid with `config.yaml` from the configuration directory,
//! 3. overlaid with `FILTERPLAY_CONFIG__SECTION__KEY=value` variables.
//!
//! Keys are case-insensitive (stored lowercase). Every setter writes the
//! whole tree back to `config.yaml`.
//!
//! ```no_run
//! use fpconfig::get_config;
//!
//! let config = get_config();
//! let origin = config.get_upstream_base_url()?;
//! config.set_session_ttl_secs(45)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{info, warn};

#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "api")]
pub mod openapi;

#[cfg(feature = "api")]
pub use openapi::ApiDoc;

const EMBEDDED_DEFAULTS: &str = include_str!("filterplay.yaml");
const CONFIG_FILE: &str = "config.yaml";

const ENV_CONFIG_DIR: &str = "FILTERPLAY_CONFIG";
const ENV_PREFIX: &str = "FILTERPLAY_CONFIG__";
const CONFIG_DIR_NAME: &str = ".filterplay";

const DEFAULT_HTTP_PORT: u16 = 8480;
const DEFAULT_BASE_URL: &str = "localhost";

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load FilterPlay configuration"));
}

/// Generates a `Result`-returning getter and a persisting setter for one key
///
/// The getter falls back to `$default` when the key is missing, has the wrong
/// type, or (for strings) is blank.
macro_rules! config_field {
    ($getter:ident, $setter:ident, $ty:ty, [$($key:literal),+], $default:expr) => {
        pub fn $getter(&self) -> Result<$ty> {
            Ok(self.read::<$ty>(&[$($key),+]).unwrap_or_else(|| $default.into()))
        }

        pub fn $setter(&self, value: $ty) -> Result<()> {
            self.write(&[$($key),+], value)
        }
    };
}

/// Live configuration tree and the file it is persisted to
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(self.tree().clone()),
        }
    }
}

impl Config {
    fn tree(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Picks the configuration directory
    ///
    /// Explicit argument, then `$FILTERPLAY_CONFIG`, then an existing
    /// `./.filterplay`, then an existing `~/.filterplay`; `./.filterplay`
    /// otherwise.
    fn locate_dir(explicit: &str) -> String {
        if !explicit.is_empty() {
            return explicit.to_string();
        }
        if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %from_env, "Config directory from environment");
            return from_env;
        }

        let local = PathBuf::from(CONFIG_DIR_NAME);
        let home = home_dir().map(|h| h.join(CONFIG_DIR_NAME));
        [Some(local), home]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_dir())
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_else(|| CONFIG_DIR_NAME.to_string())
    }

    /// Creates `dir` if needed and checks that it is a writable directory
    fn ensure_writable(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create config directory {}", dir.display()))?;
        if !dir.is_dir() {
            return Err(anyhow!("{} is not a directory", dir.display()));
        }
        let probe = dir.join(".fp_probe");
        fs::write(&probe, b"")
            .with_context(|| format!("Config directory {} is not writable", dir.display()))?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    /// Resolves the configuration directory and makes sure it is usable
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = Self::locate_dir(directory);
        Self::ensure_writable(Path::new(&dir))?;
        Ok(dir)
    }

    /// Builds the configuration from `directory` (empty: automatic lookup)
    ///
    /// The merged tree is written back, so `config.yaml` always lists every key.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        let path = Path::new(&config_dir).join(CONFIG_FILE);

        let mut tree: Value = serde_yaml::from_str(EMBEDDED_DEFAULTS)?;
        match fs::read_to_string(&path) {
            Ok(text) => {
                let user: Value = serde_yaml::from_str(&text)
                    .with_context(|| format!("Invalid YAML in {}", path.display()))?;
                overlay(&mut tree, &lowercase_keys(user));
                info!(file = %path.display(), "Configuration file loaded");
            }
            Err(_) => info!(file = %path.display(), "No configuration file, using defaults"),
        }

        for (name, raw) in env::vars() {
            let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let keys: Vec<&str> = rest.split("__").collect();
            let value = serde_yaml::from_str(&raw).unwrap_or(Value::String(raw.clone()));
            if let Err(e) = insert_at(&mut tree, &keys, value) {
                warn!("Ignoring {}: {}", name, e);
            }
        }

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(tree),
        };
        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Writes the current tree to `config.yaml`
    pub fn save(&self) -> Result<()> {
        let text = serde_yaml::to_string(&*self.tree())?;
        fs::write(&self.path, text)
            .with_context(|| format!("Cannot write {}", self.path.display()))
    }

    /// Replaces the value at `path` (intermediate maps are created) and saves
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        insert_at(&mut self.tree(), path, value)?;
        self.save()
    }

    /// Value at `path`; an empty path returns the whole tree
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let tree = self.tree();
        let mut node = &*tree;
        for (depth, key) in path.iter().enumerate() {
            let Value::Mapping(map) = node else {
                return Err(anyhow!("{} is not a section", path[..depth].join(".")));
            };
            node = map
                .get(key.to_lowercase())
                .ok_or_else(|| anyhow!("Path {} does not exist", path[..=depth].join(".")))?;
        }
        Ok(node.clone())
    }

    fn read<T: DeserializeOwned>(&self, path: &[&str]) -> Option<T> {
        let value = self.get_value(path).ok()?;
        if matches!(&value, Value::String(s) if s.trim().is_empty()) {
            return None;
        }
        serde_yaml::from_value(value).ok()
    }

    fn write<T: Serialize>(&self, path: &[&str], value: T) -> Result<()> {
        self.set_value(path, serde_yaml::to_value(value)?)
    }

    /// Host name shown in server logs
    pub fn get_base_url(&self) -> String {
        self.read::<String>(&["host", "base_url"]).unwrap_or_else(|| {
            warn!("host.base_url unset or invalid, using {}", DEFAULT_BASE_URL);
            DEFAULT_BASE_URL.to_string()
        })
    }

    /// Listening port; quoted numbers are accepted
    pub fn get_http_port(&self) -> u16 {
        let port = match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Ok(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        port.unwrap_or_else(|| {
            warn!("host.http_port unset or invalid, using {}", DEFAULT_HTTP_PORT);
            DEFAULT_HTTP_PORT
        })
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.write(&["host", "http_port"], port)
    }

    config_field!(get_log_cache_size, set_log_cache_size, usize, ["host", "logger", "buffer_capacity"], 1000usize);
    config_field!(get_log_enable_console, set_log_enable_console, bool, ["host", "logger", "enable_console"], true);
    config_field!(get_log_min_level, set_log_min_level, String, ["host", "logger", "min_level"], "INFO");

    config_field!(get_upstream_base_url, set_upstream_base_url, String, ["upstream", "base_url"], "https://music.youtube.com");
    config_field!(get_upstream_timeout_secs, set_upstream_timeout_secs, u64, ["upstream", "timeout_secs"], 30u64);
    config_field!(get_upstream_user_agent, set_upstream_user_agent, String, ["upstream", "user_agent"], "FilterPlay/0.1 (fpserver)");

    config_field!(get_session_ttl_secs, set_session_ttl_secs, u64, ["interception", "session_ttl_secs"], 30u64);
    config_field!(get_default_batch_size, set_default_batch_size, usize, ["interception", "default_batch_size"], 20usize);
}

/// Process-wide configuration, loaded on first use
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Recursively overlays `top` on `base`: maps are merged key by key, anything
/// else in `top` replaces what `base` had
fn overlay(base: &mut Value, top: &Value) {
    match (base, top) {
        (Value::Mapping(base_map), Value::Mapping(top_map)) => {
            for (key, value) in top_map {
                match base_map.get_mut(key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (key, lowercase_keys(value))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

fn insert_at(node: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *node = value;
        return Ok(());
    };
    let Value::Mapping(map) = node else {
        return Err(anyhow!("Cannot set {}: parent is not a section", first));
    };
    let key = Value::String(first.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        return Ok(());
    }
    let child = map.entry(key).or_insert_with(|| Value::Mapping(Mapping::new()));
    insert_at(child, rest, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults_from_embedded_yaml() {
        let (_dir, config) = temp_config();

        assert_eq!(config.get_http_port(), 8480);
        assert_eq!(config.get_session_ttl_secs().unwrap(), 30);
        assert_eq!(config.get_default_batch_size().unwrap(), 20);
        assert_eq!(
            config.get_upstream_base_url().unwrap(),
            "https://music.youtube.com"
        );
        assert!(config.get_log_enable_console().unwrap());
    }

    #[test]
    fn test_load_writes_config_file() {
        let (dir, _config) = temp_config();
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_user_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "interception:\n  Session_TTL_Secs: 5\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get_session_ttl_secs().unwrap(), 5);
        // untouched keys keep their embedded default
        assert_eq!(config.get_default_batch_size().unwrap(), 20);
    }

    #[test]
    fn test_set_value_persists() {
        let (dir, config) = temp_config();
        config.set_default_batch_size(7).unwrap();
        config.set_http_port(9001).unwrap();

        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.get_default_batch_size().unwrap(), 7);
        assert_eq!(reloaded.get_http_port(), 9001);
    }

    #[test]
    fn test_wrong_type_falls_back_to_default() {
        let (_dir, config) = temp_config();
        config
            .set_value(&["interception", "default_batch_size"], Value::String("lots".into()))
            .unwrap();
        config
            .set_value(&["upstream", "user_agent"], Value::String("  ".into()))
            .unwrap();

        assert_eq!(config.get_default_batch_size().unwrap(), 20);
        assert_eq!(
            config.get_upstream_user_agent().unwrap(),
            "FilterPlay/0.1 (fpserver)"
        );
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let (_dir, config) = temp_config();
        assert!(config.get_value(&["nope", "missing"]).is_err());
        assert!(config.get_value(&["host", "http_port", "deeper"]).is_err());
    }

    #[test]
    fn test_overlay_replaces_scalars_and_keeps_siblings() {
        let mut base: Value = serde_yaml::from_str("a:\n  b: 1\n  c: 2\n").unwrap();
        let top: Value = serde_yaml::from_str("a:\n  b: 3\n").unwrap();
        overlay(&mut base, &top);

        let expected: Value = serde_yaml::from_str("a:\n  b: 3\n  c: 2\n").unwrap();
        assert_eq!(base, expected);
    }
}
