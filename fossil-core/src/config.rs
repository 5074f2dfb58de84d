//! Global (per-user, cross-repository) configuration file (§6.5).
//!
//! Distinct from [`fossil_storage::RepoConfig`] (per-repository settings
//! stored in `repo.config`) and [`fossil_storage::CheckoutVars`]
//! (per-checkout state in `local.vvar`): this is the one file that exists
//! outside of any single repository, holding user identity and defaults
//! that seed new repositories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::Error;

const HOME_ENV: &str = "FOSSIL_HOME";

/// Locate the global config file following §6.5's resolution chain:
/// `FOSSIL_HOME` env var, then `$HOME/.fossil` if it already exists,
/// then the XDG config directory, finally falling back to
/// `$HOME/.fossil` even if absent (the caller creates it on first save).
pub fn locate() -> PathBuf {
    if let Ok(explicit) = std::env::var(HOME_ENV) {
        return PathBuf::from(explicit);
    }
    if let Some(home) = dirs::home_dir() {
        let dot_fossil = home.join(".fossil");
        if dot_fossil.exists() {
            return dot_fossil;
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("fossil").join("global");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fossil")
}

/// The global config: user identity plus arbitrary string key/value
/// settings, backed by a flat `key=value` text file (one setting per
/// line, blank lines and `#`-prefixed lines ignored).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub path: PathBuf,
    pub user: Option<String>,
    values: BTreeMap<String, String>,
}

impl Config {
    pub fn new(path: PathBuf) -> Self {
        Self { path, user: None, values: BTreeMap::new() }
    }

    /// Load from `path`, tolerating a missing file (an empty `Config` is
    /// not an error — first run hasn't created one yet).
    pub fn load(path: PathBuf) -> Result<Self, Error> {
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(e) => return Err(Error::Io(e)),
        };
        let mut cfg = Self::new(path);
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key == "user" {
                cfg.user = Some(value.to_string());
            } else {
                cfg.values.insert(key.to_string(), value.to_string());
            }
        }
        Ok(cfg)
    }

    /// Load from the resolved default location.
    pub fn load_default() -> Result<Self, Error> {
        Self::load(locate())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn save(&self) -> Result<(), Error> {
        self.save_to(&self.path)
    }

    fn save_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        if let Some(user) = &self.user {
            text.push_str(&format!("user={user}\n"));
        }
        for (k, v) in &self.values {
            text.push_str(&format!("{k}={v}\n"));
        }
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(dir.path().join("nope")).unwrap();
        assert!(cfg.user.is_none());
        assert_eq!(cfg.get("hash-policy"), None);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".fossil");
        let mut cfg = Config::new(path.clone());
        cfg.user = Some("alice".into());
        cfg.set("hash-policy", "auto");
        cfg.save().unwrap();

        let reloaded = Config::load(path).unwrap();
        assert_eq!(reloaded.user.as_deref(), Some("alice"));
        assert_eq!(reloaded.get("hash-policy"), Some("auto"));
    }
}
