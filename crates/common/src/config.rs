//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The config file is optional; a fresh install runs entirely on defaults.
//! Nothing secret lives in this file: credentials are kept by the profile
//! store, never in TOML.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Application name, also used as the secret store namespace.
pub const APP_NAME: &str = "platformctl";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PLATFORMCTL_CONFIG";

/// Redirects the encrypted file store to another directory.
pub const PROFILE_PATH_ENV: &str = "PLATFORMCTL_PROFILE_PATH";

/// Forces a store driver (`keyring`, `filesystem`, `in-memory`).
pub const STORE_DRIVER_ENV: &str = "PLATFORMCTL_STORE_DRIVER";

/// Accepted `store.driver` names, matched case-insensitively.
pub const STORE_DRIVERS: &[&str] = &["keyring", "filesystem", "file", "in-memory", "memory"];

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub login: LoginConfig,
    pub network: NetworkConfig,
}

/// Profile storage settings
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Explicit driver name. When unset the backend is picked from platform
    /// capability.
    pub driver: Option<String>,
    /// Directory for the encrypted file store.
    pub profile_dir: Option<PathBuf>,
}

/// Interactive login settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub callback_port: u16,
    pub timeout_secs: u64,
    pub open_browser: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            callback_port: 9000,
            timeout_secs: 300,
            open_browser: true,
        }
    }
}

/// Outbound HTTP settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Resolve config file path from CLI arg or PLATFORMCTL_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(p);
        }
        PathBuf::from("platformctl.toml")
    }

    /// Overlay environment variables. Empty values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(dir) = non_empty_env(PROFILE_PATH_ENV) {
            self.store.profile_dir = Some(PathBuf::from(dir));
        }
        if let Some(driver) = non_empty_env(STORE_DRIVER_ENV) {
            self.store.driver = Some(driver);
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(driver) = &self.store.driver {
            let name = driver.trim().to_ascii_lowercase();
            if !STORE_DRIVERS.contains(&name.as_str()) {
                return Err(Error::Config(format!(
                    "store.driver {driver:?} is unknown; expected one of {}",
                    STORE_DRIVERS.join(", ")
                )));
            }
        }
        if self.login.callback_port == 0 {
            return Err(Error::Config("login.callback_port must be non-zero".into()));
        }
        if self.login.timeout_secs == 0 {
            return Err(Error::Config("login.timeout_secs must be greater than 0".into()));
        }
        if self.network.timeout_secs == 0 {
            return Err(Error::Config("network.timeout_secs must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login.timeout_secs)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_env() {
        unsafe {
            remove_env(PROFILE_PATH_ENV);
            remove_env(STORE_DRIVER_ENV);
            remove_env(CONFIG_PATH_ENV);
        }
    }

    fn valid_toml() -> &'static str {
        r#"
[store]
driver = "filesystem"
profile_dir = "/var/lib/platformctl/profiles"

[login]
callback_port = 9100
timeout_secs = 120
open_browser = false

[network]
timeout_secs = 10
"#
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("platformctl.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.driver.as_deref(), Some("filesystem"));
        assert_eq!(
            config.store.profile_dir,
            Some(PathBuf::from("/var/lib/platformctl/profiles"))
        );
        assert_eq!(config.login.callback_port, 9100);
        assert_eq!(config.login_timeout(), Duration::from_secs(120));
        assert!(!config.login.open_browser);
        assert_eq!(config.network_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_defaults_when_file_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = Config::load_or_default(Path::new("/nonexistent/platformctl.toml")).unwrap();
        assert!(config.store.driver.is_none());
        assert!(config.store.profile_dir.is_none());
        assert_eq!(config.login.callback_port, 9000);
        assert_eq!(config.login.timeout_secs, 300);
        assert!(config.login.open_browser);
        assert_eq!(config.network.timeout_secs, 30);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/platformctl.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{{{ toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[login]\ncallback_port = 9200\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.login.callback_port, 9200);
        assert_eq!(config.login.timeout_secs, 300);
        assert_eq!(config.network.timeout_secs, 30);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "[network]\ntimeout_secs = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("network.timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_zero_callback_port_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("port.toml");
        std::fs::write(&path, "[login]\ncallback_port = 0\n").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.toml");
        std::fs::write(&path, "[store]\ndriver = \"carrier-pigeon\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got: {err}");
        assert!(err.to_string().contains("store.driver"), "got: {err}");

        std::fs::write(&path, "[store]\ndriver = \"KeyRing\"\n").unwrap();
        assert!(Config::load(&path).is_ok());
    }

    #[test]
    fn test_unknown_driver_from_env_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe { set_env(STORE_DRIVER_ENV, "s3") };

        let result = Config::load_or_default(Path::new("/nonexistent/platformctl.toml"));
        assert!(matches!(result, Err(Error::Config(_))));

        clear_env();
    }

    #[test]
    fn test_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("platformctl.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        unsafe {
            set_env(PROFILE_PATH_ENV, "/tmp/override-profiles");
            set_env(STORE_DRIVER_ENV, "in-memory");
        }

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.store.profile_dir,
            Some(PathBuf::from("/tmp/override-profiles"))
        );
        assert_eq!(config.store.driver.as_deref(), Some("in-memory"));

        clear_env();
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe { set_env(PROFILE_PATH_ENV, "   ") };

        let config = Config::load_or_default(Path::new("/nonexistent/platformctl.toml")).unwrap();
        assert!(config.store.profile_dir.is_none());

        clear_env();
    }

    #[test]
    fn test_resolve_path_prefers_cli() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe { set_env(CONFIG_PATH_ENV, "/etc/platformctl.toml") };

        assert_eq!(
            Config::resolve_path(Some("./custom.toml")),
            PathBuf::from("./custom.toml")
        );
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("/etc/platformctl.toml")
        );

        unsafe { remove_env(CONFIG_PATH_ENV) };
        assert_eq!(Config::resolve_path(None), PathBuf::from("platformctl.toml"));
    }
}
