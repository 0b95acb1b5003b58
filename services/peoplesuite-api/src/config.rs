//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The photo URL signing key is loaded from PHOTO_SIGNING_KEY or
//! signing_key_file, never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Env var holding the photo URL signing key
pub const SIGNING_KEY_ENV: &str = "PHOTO_SIGNING_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub photos: PhotoConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Every API route is mounted under this prefix
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Key-value table locations
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub credentials_path: PathBuf,
    pub employees_path: PathBuf,
}

/// Photo object store settings
#[derive(Debug, Deserialize)]
pub struct PhotoConfig {
    pub dir: PathBuf,
    /// Externally reachable base URL that signed photo URLs are built on
    pub public_url: String,
    #[serde(default = "default_url_expiry")]
    pub url_expiry_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub signing_key_file: Option<PathBuf>,
    #[serde(skip)]
    pub signing_key: Option<Secret<String>>,
}

fn default_path_prefix() -> String {
    "/peoplesuite/apis".into()
}

fn default_max_connections() -> usize {
    1000
}

fn default_url_expiry() -> u64 {
    3600
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Signing key resolution order:
    /// 1. PHOTO_SIGNING_KEY env var
    /// 2. signing_key_file path from config
    ///
    /// Blank values from either source count as unset.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        let env_key = std::env::var(SIGNING_KEY_ENV)
            .ok()
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty());

        if let Some(key) = env_key {
            config.photos.signing_key = Some(Secret::new(key));
        } else if let Some(ref key_file) = config.photos.signing_key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read signing_key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.photos.signing_key = Some(Secret::new(key));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let prefix = &self.server.path_prefix;
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(common::Error::Config(format!(
                "path_prefix must start with '/' and must not end with '/', got: {prefix}"
            )));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if !self.photos.public_url.starts_with("http://")
            && !self.photos.public_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "public_url must start with http:// or https://, got: {}",
                self.photos.public_url
            )));
        }

        if self.photos.url_expiry_secs == 0 {
            return Err(common::Error::Config(
                "url_expiry_secs must be greater than 0".into(),
            ));
        }

        if self.photos.max_upload_bytes == 0 {
            return Err(common::Error::Config(
                "max_upload_bytes must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("peoplesuite-api.toml")
    }
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

    fn valid_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:8080"

[storage]
credentials_path = "/var/lib/peoplesuite/client_credentials.json"
employees_path = "/var/lib/peoplesuite/employees.json"

[photos]
dir = "/var/lib/peoplesuite/photos"
public_url = "http://localhost:8080/peoplesuite/apis"
"#
    }

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), valid_toml());

        unsafe { remove_env(SIGNING_KEY_ENV) };

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.server.path_prefix, "/peoplesuite/apis");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.photos.url_expiry_secs, 3600);
        assert_eq!(config.photos.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(
            config.storage.employees_path,
            PathBuf::from("/var/lib/peoplesuite/employees.json")
        );
        assert!(config.photos.signing_key.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_missing_section_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[server]
listen_addr = "127.0.0.1:8080"
"#,
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_signing_key_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), valid_toml());

        unsafe { set_env(SIGNING_KEY_ENV, "env-key-123") };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.photos.signing_key.as_ref().unwrap().expose(),
            "env-key-123"
        );
        unsafe { remove_env(SIGNING_KEY_ENV) };
    }

    #[test]
    fn test_signing_key_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("signing_key");
        std::fs::write(&key_path, "file-key-456\n").unwrap();

        let contents = format!(
            "{}signing_key_file = \"{}\"\n",
            valid_toml(),
            key_path.display()
        );
        let path = write_config(dir.path(), &contents);

        unsafe { remove_env(SIGNING_KEY_ENV) };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.photos.signing_key.as_ref().unwrap().expose(),
            "file-key-456"
        );
    }

    #[test]
    fn test_signing_key_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("signing_key");
        std::fs::write(&key_path, "file-value").unwrap();

        let contents = format!(
            "{}signing_key_file = \"{}\"\n",
            valid_toml(),
            key_path.display()
        );
        let path = write_config(dir.path(), &contents);

        unsafe { set_env(SIGNING_KEY_ENV, "env-value") };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.photos.signing_key.as_ref().unwrap().expose(),
            "env-value"
        );
        unsafe { remove_env(SIGNING_KEY_ENV) };
    }

    #[test]
    fn test_blank_env_signing_key_is_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), valid_toml());

        for blank in ["", "  \n"] {
            unsafe { set_env(SIGNING_KEY_ENV, blank) };
            let config = Config::load(&path).unwrap();
            assert!(
                config.photos.signing_key.is_none(),
                "{blank:?} should leave the key unset"
            );
        }
        unsafe { remove_env(SIGNING_KEY_ENV) };
    }

    #[test]
    fn test_blank_env_signing_key_falls_back_to_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("signing_key");
        std::fs::write(&key_path, "file-value").unwrap();

        let contents = format!(
            "{}signing_key_file = \"{}\"\n",
            valid_toml(),
            key_path.display()
        );
        let path = write_config(dir.path(), &contents);

        unsafe { set_env(SIGNING_KEY_ENV, "") };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.photos.signing_key.as_ref().unwrap().expose(),
            "file-value"
        );
        unsafe { remove_env(SIGNING_KEY_ENV) };
    }

    #[test]
    fn test_unreadable_signing_key_file_errors() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let contents = format!(
            "{}signing_key_file = \"/nonexistent/signing_key\"\n",
            valid_toml()
        );
        let path = write_config(dir.path(), &contents);

        unsafe { remove_env(SIGNING_KEY_ENV) };
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("signing_key_file"), "got: {err}");
    }

    #[test]
    fn test_path_prefix_validation() {
        let dir = tempfile::tempdir().unwrap();
        for prefix in ["peoplesuite", "/peoplesuite/", "/"] {
            let contents = valid_toml().replace(
                "listen_addr = \"127.0.0.1:8080\"",
                &format!("listen_addr = \"127.0.0.1:8080\"\npath_prefix = \"{prefix}\""),
            );
            let path = write_config(dir.path(), &contents);
            let err = Config::load(&path).unwrap_err();
            assert!(
                err.to_string().contains("path_prefix"),
                "prefix {prefix:?} should be rejected, got: {err}"
            );
        }
    }

    #[test]
    fn test_public_url_requires_http_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let contents = valid_toml().replace("http://localhost:8080", "ftp://localhost");
        let path = write_config(dir.path(), &contents);
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("public_url"), "got: {err}");
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (field, expected) in [
            ("url_expiry_secs = 0", "url_expiry_secs"),
            ("max_upload_bytes = 0", "max_upload_bytes"),
        ] {
            let contents = format!("{}{field}\n", valid_toml());
            let path = write_config(dir.path(), &contents);
            let err = Config::load(&path).unwrap_err();
            assert!(err.to_string().contains(expected), "got: {err}");
        }

        let contents = valid_toml().replace(
            "listen_addr = \"127.0.0.1:8080\"",
            "listen_addr = \"127.0.0.1:8080\"\nmax_connections = 0",
        );
        let path = write_config(dir.path(), &contents);
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("max_connections"), "got: {err}");
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("peoplesuite-api.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }
}
