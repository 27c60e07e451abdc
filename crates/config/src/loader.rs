use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{env_subst::substitute_env, error::ConfigError, schema::ProphetConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "prophet.toml",
    "prophet.yaml",
    "prophet.yml",
    "prophet.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ProphetConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `explicit` (the `--config` flag), which must exist
/// 2. `./prophet.{toml,yaml,yml,json}` (project-local)
/// 3. `~/.config/prophet/prophet.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ProphetConfig::default()` if no config file is found. A file that
/// exists but does not parse is an error rather than a silent fallback.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<ProphetConfig, ConfigError> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "loading config");
        return load_config(path);
    }
    match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(ProphetConfig::default())
        },
    }
}

fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/prophet/
    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: `~/.config/prophet/` on all platforms.
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".config").join("prophet"))
}

/// Returns the data directory: `~/.prophet/` on all platforms.
pub fn data_dir() -> PathBuf {
    home_dir()
        .map(|h| h.join(".prophet"))
        .unwrap_or_else(|| PathBuf::from(".prophet"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<ProphetConfig, ConfigError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| ConfigError::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| ConfigError::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| ConfigError::parse(path, e)),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::schema::StorageBackend, rstest::rstest};

    #[rstest]
    #[case("prophet.toml", "[server]\nport = 9100\n")]
    #[case("prophet.yaml", "server:\n  port: 9100\n")]
    #[case("prophet.json", r#"{"server": {"port": 9100}}"#)]
    fn loads_every_supported_format(#[case] name: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.prediction.default_model, "Language Detection");
    }

    #[test]
    fn explicit_path_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[storage]\nbackend = \"sqlite\"\npath = \"/var/lib/prophet/creds.db\"\n",
        )
        .unwrap();

        let config = discover_and_load(Some(&path)).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(
            config.storage.resolved_path(),
            PathBuf::from("/var/lib/prophet/creds.db")
        );
    }

    #[test]
    fn missing_explicit_path_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_and_load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prophet.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prophet.ini");
        std::fs::write(&path, "port=1").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }
}
