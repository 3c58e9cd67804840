//! User configuration.
//!
//! Read from `$DBMI_CONFIG`, or `<config dir>/dbmi/config.toml`:
//!
//! ```toml
//! registry = "/usr/lib/grass/etc/dbmscap"
//! default_driver = "sqlite"
//! default_database = "gis"
//! default_schema = "public"
//! ```
//!
//! A missing file means defaults for everything.

use crate::error::{DbmiError, DbmiResult};
use crate::schema::Handle;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DBMI_CONFIG";

/// Environment variable naming the driver registry.
pub const REGISTRY_ENV: &str = "DBMI_REGISTRY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbmiConfig {
    /// Path to the `dbmscap` driver registry.
    pub registry: Option<PathBuf>,
    pub default_driver: Option<String>,
    pub default_database: Option<String>,
    pub default_schema: Option<String>,
}

impl DbmiConfig {
    /// Load from `$DBMI_CONFIG` or the user config directory.
    pub fn load() -> DbmiResult<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(Path::new(&path)),
            None => match Self::config_dir() {
                Some(dir) => Self::load_from(&dir.join("config.toml")),
                None => Ok(Self::default()),
            },
        }
    }

    /// Load `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> DbmiResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| DbmiError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| DbmiError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> DbmiResult<Self> {
        toml::from_str(content).map_err(|e| DbmiError::Config(e.to_string()))
    }

    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dbmi"))
    }

    /// Registry location: the config, then `$DBMI_REGISTRY`, then
    /// `<config dir>/dbmi/dbmscap`.
    pub fn registry_path(&self) -> DbmiResult<PathBuf> {
        if let Some(path) = &self.registry {
            return Ok(path.clone());
        }
        if let Some(path) = std::env::var_os(REGISTRY_ENV) {
            return Ok(PathBuf::from(path));
        }
        Self::config_dir()
            .map(|d| d.join("dbmscap"))
            .ok_or_else(|| DbmiError::Config("no driver registry configured".to_string()))
    }

    /// Handle for the configured default database, if there is one.
    pub fn default_handle(&self) -> Option<Handle> {
        let name = self.default_database.as_ref()?;
        let handle = Handle::new(name.clone());
        Some(match &self.default_schema {
            Some(schema) => handle.with_schema(schema.clone()),
            None => handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full() {
        let config = DbmiConfig::parse(
            r#"
registry = "/etc/dbmscap"
default_driver = "mem"
default_database = "gis"
default_schema = "public"
"#,
        )
        .unwrap();
        assert_eq!(config.registry_path().unwrap(), PathBuf::from("/etc/dbmscap"));
        assert_eq!(config.default_driver.as_deref(), Some("mem"));
        assert_eq!(
            config.default_handle(),
            Some(Handle::new("gis").with_schema("public"))
        );
    }

    #[test]
    fn test_defaults() {
        let config = DbmiConfig::parse("").unwrap();
        assert_eq!(config, DbmiConfig::default());
        assert_eq!(config.default_handle(), None);
        assert!(DbmiConfig::parse("registry = 5").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbmiConfig::load_from(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, DbmiConfig::default());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_driver = \"dbf\"\n").unwrap();
        let config = DbmiConfig::load_from(&path).unwrap();
        assert_eq!(config.default_driver.as_deref(), Some("dbf"));
    }
}
