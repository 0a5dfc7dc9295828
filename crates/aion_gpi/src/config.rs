//! Adapter configuration.
//!
//! Configuration comes from a TOML file, from the process environment, or
//! both, with the environment taking precedence:
//!
//! ```toml
//! log_level = "debug"
//! args = ["+seed=3"]
//!
//! [[extra]]
//! library = "libmy_backend.so"
//! entry = "my_entry"
//! ```
//!
//! | variable        | meaning                                            |
//! |-----------------|----------------------------------------------------|
//! | `GPI_EXTRA`     | comma-separated `path[:entry]` libraries to load   |
//! | `GPI_LOG_LEVEL` | `tracing` filter directive (default `info`)        |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable listing extra libraries.
pub const GPI_EXTRA: &str = "GPI_EXTRA";

/// Environment variable holding the log filter.
pub const GPI_LOG_LEVEL: &str = "GPI_LOG_LEVEL";

/// Entry symbol called in an extra library when none is named.
pub const DEFAULT_ENTRY: &str = "gpi_entry_point";

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

/// One extra shared library to load at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraEntry {
    /// Path of the shared library.
    pub library: PathBuf,
    /// Symbol to call after loading.
    #[serde(default = "default_entry")]
    pub entry: String,
}

fn default_entry() -> String {
    DEFAULT_ENTRY.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ExtraEntry {
    /// Creates an entry that calls the default entry symbol.
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            entry: default_entry(),
        }
    }

    /// Parses `path[:entry]`.
    ///
    /// A colon followed by a path separator (as in `C:\lib.dll`) is part of
    /// the path, not an entry delimiter.
    pub fn parse(item: &str) -> Result<Self, ConfigError> {
        let item = item.trim();
        let (library, entry) = match item.rsplit_once(':') {
            Some((lib, entry)) if !entry.contains(['/', '\\']) => (lib, entry.to_string()),
            _ => (item, default_entry()),
        };
        let parsed = Self {
            library: PathBuf::from(library),
            entry,
        };
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.library.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "extra library path is empty".to_string(),
            ));
        }
        if self.entry.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "extra library '{}' has an empty entry name",
                self.library.display()
            )));
        }
        Ok(())
    }
}

/// Parses a `GPI_EXTRA`-style list. Empty items are ignored.
pub fn parse_extra_list(list: &str) -> Result<Vec<ExtraEntry>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ExtraEntry::parse)
        .collect()
}

/// Adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpiConfig {
    /// Extra libraries, loaded in order.
    pub extra: Vec<ExtraEntry>,
    /// `tracing` filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Arguments passed to the host environment.
    pub args: Vec<String>,
}

impl Default for GpiConfig {
    fn default() -> Self {
        Self {
            extra: Vec::new(),
            log_level: default_log_level(),
            args: Vec::new(),
        }
    }
}

impl GpiConfig {
    /// Builds a configuration from the process environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Layers the process environment over `self`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Layers values from `lookup` over `self`, using the environment
    /// variable names as keys. `GPI_EXTRA` replaces the library list.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup(GPI_EXTRA) {
            self.extra = parse_extra_list(&list)?;
        }
        if let Some(level) = lookup(GPI_LOG_LEVEL) {
            if !level.trim().is_empty() {
                self.log_level = level.trim().to_string();
            }
        }
        validate_config(&self)?;
        Ok(self)
    }
}

/// Loads and validates a configuration file.
pub fn load_config(path: &Path) -> Result<GpiConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a TOML string.
pub fn load_config_from_str(content: &str) -> Result<GpiConfig, ConfigError> {
    let config: GpiConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &GpiConfig) -> Result<(), ConfigError> {
    for entry in &config.extra {
        entry.validate()?;
    }
    if config.log_level.trim().is_empty() {
        return Err(ConfigError::ValidationError("log_level is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_entry_with_symbol() {
        let e = ExtraEntry::parse("libfoo.so:foo_init").unwrap();
        assert_eq!(e.library, PathBuf::from("libfoo.so"));
        assert_eq!(e.entry, "foo_init");
    }

    #[test]
    fn parse_entry_default_symbol() {
        let e = ExtraEntry::parse("/opt/lib/libfoo.so").unwrap();
        assert_eq!(e.entry, DEFAULT_ENTRY);
    }

    #[test]
    fn drive_letter_is_part_of_path() {
        let e = ExtraEntry::parse(r"C:\libs\foo.dll").unwrap();
        assert_eq!(e.library, PathBuf::from(r"C:\libs\foo.dll"));
        assert_eq!(e.entry, DEFAULT_ENTRY);
    }

    #[test]
    fn empty_parts_rejected() {
        assert!(matches!(
            ExtraEntry::parse("libfoo.so:"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            ExtraEntry::parse(":entry"),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn extra_list_skips_blanks() {
        let list = parse_extra_list("a.so, b.so:go ,,").unwrap();
        assert_eq!(list, vec![ExtraEntry::new("a.so"), ExtraEntry {
            library: "b.so".into(),
            entry: "go".into()
        }]);
    }

    #[test]
    fn parse_file_config() {
        let toml = r#"
log_level = "debug"
args = ["+seed=3"]

[[extra]]
library = "libx.so"

[[extra]]
library = "liby.so"
entry = "y_init"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.args, vec!["+seed=3"]);
        assert_eq!(config.extra[0].entry, DEFAULT_ENTRY);
        assert_eq!(config.extra[1].entry, "y_init");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, GpiConfig::default());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        assert!(matches!(
            load_config_from_str("log_level = "),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn empty_library_in_file_rejected() {
        let toml = "[[extra]]\nlibrary = \"\"\n";
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn environment_overrides_file() {
        let config = load_config_from_str("log_level = \"warn\"\n[[extra]]\nlibrary = \"file.so\"\n")
            .unwrap()
            .with_overrides(vars(&[
                (GPI_EXTRA, "env.so:start"),
                (GPI_LOG_LEVEL, "trace"),
            ]))
            .unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.extra.len(), 1);
        assert_eq!(config.extra[0].library, PathBuf::from("env.so"));
    }

    #[test]
    fn absent_variables_keep_values() {
        let config = GpiConfig::default().with_overrides(vars(&[])).unwrap();
        assert_eq!(config, GpiConfig::default());
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "args = [\"a\", \"b\"]").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.args, vec!["a", "b"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(&dir.path().join("gpi.toml")),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn display_validation_error() {
        let err = ConfigError::ValidationError("log_level is empty".to_string());
        assert_eq!(format!("{err}"), "validation error: log_level is empty");
    }
}
