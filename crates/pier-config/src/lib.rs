//! Process configuration, read from a TOML file at startup.
//!
//! ```toml
//! digests = ["sha256"]
//! ignore = [".staging"]
//!
//! [refresh]
//! interval_secs = 300
//! watch = true
//! quiet_period_secs = 10
//!
//! [[index]]
//! name = ""
//! path = "packages"
//!
//! [[index]]
//! name = "mirror"
//! url = "https://pypi.example/simple"
//! ```
//!
//! Parsing and validation are separate steps: [`Config::load`] runs both, so
//! a config that deserializes but names no indexes (or two sources for one
//! index) still fails before the engine starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pier_digest::DigestAlgorithm;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("config names no indexes")]
    NoIndexes,

    #[error("duplicate index name {name:?}")]
    DuplicateIndex { name: String },

    #[error("index {name:?} names neither a path nor a url")]
    SourceMissing { name: String },

    #[error("index {name:?} names both a path and a url")]
    SourceAmbiguous { name: String },

    #[error("unknown digest algorithm {name:?}")]
    UnknownAlgorithm { name: String },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Periodic rescan interval; omit to disable polling.
    #[serde(default)]
    pub interval_secs: Option<u64>,

    /// Watch local sources for changes.
    #[serde(default = "default_watch")]
    pub watch: bool,

    /// Quiet period after a change burst before rebuilding.
    #[serde(default = "default_quiet_period_secs")]
    pub quiet_period_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            watch: default_watch(),
            quiet_period_secs: default_quiet_period_secs(),
        }
    }
}

/// One configured index: a mount name plus exactly one backing source.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Mount name; the empty string mounts the source at the root.
    #[serde(default)]
    pub name: String,

    /// Local directory tree of distribution files.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Base URL of an upstream simple index.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Digest algorithms computed for local artifacts.
    #[serde(default = "default_digests")]
    pub digests: Vec<String>,

    /// Open local archives to extract embedded metadata.
    #[serde(default = "default_extract_metadata")]
    pub extract_metadata: bool,

    /// Root-relative directories excluded from local scans.
    #[serde(default)]
    pub ignore: Vec<PathBuf>,

    #[serde(default, rename = "index")]
    pub indexes: Vec<IndexConfig>,
}

impl Config {
    /// Read, parse, and validate a config file. Relative index paths are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        tracing::debug!(
            target = "pier.config",
            path = %path.display(),
            indexes = config.indexes.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Parse and validate from TOML text without touching the filesystem.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|err| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexes.is_empty() {
            return Err(ConfigError::NoIndexes);
        }
        let mut names: Vec<&str> = self.indexes.iter().map(|i| i.name.as_str()).collect();
        names.sort_unstable();
        if let Some(duplicate) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::DuplicateIndex {
                name: duplicate[0].to_string(),
            });
        }
        for index in &self.indexes {
            match (&index.path, &index.url) {
                (None, None) => {
                    return Err(ConfigError::SourceMissing {
                        name: index.name.clone(),
                    })
                }
                (Some(_), Some(_)) => {
                    return Err(ConfigError::SourceAmbiguous {
                        name: index.name.clone(),
                    })
                }
                _ => {}
            }
        }
        self.algorithms()?;
        Ok(())
    }

    /// The configured digest algorithms, parsed.
    pub fn algorithms(&self) -> Result<Vec<DigestAlgorithm>, ConfigError> {
        self.digests
            .iter()
            .map(|name| {
                name.parse()
                    .map_err(|_| ConfigError::UnknownAlgorithm { name: name.clone() })
            })
            .collect()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.refresh.interval_secs.map(Duration::from_secs)
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_secs(self.refresh.quiet_period_secs)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for index in &mut self.indexes {
            if let Some(path) = &index.path {
                if path.is_relative() {
                    index.path = Some(base.join(path));
                }
            }
        }
    }
}

fn default_watch() -> bool {
    true
}

fn default_quiet_period_secs() -> u64 {
    10
}

fn default_digests() -> Vec<String> {
    vec!["sha256".to_string()]
}

fn default_extract_metadata() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_toml(
            r#"
            [[index]]
            path = "/srv/packages"
            "#,
        )
        .unwrap();
        assert_eq!(config.refresh, RefreshConfig::default());
        assert!(config.refresh.watch);
        assert_eq!(config.quiet_period(), Duration::from_secs(10));
        assert_eq!(config.interval(), None);
        assert_eq!(config.algorithms().unwrap(), [DigestAlgorithm::Sha256]);
        assert!(config.extract_metadata);
        assert_eq!(config.indexes[0].name, "");
    }

    #[test]
    fn full_config_round_trips() {
        let config = Config::from_toml(
            r#"
            digests = ["sha256"]
            extract_metadata = false
            ignore = [".staging"]

            [refresh]
            interval_secs = 300
            watch = false
            quiet_period_secs = 2

            [[index]]
            name = ""
            path = "/srv/packages"

            [[index]]
            name = "mirror"
            url = "https://pypi.example/simple"
            "#,
        )
        .unwrap();
        assert_eq!(config.interval(), Some(Duration::from_secs(300)));
        assert!(!config.refresh.watch);
        assert_eq!(config.indexes.len(), 2);
        assert_eq!(
            config.indexes[1].url.as_deref(),
            Some("https://pypi.example/simple")
        );
        assert_eq!(config.ignore, [PathBuf::from(".staging")]);
    }

    #[test]
    fn empty_index_set_is_rejected() {
        assert!(matches!(
            Config::from_toml("digests = [\"sha256\"]"),
            Err(ConfigError::NoIndexes)
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Config::from_toml(
            r#"
            [[index]]
            name = "a"
            path = "/one"

            [[index]]
            name = "a"
            path = "/two"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateIndex { name } if name == "a"));
    }

    #[test]
    fn an_index_needs_exactly_one_source() {
        assert!(matches!(
            Config::from_toml("[[index]]\nname = \"x\""),
            Err(ConfigError::SourceMissing { .. })
        ));
        assert!(matches!(
            Config::from_toml(
                "[[index]]\nname = \"x\"\npath = \"/p\"\nurl = \"https://u\""
            ),
            Err(ConfigError::SourceAmbiguous { .. })
        ));
    }

    #[test]
    fn unknown_algorithms_are_rejected() {
        let err = Config::from_toml(
            r#"
            digests = ["md5"]

            [[index]]
            path = "/srv"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAlgorithm { name } if name == "md5"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::from_toml("not_a_key = 1"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn load_resolves_relative_paths_against_the_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pier.toml");
        std::fs::write(&path, "[[index]]\npath = \"packages\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.indexes[0].path.as_deref(),
            Some(dir.path().join("packages").as_path())
        );
    }

    #[test]
    fn missing_file_is_a_typed_error() {
        let err = Config::load(Path::new("/no/such/pier.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
