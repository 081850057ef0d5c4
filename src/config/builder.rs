use std::path::Path;

use toml::Table;

use super::source::{merge_at_path, ConfigSource};
use super::{ConfigError, ConfigTree, EnvSource, FileSource, MemorySource};

/// Builder for layering configuration sources into a [`ConfigTree`].
///
/// Sources are merged in registration order, with later sources overriding
/// earlier ones. Nested tables are merged recursively; other values
/// (including arrays) are replaced entirely.
///
/// ## Example
///
/// ```no_run
/// use dragon_options::config::Config;
///
/// // defaults -> env overrides -> local file overrides env
/// let tree = Config::builder()
///     .with_file("config/default.toml", true)
///     .with_env("MYAPP", "__")
///     .with_file("config/local.toml", false)
///     .build()?;
///
/// let app = tree.subtree("app");
/// # Ok::<(), dragon_options::config::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct Config {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a TOML file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(self, path: impl AsRef<Path>, required: bool) -> Self {
        self.with_source(FileSource::new(path, required))
    }

    /// Loads configuration from environment variables with the given prefix.
    ///
    /// See [`EnvSource`] for how variable names map onto keys.
    pub fn with_env(self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix, separator))
    }

    /// Adds in-memory `key:path = value` pairs.
    pub fn with_pairs<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_source(MemorySource::new(pairs))
    }

    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Loads and merges every source into one tree.
    pub fn build(self) -> Result<ConfigTree, ConfigError> {
        let mut merged = Table::new();

        for source in &self.sources {
            let entries = source.entries()?;
            tracing::debug!(?source, entries = entries.len(), "merging configuration source");
            for entry in entries {
                merge_at_path(&mut merged, &entry.path, entry.value);
            }
        }

        Ok(ConfigTree::from_table(merged))
    }
}
