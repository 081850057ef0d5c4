use toml::Value;

use super::source::{ConfigEntry, ConfigSource};
use super::tree::KEY_DELIMITER;
use super::ConfigError;

/// In-memory `key:path = value` pairs.
///
/// ```
/// use dragon_options::config::{Config, MemorySource};
///
/// let tree = Config::builder()
///     .with_source(MemorySource::new([("app:id", "1"), ("app:name", "test app")]))
///     .build()?;
/// assert_eq!(tree.get_str("app:name").as_deref(), Some("test app"));
/// # Ok::<(), dragon_options::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pairs: Vec<(String, String)>,
}

impl MemorySource {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MemorySource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        self.pairs
            .iter()
            .map(|(key, value)| {
                let path: Vec<String> = key.split(KEY_DELIMITER).map(str::to_string).collect();
                if path.iter().any(|s| s.is_empty()) {
                    return Err(ConfigError::InvalidKey(key.clone()));
                }
                Ok(ConfigEntry::at_path(path, Value::String(value.clone())))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_splits_keys() {
        let source = MemorySource::new([("dev:variableName", "port")]);
        let entries = source.entries().unwrap();
        assert_eq!(
            entries[0].path,
            vec!["dev".to_string(), "variableName".to_string()]
        );
    }

    #[test]
    fn test_memory_source_rejects_empty_segment() {
        let source = MemorySource::new([("dev::name", "x")]);
        assert!(matches!(source.entries(), Err(ConfigError::InvalidKey(k)) if k == "dev::name"));
    }
}
