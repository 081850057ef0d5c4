use std::path::{Path, PathBuf};

use toml::{Table, Value};

use super::source::{ConfigEntry, ConfigSource};
use super::tree::KEY_DELIMITER;
use super::ConfigError;

/// A TOML file, loaded at the root of the tree or mounted under a section.
///
/// A missing required file is an error; a missing optional file contributes
/// nothing.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
    section: Option<String>,
}

impl FileSource {
    /// A source for the file at `path`, mounted at the root.
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required,
            section: None,
        }
    }

    /// A file that must exist.
    pub fn required(path: impl AsRef<Path>) -> Self {
        Self::new(path, true)
    }

    /// A file that is skipped when missing.
    pub fn optional(path: impl AsRef<Path>) -> Self {
        Self::new(path, false)
    }

    /// Mounts the file's tables under `section_key` (`"services:billing"`),
    /// so a per-component file need not repeat its own section header.
    pub fn under(mut self, section_key: impl Into<String>) -> Self {
        self.section = Some(section_key.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Table>, ConfigError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.required => {
                tracing::debug!(
                    path = %self.path.display(),
                    "optional config file missing, skipping"
                );
                return Ok(None);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(ConfigError::ReadError {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        toml::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::ParseError {
                path: self.path.clone(),
                source,
            })
    }

    fn mount_path(&self) -> Result<Vec<String>, ConfigError> {
        let Some(section) = self.section.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(Vec::new());
        };
        section
            .split(KEY_DELIMITER)
            .map(|segment| match segment.trim() {
                "" => Err(ConfigError::InvalidKey(section.to_string())),
                segment => Ok(segment.to_string()),
            })
            .collect()
    }
}

impl ConfigSource for FileSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        let mount = self.mount_path()?;
        Ok(self
            .read()?
            .map(|table| ConfigEntry::at_path(mount, Value::Table(table)))
            .into_iter()
            .collect())
    }
}
