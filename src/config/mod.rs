//! Hierarchical configuration tree and the sources it is loaded from.
//!
//! Sources are layered by [`Config`] into a single [`ConfigTree`], which is
//! what the options pipeline reads sections from.

mod builder;
mod env;
mod error;
mod file;
mod memory;
mod source;
mod tree;

pub use builder::Config;
pub use env::EnvSource;
pub use error::ConfigError;
pub use file::FileSource;
pub use memory::MemorySource;
pub use source::{ConfigEntry, ConfigSource};
pub use tree::{ConfigTree, KEY_DELIMITER};
pub(crate) use tree::{keys_match, scalar_text};
