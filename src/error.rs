use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::PipelineReport;
use crate::registry::ResolveError;

/// Top-level error type for the dragon-options library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("annotated configuration failed: {0}")]
    Pipeline(#[from] PipelineReport),

    #[error("could not resolve options: {0}")]
    Resolve(#[from] ResolveError),
}
