use std::fmt;

use thiserror::Error;

/// The shape a member expects to find in the configuration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Boolean,
    String,
    Path,
    Sequence,
    Map,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "an integer",
            Self::Float => "a number",
            Self::Boolean => "a boolean",
            Self::String => "a string",
            Self::Path => "a path",
            Self::Sequence => "a sequence",
            Self::Map => "a map",
            Self::Object => "an object",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BindingError {
    #[error("cannot bind '{path}' to member '{member}': expected {expected}, found {found}")]
    Coercion {
        path: String,
        member: String,
        expected: ValueKind,
        found: String,
    },

    #[error("'{path}' does not match any bindable member of {options}")]
    UnknownKey {
        path: String,
        key: String,
        options: &'static str,
    },
}

impl BindingError {
    /// Full key path of the offending value, `:`-separated.
    pub fn path(&self) -> &str {
        match self {
            Self::Coercion { path, .. } | Self::UnknownKey { path, .. } => path,
        }
    }
}

/// Every member failure from one binding pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingErrors {
    errors: Vec<BindingError>,
}

impl BindingErrors {
    pub(crate) fn new(errors: Vec<BindingError>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BindingError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<BindingError> {
        self.errors
    }
}

impl fmt::Display for BindingErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [single] => write!(f, "{single}"),
            errors => {
                write!(f, "{} binding errors", errors.len())?;
                for error in errors {
                    write!(f, "; {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BindingErrors {}

impl<'a> IntoIterator for &'a BindingErrors {
    type Item = &'a BindingError;
    type IntoIter = std::slice::Iter<'a, BindingError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
