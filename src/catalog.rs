//! Discovery of configuration options types.
//!
//! Rust has no runtime attribute scanning, so types announce themselves:
//! [`register_options!`](crate::register_options) submits a
//! [`TypeDescriptor`] at link time and [`InventoryCatalog`] finds it again by
//! module path. [`StaticCatalog`] is the explicit alternative for hosts that
//! want to list their types by hand.

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::markers::{ConfigOptions, OptionsMarker, ValidateMarker};
use crate::pipeline::{apply_options, BindJob, BoundOptions, PipelineError};

/// A module to scan, named by its Rust module path (`my_app::settings`).
///
/// A type belongs to a module when it was registered in that module or in
/// one nested beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleRef(Cow<'static, str>);

impl ModuleRef {
    /// A module named by a static path such as `module_path!()`.
    pub const fn new(path: &'static str) -> Self {
        Self(Cow::Borrowed(path))
    }

    /// The module path as written.
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Whether `module_path` is this module or one nested beneath it.
    pub fn contains(&self, module_path: &str) -> bool {
        match module_path.strip_prefix(self.path()) {
            Some(rest) => rest.is_empty() || rest.starts_with("::"),
            None => false,
        }
    }
}

impl From<&'static str> for ModuleRef {
    fn from(path: &'static str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ModuleRef {
    fn from(path: String) -> Self {
        Self(Cow::Owned(path))
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    #[error("'{0}' is not a valid module path")]
    InvalidModulePath(String),

    #[error("module '{0}' is not known to the catalog")]
    UnknownModule(String),
}

/// One discovered options type: its markers plus a bind function
/// monomorphized for it when the descriptor was built.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    module_path: &'static str,
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    options: OptionsMarker,
    validate: Option<ValidateMarker>,
    apply: fn(&BindJob<'_>) -> Result<BoundOptions, PipelineError>,
}

impl TypeDescriptor {
    /// Describes `T` as declared in `module_path`.
    pub const fn of<T: ConfigOptions>(module_path: &'static str) -> Self {
        Self {
            module_path,
            type_id: TypeId::of::<T>,
            type_name: std::any::type_name::<T>,
            options: T::OPTIONS,
            validate: T::VALIDATE,
            apply: apply_options::<T>,
        }
    }

    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    pub fn options_marker(&self) -> &OptionsMarker {
        &self.options
    }

    pub fn validate_marker(&self) -> Option<&ValidateMarker> {
        self.validate.as_ref()
    }

    pub(crate) fn apply(&self, job: &BindJob<'_>) -> Result<BoundOptions, PipelineError> {
        (self.apply)(job)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name())
            .field("module_path", &self.module_path)
            .field("options", &self.options)
            .field("validate", &self.validate)
            .finish()
    }
}

inventory::collect!(TypeDescriptor);

/// Enumerates the options types declared in a module.
pub trait TypeCatalog: Send + Sync + fmt::Debug {
    fn declarations(&self, module: &ModuleRef) -> Result<Vec<TypeDescriptor>, DiscoveryError>;
}

/// Catalog over every type registered with `register_options!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryCatalog;

impl TypeCatalog for InventoryCatalog {
    fn declarations(&self, module: &ModuleRef) -> Result<Vec<TypeDescriptor>, DiscoveryError> {
        if !is_module_path(module.path()) {
            return Err(DiscoveryError::InvalidModulePath(module.path().to_string()));
        }
        Ok(inventory::iter::<TypeDescriptor>
            .into_iter()
            .filter(|descriptor| module.contains(descriptor.module_path))
            .copied()
            .collect())
    }
}

fn is_module_path(path: &str) -> bool {
    !path.is_empty()
        && path.split("::").all(|segment| {
            !segment.is_empty()
                && !segment.starts_with(|c: char| c.is_ascii_digit())
                && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
        })
}

/// Catalog built by hand: module name to descriptors.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    modules: BTreeMap<ModuleRef, Vec<TypeDescriptor>>,
}

impl StaticCatalog {
    /// An empty catalog with no modules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `T` to `module`, creating the module if needed.
    #[must_use]
    pub fn with<T: ConfigOptions>(mut self, module: &'static str) -> Self {
        self.modules
            .entry(ModuleRef::new(module))
            .or_default()
            .push(TypeDescriptor::of::<T>(module));
        self
    }

    /// Declares a module, even one without any options types.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<ModuleRef>) -> Self {
        self.modules.entry(module.into()).or_default();
        self
    }
}

impl TypeCatalog for StaticCatalog {
    fn declarations(&self, module: &ModuleRef) -> Result<Vec<TypeDescriptor>, DiscoveryError> {
        self.modules
            .get(module)
            .cloned()
            .ok_or_else(|| DiscoveryError::UnknownModule(module.path().to_string()))
    }
}

/// Result of scanning a set of modules.
#[derive(Debug, Default)]
pub struct Discovery {
    pub types: Vec<TypeDescriptor>,
    pub errors: Vec<DiscoveryError>,
}

/// Scans `modules`, returning each options type once in a stable order.
///
/// Modules that cannot be scanned are collected into
/// [`Discovery::errors`]; with `fail_fast` the first one is returned instead.
pub fn discover(
    catalog: &dyn TypeCatalog,
    modules: &[ModuleRef],
    fail_fast: bool,
) -> Result<Discovery, DiscoveryError> {
    let mut discovery = Discovery::default();
    let mut seen = HashSet::new();

    for module in modules {
        match catalog.declarations(module) {
            Ok(declarations) => {
                tracing::debug!(%module, types = declarations.len(), "scanned module");
                for descriptor in declarations {
                    if seen.insert(descriptor.type_id()) {
                        discovery.types.push(descriptor);
                    }
                }
            }
            Err(error) if fail_fast => return Err(error),
            Err(error) => {
                tracing::warn!(%module, %error, "module could not be scanned");
                discovery.errors.push(error);
            }
        }
    }

    discovery
        .types
        .sort_by(|a, b| (a.module_path, a.type_name()).cmp(&(b.module_path, b.type_name())));
    Ok(discovery)
}
