//! Binds sections of a layered configuration tree onto typed options and
//! wires their validation.
//!
//! An options type implements [`ConfigOptions`] and registers itself with
//! [`register_options!`]. [`apply_annotated_configuration`] then finds every
//! such type in the given modules, binds it from its section and registers it,
//! together with its validator, in a [`Registry`]:
//!
//! ```
//! use dragon_options::binder::{Bindable, MemberSet};
//! use dragon_options::config::Config;
//! use dragon_options::{
//!     apply_annotated_configuration, register_options, ConfigOptions, ModuleRef, OptionsMarker,
//!     Registry,
//! };
//! use validator::Validate;
//!
//! #[derive(Debug, Default, Validate)]
//! struct AppOptions {
//!     id: i32,
//!     #[validate(length(min = 1))]
//!     name: String,
//! }
//!
//! impl Bindable for AppOptions {
//!     fn members(members: &mut MemberSet<Self>) {
//!         members.public("id", |o| &mut o.id).public("name", |o| &mut o.name);
//!     }
//! }
//!
//! impl ConfigOptions for AppOptions {
//!     const OPTIONS: OptionsMarker = OptionsMarker::section("app");
//! }
//!
//! register_options!(AppOptions);
//!
//! # fn main() -> Result<(), dragon_options::Error> {
//! let tree = Config::builder()
//!     .with_pairs([("app:id", "1"), ("app:name", "test app")])
//!     .build()?;
//!
//! let registry = Registry::new();
//! apply_annotated_configuration(&registry, &tree, &[ModuleRef::new(module_path!())])?;
//!
//! let app = registry.resolve::<AppOptions>()?;
//! assert_eq!(app.id, 1);
//! assert_eq!(app.name, "test app");
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod catalog;
pub mod config;
mod error;
pub mod markers;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod validation;

pub use catalog::{ModuleRef, TypeDescriptor};
pub use config::{Config, ConfigError, ConfigTree};
pub use error::Error;
pub use markers::{ConfigOptions, OptionsMarker, ValidateMarker, ValidatorRef};
pub use pipeline::{apply_annotated_configuration, AnnotatedConfiguration, PipelineReport};
pub use registry::{Registry, ResolveError};
pub use validation::{ValidateOptions, ValidateOptionsResult, ValidationFailure};

#[doc(hidden)]
pub mod __private {
    pub use inventory;
}

/// Registers options types for discovery by the default catalog.
///
/// Each type is recorded under the module the macro is invoked in, so call it
/// next to the type definitions.
#[macro_export]
macro_rules! register_options {
    ($($options:ty),+ $(,)?) => {
        $(
            $crate::__private::inventory::submit! {
                $crate::TypeDescriptor::of::<$options>(::core::module_path!())
            }
        )+
    };
}
