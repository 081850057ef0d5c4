//! Declarative markers attached to configuration options types.
//!
//! A type opts in by implementing [`ConfigOptions`](crate::ConfigOptions),
//! whose associated constants carry one [`OptionsMarker`] and at most one
//! [`ValidateMarker`].

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use validator::Validate;

use crate::binder::Bindable;
use crate::validation::ValidateOptions;

/// A configuration options type.
///
/// ```
/// use dragon_options::binder::{Bindable, MemberSet};
/// use dragon_options::{ConfigOptions, OptionsMarker, ValidateMarker};
/// use validator::Validate;
///
/// #[derive(Debug, Default, Validate)]
/// struct ServerOptions {
///     #[validate(range(min = 1))]
///     port: u16,
/// }
///
/// impl Bindable for ServerOptions {
///     fn members(members: &mut MemberSet<Self>) {
///         members.public("port", |o| &mut o.port);
///     }
/// }
///
/// impl ConfigOptions for ServerOptions {
///     const OPTIONS: OptionsMarker = OptionsMarker::section("server");
///     const VALIDATE: Option<ValidateMarker> = Some(ValidateMarker::new());
/// }
/// ```
pub trait ConfigOptions: Bindable + Validate + Default + Send + Sync {
    const OPTIONS: OptionsMarker;

    const VALIDATE: Option<ValidateMarker> = None;
}

/// Marks a type as a configuration options type.
///
/// ```
/// use dragon_options::OptionsMarker;
///
/// const APP: OptionsMarker = OptionsMarker::section("app")
///     .bind_non_public(true)
///     .throw_on_unknown_keys(true);
/// assert_eq!(APP.section_key, "app");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionsMarker {
    /// Section to bind from. Empty means "use the type's simple name".
    pub section_key: &'static str,
    /// Whether members declared non-public are bound.
    pub bind_non_public: bool,
    /// Whether keys without an eligible member are an error.
    pub throw_on_unknown_keys: bool,
}

impl OptionsMarker {
    /// A marker with an empty section key and both flags off.
    pub const fn new() -> Self {
        Self::section("")
    }

    /// A marker binding from `section_key`, both flags off.
    pub const fn section(section_key: &'static str) -> Self {
        Self {
            section_key,
            bind_non_public: false,
            throw_on_unknown_keys: false,
        }
    }

    /// Sets whether non-public members are bound.
    pub const fn bind_non_public(mut self, bind_non_public: bool) -> Self {
        self.bind_non_public = bind_non_public;
        self
    }

    /// Sets whether unmatched keys fail binding.
    pub const fn throw_on_unknown_keys(mut self, throw_on_unknown_keys: bool) -> Self {
        self.throw_on_unknown_keys = throw_on_unknown_keys;
        self
    }

    /// Resolves the section key, falling back to the simple name of
    /// `type_name` when the declared key is blank.
    pub fn resolve_section_key(&self, type_name: &str) -> String {
        if self.section_key.trim().is_empty() {
            simple_type_name(type_name).to_string()
        } else {
            self.section_key.to_string()
        }
    }
}

/// Marks a type as requiring validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidateMarker {
    /// Validator to use instead of the type's own field constraints.
    pub custom_validator: Option<ValidatorRef>,
}

impl ValidateMarker {
    /// Validate with the type's own field constraints.
    pub const fn new() -> Self {
        Self {
            custom_validator: None,
        }
    }

    /// Validate with `validator` instead of the field constraints.
    pub const fn with_validator(validator: ValidatorRef) -> Self {
        Self {
            custom_validator: Some(validator),
        }
    }
}

/// A reference to a validator type, resolved at wiring time.
///
/// Records which options type the validator checks, so attaching it to a
/// different options type is caught before anything is registered.
#[derive(Clone, Copy)]
pub struct ValidatorRef {
    validator_type: fn() -> TypeId,
    validator_name: fn() -> &'static str,
    target_type: fn() -> TypeId,
    target_name: fn() -> &'static str,
    build: fn() -> Box<dyn Any + Send + Sync>,
}

impl ValidatorRef {
    /// References validator `V`, built with `V::default()` when wired.
    pub const fn of<V>() -> Self
    where
        V: ValidateOptions + Default + 'static,
    {
        Self {
            validator_type: TypeId::of::<V>,
            validator_name: std::any::type_name::<V>,
            target_type: TypeId::of::<V::Options>,
            target_name: std::any::type_name::<V::Options>,
            build: build_validator::<V>,
        }
    }

    /// The validator's own type.
    pub fn validator_type_id(&self) -> TypeId {
        (self.validator_type)()
    }

    pub fn validator_name(&self) -> &'static str {
        (self.validator_name)()
    }

    /// The options type the validator checks.
    pub fn target_type_id(&self) -> TypeId {
        (self.target_type)()
    }

    pub fn target_name(&self) -> &'static str {
        (self.target_name)()
    }

    /// Whether the referenced validator checks options of type `T`.
    pub fn validates<T: 'static>(&self) -> bool {
        self.target_type_id() == TypeId::of::<T>()
    }

    /// Builds the validator as a trait object for `T`, or `None` when it
    /// validates some other type.
    pub fn instantiate<T: 'static>(&self) -> Option<Arc<dyn ValidateOptions<Options = T>>> {
        if !self.validates::<T>() {
            return None;
        }
        (self.build)()
            .downcast::<Arc<dyn ValidateOptions<Options = T>>>()
            .ok()
            .map(|boxed| *boxed)
    }
}

fn build_validator<V>() -> Box<dyn Any + Send + Sync>
where
    V: ValidateOptions + Default + 'static,
{
    let validator: Arc<dyn ValidateOptions<Options = V::Options>> = Arc::new(V::default());
    Box::new(validator)
}

impl fmt::Debug for ValidatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRef")
            .field("validator", &self.validator_name())
            .field("target", &self.target_name())
            .finish()
    }
}

impl PartialEq for ValidatorRef {
    fn eq(&self, other: &Self) -> bool {
        self.validator_type_id() == other.validator_type_id()
    }
}

impl Eq for ValidatorRef {}

/// `my_crate::settings::AppOptions<u8>` -> `AppOptions`.
pub(crate) fn simple_type_name(type_name: &str) -> &str {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}
