//! Validators and the wiring that attaches them to registered options.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use validator::Validate;

use crate::markers::ValidatorRef;
use crate::policy::ValidationDecision;
use crate::registry::{Registry, ValidatorEntry};

/// Validates bound options of one type.
///
/// `name` is the section key the options were bound from.
pub trait ValidateOptions: Send + Sync {
    type Options: 'static;

    fn validate(&self, name: &str, options: &Self::Options) -> ValidateOptionsResult;
}

/// Outcome of a single validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateOptionsResult {
    Success,
    /// The validator did not apply to these options.
    Skip,
    Fail(Vec<String>),
}

impl ValidateOptionsResult {
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(vec![message.into()])
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail(_))
    }
}

/// Options were bound but rejected by at least one validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {options} (section '{section}'): {}", .failures.join("; "))]
pub struct ValidationFailure {
    pub options: &'static str,
    pub section: String,
    pub failures: Vec<String>,
}

/// A custom validator could not be attached to its options type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("validator {validator} validates {expected}, not {options}")]
    ValidatorTargetMismatch {
        options: &'static str,
        validator: &'static str,
        expected: &'static str,
    },
}

/// Runs the field constraints the options type declares through
/// `#[derive(Validate)]`.
pub struct AnnotationValidator<T> {
    _options: PhantomData<fn(&T)>,
}

impl<T> Default for AnnotationValidator<T> {
    fn default() -> Self {
        Self {
            _options: PhantomData,
        }
    }
}

impl<T> fmt::Debug for AnnotationValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationValidator")
            .field("options", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Validate + 'static> ValidateOptions for AnnotationValidator<T> {
    type Options = T;

    fn validate(&self, _name: &str, options: &T) -> ValidateOptionsResult {
        match options.validate() {
            Ok(()) => ValidateOptionsResult::Success,
            Err(errors) => ValidateOptionsResult::Fail(constraint_messages(&errors)),
        }
    }
}

/// One message per violated field constraint, sorted by field name.
fn constraint_messages(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, violations)| {
            violations.iter().map(move |violation| match &violation.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: failed '{}' constraint", violation.code),
            })
        })
        .collect();
    messages.sort();

    // Nested struct and list errors do not show up in `field_errors`.
    if messages.is_empty() {
        messages.push(errors.to_string());
    }
    messages
}

/// Builds the validator `decision` calls for, before anything is bound.
pub(crate) fn select_validator<T>(
    decision: &ValidationDecision,
) -> Result<Option<ValidatorEntry<T>>, PolicyError>
where
    T: Validate + Send + Sync + 'static,
{
    let options = std::any::type_name::<T>();
    let entry = match decision {
        ValidationDecision::UseCustomValidator(validator) => {
            let instance = custom_validator::<T>(validator)?;
            tracing::debug!(
                options,
                validator = validator.validator_name(),
                "wiring custom validator"
            );
            Some(ValidatorEntry::wired(validator.validator_type_id(), instance))
        }
        ValidationDecision::UseGenericAnnotationValidation => {
            tracing::debug!(options, "wiring annotation validator");
            Some(ValidatorEntry::wired(
                TypeId::of::<AnnotationValidator<T>>(),
                Arc::new(AnnotationValidator::<T>::default()),
            ))
        }
        ValidationDecision::NoValidation => {
            tracing::debug!(options, "no validation wired");
            None
        }
    };
    Ok(entry)
}

/// Registers the validator selected by `decision` for options type `T`.
///
/// The orchestrator installs validators together with the bound instance;
/// this is for hosts that bind a type themselves.
pub fn wire_validation<T>(
    registry: &Registry,
    decision: &ValidationDecision,
) -> Result<(), PolicyError>
where
    T: Validate + Send + Sync + 'static,
{
    if let Some(entry) = select_validator::<T>(decision)? {
        registry.insert_validator(entry);
    }
    Ok(())
}

fn custom_validator<T: 'static>(
    validator: &ValidatorRef,
) -> Result<Arc<dyn ValidateOptions<Options = T>>, PolicyError> {
    validator
        .instantiate::<T>()
        .ok_or_else(|| PolicyError::ValidatorTargetMismatch {
            options: std::any::type_name::<T>(),
            validator: validator.validator_name(),
            expected: validator.target_name(),
        })
}
