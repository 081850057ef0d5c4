//! Per-type binding policy and validation activation.

use crate::markers::{OptionsMarker, ValidateMarker, ValidatorRef};

/// How one type's section is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindingPolicy {
    pub bind_non_public: bool,
    pub throw_on_unknown_keys: bool,
}

/// Which validator, if any, guards a type's bound instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationDecision {
    UseCustomValidator(ValidatorRef),
    UseGenericAnnotationValidation,
    NoValidation,
}

/// Everything the pipeline knows about one options type for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingContext {
    options: OptionsMarker,
    validate: Option<ValidateMarker>,
    global_annotation: bool,
}

impl BindingContext {
    pub fn new(
        options: OptionsMarker,
        validate: Option<ValidateMarker>,
        global_annotation: bool,
    ) -> Self {
        Self {
            options,
            validate,
            global_annotation,
        }
    }

    pub fn options_marker(&self) -> &OptionsMarker {
        &self.options
    }

    pub fn validate_marker(&self) -> Option<&ValidateMarker> {
        self.validate.as_ref()
    }

    pub fn global_annotation(&self) -> bool {
        self.global_annotation
    }

    /// Binding policy from the options marker alone. The global annotation
    /// flag never widens it.
    pub fn policy(&self) -> BindingPolicy {
        BindingPolicy {
            bind_non_public: self.options.bind_non_public,
            throw_on_unknown_keys: self.options.throw_on_unknown_keys,
        }
    }

    /// An explicit custom validator wins; otherwise either a validate marker
    /// or the global flag turns on annotation validation.
    pub fn validation_decision(&self) -> ValidationDecision {
        if let Some(validator) = self.validate.and_then(|v| v.custom_validator) {
            return ValidationDecision::UseCustomValidator(validator);
        }
        if self.global_annotation || self.validate.is_some() {
            ValidationDecision::UseGenericAnnotationValidation
        } else {
            ValidationDecision::NoValidation
        }
    }

    pub fn section_key(&self, type_name: &str) -> String {
        self.options.resolve_section_key(type_name)
    }
}
