//! Registry of bound options instances and their validators.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use thiserror::Error;

use crate::markers::simple_type_name;
use crate::validation::{ValidateOptions, ValidateOptionsResult, ValidationFailure};

/// Errors returned by [`Registry::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("no options registered for {0}")]
    NotRegistered(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A validator attached to options of type `T`.
pub(crate) struct ValidatorEntry<T> {
    id: TypeId,
    validator: Arc<dyn ValidateOptions<Options = T>>,
    /// Installed by the configuration pipeline rather than by the host.
    wired: bool,
}

impl<T> ValidatorEntry<T> {
    pub(crate) fn wired(id: TypeId, validator: Arc<dyn ValidateOptions<Options = T>>) -> Self {
        Self {
            id,
            validator,
            wired: true,
        }
    }
}

impl<T> Clone for ValidatorEntry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            validator: Arc::clone(&self.validator),
            wired: self.wired,
        }
    }
}

/// Everything registered for one options type.
///
/// Slots are never mutated once shared: every registration builds a new slot
/// and swaps it in, so a resolve that already holds the old one is unaffected.
/// A slot rebuilt only to change validators shares the instance cell of the
/// one it replaces.
struct Slot<T> {
    section: String,
    factory: Option<Factory<T>>,
    instance: Arc<OnceLock<Arc<T>>>,
    validators: Vec<ValidatorEntry<T>>,
    outcome: OnceLock<Result<(), ValidationFailure>>,
}

impl<T: Send + Sync + 'static> Slot<T> {
    fn empty(section: String) -> Self {
        Self {
            section,
            factory: None,
            instance: Arc::new(OnceLock::new()),
            validators: Vec::new(),
            outcome: OnceLock::new(),
        }
    }

    /// A copy sharing the instance and validators, with validation pending.
    fn revalidated(&self) -> Self {
        Self {
            section: self.section.clone(),
            factory: self.factory.clone(),
            instance: Arc::clone(&self.instance),
            validators: self.validators.clone(),
            outcome: OnceLock::new(),
        }
    }

    fn is_bound(&self) -> bool {
        self.factory.is_some() || self.instance.get().is_some()
    }

    fn validate(&self, options: &T) -> Result<(), ValidationFailure> {
        let failures: Vec<String> = self
            .validators
            .iter()
            .filter_map(|entry| match entry.validator.validate(&self.section, options) {
                ValidateOptionsResult::Fail(messages) => Some(messages),
                ValidateOptionsResult::Success | ValidateOptionsResult::Skip => None,
            })
            .flatten()
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure {
                options: simple_type_name(std::any::type_name::<T>()),
                section: self.section.clone(),
                failures,
            })
        }
    }
}

struct Entry {
    type_name: &'static str,
    bound: bool,
    slot: Arc<dyn Any + Send + Sync>,
}

/// Type-keyed store of options instances, consulted by consumers through
/// [`resolve`](Self::resolve).
///
/// A factory runs at most once per instance or factory registration; adding
/// validators keeps the instance already created. Validators run on the first
/// resolve after the latest registration for the type; the outcome is cached
/// until the next one.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<TypeId, Entry>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ready-made instance bound from `section`.
    pub fn register_instance<T>(&self, section: impl Into<String>, options: T)
    where
        T: Send + Sync + 'static,
    {
        let section = section.into();
        tracing::debug!(
            options = std::any::type_name::<T>(),
            %section,
            "registering options instance"
        );
        self.update::<T>(|current| {
            let mut slot = Slot::empty(section);
            slot.validators = current.map(|c| c.validators.clone()).unwrap_or_default();
            let _ = slot.instance.set(Arc::new(options));
            slot
        });
    }

    /// Registers a factory producing the instance on first resolve.
    pub fn register_factory<T, F>(&self, section: impl Into<String>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let section = section.into();
        tracing::debug!(
            options = std::any::type_name::<T>(),
            %section,
            "registering options factory"
        );
        self.update::<T>(|current| {
            let mut slot = Slot::empty(section);
            slot.validators = current.map(|c| c.validators.clone()).unwrap_or_default();
            slot.factory = Some(Arc::new(factory));
            slot
        });
    }

    /// Adds a validator for `V::Options`. Registering the same validator
    /// type again replaces the earlier one.
    pub fn register_validator<V>(&self, validator: V)
    where
        V: ValidateOptions + 'static,
        V::Options: Send + Sync,
    {
        self.insert_validator(ValidatorEntry {
            id: TypeId::of::<V>(),
            validator: Arc::new(validator),
            wired: false,
        });
    }

    pub(crate) fn insert_validator<T>(&self, entry: ValidatorEntry<T>)
    where
        T: Send + Sync + 'static,
    {
        self.update::<T>(|current| {
            let mut slot = match current {
                Some(current) => current.revalidated(),
                None => Slot::empty(simple_type_name(std::any::type_name::<T>()).to_string()),
            };
            slot.validators.retain(|existing| existing.id != entry.id);
            slot.validators.push(entry);
            slot
        });
    }

    /// Replaces the instance and every pipeline-wired validator of `T` in one
    /// step. Validators the host registered itself are kept unless `wired`
    /// holds one of the same type.
    pub(crate) fn install<T>(
        &self,
        section: String,
        options: T,
        wired: Option<ValidatorEntry<T>>,
    ) where
        T: Send + Sync + 'static,
    {
        self.update::<T>(|current| {
            let mut slot = Slot::empty(section);
            let mut validators: Vec<ValidatorEntry<T>> = current
                .map(|c| c.validators.iter().filter(|v| !v.wired).cloned().collect())
                .unwrap_or_default();
            if let Some(entry) = wired {
                validators.retain(|existing| existing.id != entry.id);
                validators.push(entry);
            }
            slot.validators = validators;
            let _ = slot.instance.set(Arc::new(options));
            slot
        });
    }

    fn update<T>(&self, build: impl FnOnce(Option<&Slot<T>>) -> Slot<T>)
    where
        T: Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        let current = entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.slot.downcast_ref::<Slot<T>>());
        let slot = build(current);
        entries.insert(
            TypeId::of::<T>(),
            Entry {
                type_name: std::any::type_name::<T>(),
                bound: slot.is_bound(),
                slot: Arc::new(slot),
            },
        );
    }

    /// Returns the instance of `T`, running its validators on first use.
    pub fn resolve<T>(&self) -> Result<Arc<T>, ResolveError>
    where
        T: Send + Sync + 'static,
    {
        let not_registered = || ResolveError::NotRegistered(std::any::type_name::<T>());
        let slot = self
            .entries
            .read()
            .get(&TypeId::of::<T>())
            .map(|entry| Arc::clone(&entry.slot))
            .ok_or_else(not_registered)?;
        let slot = slot.downcast::<Slot<T>>().map_err(|_| not_registered())?;

        let instance = match (slot.instance.get(), &slot.factory) {
            (Some(instance), _) => Arc::clone(instance),
            (None, Some(factory)) => {
                Arc::clone(slot.instance.get_or_init(|| Arc::new(factory())))
            }
            (None, None) => return Err(not_registered()),
        };

        slot.outcome.get_or_init(|| slot.validate(&instance)).clone()?;
        Ok(instance)
    }

    /// Whether an instance or factory is registered for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries
            .read()
            .get(&TypeId::of::<T>())
            .is_some_and(|entry| entry.bound)
    }

    /// Number of validators attached to `T`.
    pub fn validator_count<T: Send + Sync + 'static>(&self) -> usize {
        self.entries
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.slot.downcast_ref::<Slot<T>>())
            .map_or(0, |slot| slot.validators.len())
    }

    /// Removes everything registered for `T`.
    pub fn remove<T: 'static>(&self) -> bool {
        self.entries.write().remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        let mut names: Vec<_> = entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("types", &names).finish()
    }
}
