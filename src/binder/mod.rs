//! Binding a configuration section onto an options instance.
//!
//! A type describes its bindable members once, in [`Bindable::members`]:
//!
//! ```
//! use dragon_options::binder::{bind_section, Bindable, MemberSet};
//! use dragon_options::config::Config;
//! use dragon_options::policy::BindingPolicy;
//!
//! #[derive(Default)]
//! struct AppOptions {
//!     id: i32,
//!     name: String,
//!     secret: String,
//! }
//!
//! impl Bindable for AppOptions {
//!     fn members(members: &mut MemberSet<Self>) {
//!         members
//!             .public("id", |o| &mut o.id)
//!             .public("name", |o| &mut o.name)
//!             .non_public("secret", |o| &mut o.secret);
//!     }
//! }
//!
//! let tree = Config::builder()
//!     .with_pairs([("app:id", "1"), ("app:name", "test app"), ("app:secret", "s3cr3t")])
//!     .build()?;
//!
//! let mut options = AppOptions::default();
//! bind_section(&tree, "app", &mut options, BindingPolicy::default())?;
//! assert_eq!(options.id, 1);
//! assert_eq!(options.name, "test app");
//! assert!(options.secret.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod value;

pub use error::{BindingError, BindingErrors, ValueKind};
pub use value::BindValue;

use std::fmt;

use toml::{Table, Value};

use crate::config::{keys_match, ConfigTree, KEY_DELIMITER};
use crate::markers::simple_type_name;
use crate::policy::BindingPolicy;

/// Whether a member is part of a type's public configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    NonPublic,
}

/// A type whose members can be populated from a configuration section.
pub trait Bindable: Sized + 'static {
    fn members(members: &mut MemberSet<Self>);
}

type BindFn<T> = Box<dyn Fn(&mut T, &Value, &mut BindState)>;

struct Member<T> {
    name: &'static str,
    visibility: Visibility,
    bind: BindFn<T>,
}

/// The members of `T` that binding may populate.
pub struct MemberSet<T> {
    members: Vec<Member<T>>,
}

impl<T: Bindable> MemberSet<T> {
    fn collect() -> Self {
        let mut members = Self {
            members: Vec::new(),
        };
        T::members(&mut members);
        members
    }

    /// Declares a member that is always bound.
    pub fn public<F>(&mut self, name: &'static str, field: fn(&mut T) -> &mut F) -> &mut Self
    where
        F: BindValue + 'static,
    {
        self.push(name, Visibility::Public, field)
    }

    /// Declares a member that is bound only when the policy allows
    /// non-public members.
    pub fn non_public<F>(&mut self, name: &'static str, field: fn(&mut T) -> &mut F) -> &mut Self
    where
        F: BindValue + 'static,
    {
        self.push(name, Visibility::NonPublic, field)
    }

    fn push<F>(
        &mut self,
        name: &'static str,
        visibility: Visibility,
        field: fn(&mut T) -> &mut F,
    ) -> &mut Self
    where
        F: BindValue + 'static,
    {
        self.members.push(Member {
            name,
            visibility,
            bind: Box::new(move |target: &mut T, value: &Value, state: &mut BindState| {
                field(target).bind_value(value, state)
            }),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = (&'static str, Visibility)> + '_ {
        self.members.iter().map(|m| (m.name, m.visibility))
    }

    fn find(&self, key: &str) -> Option<&Member<T>> {
        self.members.iter().find(|m| keys_match(m.name, key))
    }
}

impl<T> fmt::Debug for MemberSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.members.iter().map(|m| (m.name, m.visibility)))
            .finish()
    }
}

/// Position and accumulated errors of one binding pass.
#[derive(Debug)]
pub struct BindState {
    policy: BindingPolicy,
    fail_fast: bool,
    path: Vec<String>,
    members: Vec<Option<&'static str>>,
    errors: Vec<BindingError>,
}

impl BindState {
    pub fn new(policy: BindingPolicy, fail_fast: bool) -> Self {
        Self {
            policy,
            fail_fast,
            path: Vec::new(),
            members: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Starts the key path at `section_key`, so errors report full paths.
    pub fn at_section(mut self, section_key: &str) -> Self {
        if !section_key.is_empty() {
            self.path.push(section_key.to_string());
            self.members.push(None);
        }
        self
    }

    pub fn policy(&self) -> BindingPolicy {
        self.policy
    }

    /// Descends into `key`; `member` names the member it binds, if any.
    pub fn enter(&mut self, key: &str, member: Option<&'static str>) {
        self.path.push(key.to_string());
        self.members.push(member);
    }

    pub fn leave(&mut self) {
        self.path.pop();
        self.members.pop();
    }

    pub fn path(&self) -> String {
        let delimiter = KEY_DELIMITER.to_string();
        self.path.join(delimiter.as_str())
    }

    fn member(&self) -> &'static str {
        self.members.iter().rev().find_map(|m| *m).unwrap_or("")
    }

    /// Records that `value` at the current path could not become `expected`.
    pub fn coercion_error(&mut self, expected: ValueKind, value: &Value) {
        self.errors.push(BindingError::Coercion {
            path: self.path(),
            member: self.member().to_string(),
            expected,
            found: describe(value),
        });
    }

    fn unknown_key(&mut self, key: &str, options: &'static str) {
        self.enter(key, None);
        self.errors.push(BindingError::UnknownKey {
            path: self.path(),
            key: key.to_string(),
            options,
        });
        self.leave();
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// True once an error was recorded under fail-fast binding.
    pub fn should_stop(&self) -> bool {
        self.fail_fast && !self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), BindingErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(BindingErrors::new(self.errors))
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        Value::Integer(i) => format!("integer {i}"),
        Value::Float(f) => format!("number {f}"),
        Value::Boolean(b) => format!("boolean {b}"),
        Value::Datetime(dt) => format!("datetime {dt}"),
        Value::Array(a) => format!("a sequence of {} item(s)", a.len()),
        Value::Table(_) => "an object".to_string(),
    }
}

/// Binds every eligible member of `target` from `table`.
pub(crate) fn bind_object<T: Bindable>(target: &mut T, table: &Table, state: &mut BindState) {
    let members = MemberSet::<T>::collect();
    let policy = state.policy();

    for (key, value) in table {
        if state.should_stop() {
            break;
        }

        let eligible = members
            .find(key)
            .filter(|m| m.visibility == Visibility::Public || policy.bind_non_public);

        match eligible {
            Some(member) => {
                state.enter(key, Some(member.name));
                (member.bind)(target, value, state);
                state.leave();
            }
            None if policy.throw_on_unknown_keys => {
                state.unknown_key(key, simple_type_name(std::any::type_name::<T>()));
            }
            None => {
                tracing::trace!(
                    key = %key,
                    path = %state.path(),
                    "ignoring configuration key without an eligible member"
                );
            }
        }
    }
}

/// An options instance seen through a binder, independent of its type.
pub trait BindTarget {
    fn bind_table(&mut self, table: &Table, state: &mut BindState);

    fn target_name(&self) -> &'static str;
}

impl<T: Bindable> BindTarget for T {
    fn bind_table(&mut self, table: &Table, state: &mut BindState) {
        bind_object(self, table, state);
    }

    fn target_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Populates an options instance from a section of the configuration tree.
pub trait OptionsBinder: Send + Sync + fmt::Debug {
    fn bind(
        &self,
        tree: &ConfigTree,
        section_key: &str,
        target: &mut dyn BindTarget,
        policy: BindingPolicy,
    ) -> Result<(), BindingErrors>;
}

/// The default binder.
///
/// Attempts every member and reports all failures, or stops at the first
/// failure when built with [`fail_fast`](Self::fail_fast). Either way the
/// target may be partially populated when an error is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionBinder {
    fail_fast: bool,
}

impl SectionBinder {
    /// A binder that reports every failing member.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop at the first failing member.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

impl OptionsBinder for SectionBinder {
    fn bind(
        &self,
        tree: &ConfigTree,
        section_key: &str,
        target: &mut dyn BindTarget,
        policy: BindingPolicy,
    ) -> Result<(), BindingErrors> {
        let section = tree.subtree(section_key);
        if section.is_empty() {
            tracing::debug!(
                section = section_key,
                target = target.target_name(),
                "no configuration for section, keeping defaults"
            );
        }

        let mut state = BindState::new(policy, self.fail_fast).at_section(section_key);
        target.bind_table(section.table(), &mut state);
        state.finish()
    }
}

/// Binds the subtree at `section_key` onto `target` under `policy`.
pub fn bind_section<T: Bindable>(
    tree: &ConfigTree,
    section_key: &str,
    target: &mut T,
    policy: BindingPolicy,
) -> Result<(), BindingErrors> {
    SectionBinder::new().bind(tree, section_key, target, policy)
}
