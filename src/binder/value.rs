use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::path::PathBuf;

use toml::{Table, Value};

use super::{bind_object, BindState, Bindable, ValueKind};
use crate::config::scalar_text;

/// A member type that can be populated from a configuration value.
///
/// Configuration values often arrive as text (environment variables,
/// in-memory pairs), so scalars accept both their native TOML type and a
/// string that parses as one.
pub trait BindValue {
    /// Shape expected in the tree.
    const KIND: ValueKind;

    /// Updates `self` from `value`, recording failures on `state`.
    fn bind_value(&mut self, value: &Value, state: &mut BindState);
}

fn bind_scalar<T>(
    slot: &mut T,
    value: &Value,
    state: &mut BindState,
    expected: ValueKind,
    coerce: impl FnOnce(&Value) -> Option<T>,
) {
    match coerce(value) {
        Some(coerced) => *slot = coerced,
        None => state.coercion_error(expected, value),
    }
}

macro_rules! bind_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BindValue for $ty {
                const KIND: ValueKind = ValueKind::Integer;

                fn bind_value(&mut self, value: &Value, state: &mut BindState) {
                    bind_scalar(self, value, state, Self::KIND, |value| match value {
                        Value::Integer(i) => <$ty>::try_from(*i).ok(),
                        Value::String(s) => s.trim().parse::<$ty>().ok(),
                        _ => None,
                    });
                }
            }
        )*
    };
}

bind_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! bind_float {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BindValue for $ty {
                const KIND: ValueKind = ValueKind::Float;

                fn bind_value(&mut self, value: &Value, state: &mut BindState) {
                    bind_scalar(self, value, state, Self::KIND, |value| match value {
                        Value::Float(f) => Some(*f as $ty),
                        Value::Integer(i) => Some(*i as $ty),
                        Value::String(s) => s.trim().parse::<$ty>().ok(),
                        _ => None,
                    });
                }
            }
        )*
    };
}

bind_float!(f32, f64);

impl BindValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn bind_value(&mut self, value: &Value, state: &mut BindState) {
        bind_scalar(self, value, state, Self::KIND, |value| match value {
            Value::Boolean(b) => Some(*b),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        });
    }
}

impl BindValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn bind_value(&mut self, value: &Value, state: &mut BindState) {
        bind_scalar(self, value, state, Self::KIND, scalar_text);
    }
}

impl BindValue for PathBuf {
    const KIND: ValueKind = ValueKind::Path;

    fn bind_value(&mut self, value: &Value, state: &mut BindState) {
        bind_scalar(self, value, state, Self::KIND, |value| match value {
            Value::String(s) => Some(PathBuf::from(s)),
            _ => None,
        });
    }
}

/// An empty string clears the value. A present value is bound in place, so a
/// failed coercion keeps it; an absent one is only set when binding succeeds.
impl<T: BindValue + Default> BindValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn bind_value(&mut self, value: &Value, state: &mut BindState) {
        if matches!(value, Value::String(s) if s.is_empty()) {
            *self = None;
            return;
        }

        match self {
            Some(inner) => inner.bind_value(value, state),
            None => {
                let errors_before = state.error_count();
                let mut inner = T::default();
                inner.bind_value(value, state);
                if state.error_count() == errors_before {
                    *self = Some(inner);
                }
            }
        }
    }
}

/// Accepts an array, or a table keyed by element index (`items:0`,
/// `items:1`) as flattened sources produce. Replaces any existing elements.
impl<T: BindValue + Default> BindValue for Vec<T> {
    const KIND: ValueKind = ValueKind::Sequence;

    fn bind_value(&mut self, value: &Value, state: &mut BindState) {
        let items: Vec<(String, &Value)> = match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            Value::Table(table) => match indexed_items(table) {
                Some(items) => items,
                None => return state.coercion_error(Self::KIND, value),
            },
            Value::String(s) if s.is_empty() => Vec::new(),
            _ => return state.coercion_error(Self::KIND, value),
        };

        let mut bound = Vec::with_capacity(items.len());
        for (key, item) in items {
            if state.should_stop() {
                break;
            }
            let mut element = T::default();
            state.enter(&key, None);
            element.bind_value(item, state);
            state.leave();
            bound.push(element);
        }
        *self = bound;
    }
}

fn indexed_items(table: &Table) -> Option<Vec<(String, &Value)>> {
    let mut items = table
        .iter()
        .map(|(key, value)| {
            key.parse::<usize>()
                .ok()
                .map(|index| (index, key.clone(), value))
        })
        .collect::<Option<Vec<_>>>()?;
    items.sort_by_key(|(index, _, _)| *index);
    Some(items.into_iter().map(|(_, key, value)| (key, value)).collect())
}

fn bind_entries<T, M>(map: &mut M, value: &Value, state: &mut BindState)
where
    T: BindValue + Default,
    M: MapLike<T>,
{
    let Value::Table(table) = value else {
        return state.coercion_error(ValueKind::Map, value);
    };

    for (key, item) in table {
        if state.should_stop() {
            break;
        }
        let mut entry = map.take_entry(key).unwrap_or_default();
        state.enter(key, None);
        entry.bind_value(item, state);
        state.leave();
        map.put_entry(key.clone(), entry);
    }
}

trait MapLike<T> {
    fn take_entry(&mut self, key: &str) -> Option<T>;
    fn put_entry(&mut self, key: String, value: T);
}

impl<T, S: BuildHasher> MapLike<T> for HashMap<String, T, S> {
    fn take_entry(&mut self, key: &str) -> Option<T> {
        self.remove(key)
    }

    fn put_entry(&mut self, key: String, value: T) {
        self.insert(key, value);
    }
}

impl<T> MapLike<T> for BTreeMap<String, T> {
    fn take_entry(&mut self, key: &str) -> Option<T> {
        self.remove(key)
    }

    fn put_entry(&mut self, key: String, value: T) {
        self.insert(key, value);
    }
}

/// Merges entries into the map; existing keys not in the section survive.
impl<T, S> BindValue for HashMap<String, T, S>
where
    T: BindValue + Default,
    S: BuildHasher,
{
    const KIND: ValueKind = ValueKind::Map;

    fn bind_value(&mut self, value: &Value, state: &mut BindState) {
        bind_entries(self, value, state);
    }
}

impl<T: BindValue + Default> BindValue for BTreeMap<String, T> {
    const KIND: ValueKind = ValueKind::Map;

    fn bind_value(&mut self, value: &Value, state: &mut BindState) {
        bind_entries(self, value, state);
    }
}

/// Nested options bind recursively under the same policy. An empty string
/// (a section that exists but holds nothing) leaves the defaults in place.
impl<T: Bindable> BindValue for T {
    const KIND: ValueKind = ValueKind::Object;

    fn bind_value(&mut self, value: &Value, state: &mut BindState) {
        match value {
            Value::Table(table) => bind_object(self, table, state),
            Value::String(s) if s.is_empty() => {}
            _ => state.coercion_error(Self::KIND, value),
        }
    }
}
