use toml::{Table, Value};

use super::tree::keys_match;
use super::ConfigError;

/// A value contributed by a source, placed at `path` in the merged tree.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub path: Vec<String>,
    pub value: Value,
}

impl ConfigEntry {
    /// An entry placed at `path`; an empty path merges a table at the root.
    pub fn at_path(path: Vec<String>, value: Value) -> Self {
        Self { path, value }
    }
}

/// A layer of configuration data.
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError>;
}

/// Merges `value` into `table` at `path`.
///
/// Path segments reuse an existing key that the binder would treat as the
/// same one, so a `[App]` table from a file and an `app:id` override land in
/// one section, and `variableName` overrides an earlier `variable_name`.
pub fn merge_at_path(table: &mut Table, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        if let Value::Table(overlay) = value {
            deep_merge(table, overlay);
        }
        return;
    };

    let key = existing_key(table, first);

    if rest.is_empty() {
        match (table.get_mut(&key), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => deep_merge(base, overlay),
            (_, value) => {
                table.insert(key, value);
            }
        }
        return;
    }

    if !matches!(table.get(&key), Some(Value::Table(_))) {
        table.insert(key.clone(), Value::Table(Table::new()));
    }

    if let Some(Value::Table(nested)) = table.get_mut(&key) {
        merge_at_path(nested, rest, value);
    }
}

fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        let key = existing_key(base, &key);
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn existing_key(table: &Table, key: &str) -> String {
    if table.contains_key(key) {
        return key.to_string();
    }
    table
        .keys()
        .find(|k| keys_match(k, key))
        .cloned()
        .unwrap_or_else(|| key.to_string())
}
