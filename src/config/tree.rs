use serde::{Deserialize, Serialize};
use toml::{Table, Value};

/// Separator between segments of a section key or flattened lookup key.
pub const KEY_DELIMITER: char = ':';

/// A read-only hierarchical configuration tree.
///
/// Keys are matched loosely: an exact match wins, otherwise the first key
/// equal under ASCII case folding with `_` and `-` ignored is used. Paths use
/// [`KEY_DELIMITER`], so `"app:database:port"` addresses
/// `[app.database] port = ...` in TOML terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree {
    root: Table,
}

impl ConfigTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(root: Table) -> Self {
        Self { root }
    }

    pub fn table(&self) -> &Table {
        &self.root
    }

    pub fn into_table(self) -> Table {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Returns the subtree at `key`.
    ///
    /// A missing key, or one that names a scalar or array, yields an empty
    /// tree. An empty key yields a copy of the whole tree.
    pub fn subtree(&self, key: &str) -> ConfigTree {
        if key.is_empty() {
            return self.clone();
        }
        match self.get(key) {
            Some(Value::Table(table)) => Self::from_table(table.clone()),
            _ => Self::new(),
        }
    }

    /// Looks up a value by its flattened key (`"section:member"`).
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split(KEY_DELIMITER);
        let first = segments.next().filter(|s| !s.is_empty())?;
        let mut current = find_key(&self.root, first)?;
        for segment in segments {
            current = find_key(current.as_table()?, segment)?;
        }
        Some(current)
    }

    /// Looks up a scalar and renders it as text, the way every
    /// configuration provider would have stored it.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_text)
    }
}

impl From<Table> for ConfigTree {
    fn from(root: Table) -> Self {
        Self::from_table(root)
    }
}

/// Renders a scalar as text; arrays and tables have no text form.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

/// Whether two keys name the same entry: equal ignoring ASCII case, `_`
/// and `-`, so `variableName`, `variable_name` and `VARIABLE-NAME` agree.
pub(crate) fn keys_match(a: &str, b: &str) -> bool {
    fn folded(s: &str) -> impl Iterator<Item = char> + '_ {
        s.chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
    }
    folded(a).eq(folded(b))
}

/// Finds `key` in `table`, preferring an exact match over a folded one.
fn find_key<'t>(table: &'t Table, key: &str) -> Option<&'t Value> {
    table.get(key).or_else(|| {
        table
            .iter()
            .find(|(k, _)| keys_match(k, key))
            .map(|(_, v)| v)
    })
}
