//! Accessor paths into JSON values: compiling `item['field'].data[0]`
//! expressions and reading or writing along a compiled path.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

static PATH_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|(?:\.|\[(["'])?))(\d+|[A-Za-z_$][0-9A-Za-z_$]*)\]?"#).unwrap()
});

/// One segment of a [`Path`]: an object field name or a collection index.
///
/// Serializes untagged, so a path reads as a plain JSON array such as
/// `["arr1", 0, "arr2", 2]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Index(i64),
    Name(String),
}

/// Ordered sequence of keys locating a value inside a larger value.
pub type Path = Vec<Key>;

impl Key {
    /// Convert a key-getter result into a key.
    ///
    /// Integers become [`Key::Index`], strings become [`Key::Name`], and any
    /// other value is keyed by its JSON text.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Key::Index(i),
                None => Key::Name(n.to_string()),
            },
            Value::String(s) => Key::Name(s.clone()),
            other => Key::Name(other.to_string()),
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => usize::try_from(*i).ok(),
            Key::Name(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Name(s.clone())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Index(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Index(i64::from(i))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i as i64)
    }
}

/// Compile an accessor expression into a [`Path`].
///
/// Unquoted numeric segments become indices; quoted ones stay names.
///
/// ```
/// use formcheck::{compile_path, Key};
///
/// assert_eq!(
///     compile_path("item['field'].data[0]"),
///     vec![Key::from("item"), Key::from("field"), Key::from("data"), Key::Index(0)],
/// );
/// assert_eq!(compile_path("item.field['0']")[2], Key::from("0"));
/// ```
pub fn compile_path(path: &str) -> Path {
    PATH_ELEMENT
        .captures_iter(path)
        .filter_map(|caps| {
            let field = caps.get(2)?.as_str();
            let quoted = caps.get(1).is_some();
            match field.parse::<i64>() {
                Ok(index) if !quoted => Some(Key::Index(index)),
                _ => Some(Key::Name(field.to_string())),
            }
        })
        .collect()
}

fn child<'a>(value: &'a Value, key: &Key) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(&key.to_string()),
        Value::Array(items) => items.get(key.as_index()?),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, key: &Key) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => Some(map.entry(key.to_string()).or_insert(Value::Null)),
        Value::Array(items) => {
            let index = key.as_index()?;
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items.get_mut(index)
        }
        _ => None,
    }
}

/// Read the value at `path`. Returns `None` when any segment is missing or
/// the root is `null`.
pub fn get<'a>(value: &'a Value, path: &[Key]) -> Option<&'a Value> {
    if value.is_null() {
        return None;
    }
    path.iter().try_fold(value, |current, key| child(current, key))
}

/// Like [`get`], with `null` standing in for anything missing.
pub fn get_or_null<'a>(value: &'a Value, path: &[Key]) -> &'a Value {
    get(value, path).unwrap_or(&Value::Null)
}

/// Write `new_value` at `path`, creating missing containers on the way.
///
/// An intermediate slot becomes an array when the segment after it is an
/// index, otherwise an object. Containers that already exist are reused,
/// so sibling keys and outstanding structure survive.
pub fn set(value: &mut Value, path: &[Key], new_value: Value) {
    if value.is_null() {
        return;
    }
    let Some((last, init)) = path.split_last() else {
        return;
    };
    let mut cursor = value;
    for (i, key) in init.iter().enumerate() {
        let next_is_index = matches!(path[i + 1], Key::Index(_));
        let Some(slot) = child_mut(cursor, key) else {
            return;
        };
        if next_is_index {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
        } else if !(slot.is_object() || slot.is_array()) {
            *slot = Value::Object(Map::new());
        }
        cursor = slot;
    }
    if let Some(slot) = child_mut(cursor, last) {
        *slot = new_value;
    }
}
