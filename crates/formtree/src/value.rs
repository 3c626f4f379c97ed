#![forbid(unsafe_code)]

//! Raw form entries and validated values.
//!
//! [`FormData`] is the external input: an ordered multimap from serialized
//! field names to [`Entry`] lists. Validation turns entries into [`Value`]s,
//! which nest the same way the field tree does.

use std::fmt;

use formtree_core::{Path, PathKey};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// An uploaded file handle. Only metadata is carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl FileEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            content_type: None,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// One raw value submitted under a field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Text(String),
    File(FileEntry),
}

impl From<&str> for Entry {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Entry {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<FileEntry> for Entry {
    fn from(file: FileEntry) -> Self {
        Self::File(file)
    }
}

impl From<Entry> for Value {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Text(text) => Value::Text(text),
            Entry::File(file) => Value::File(file),
        }
    }
}

// ---------------------------------------------------------------------------
// FormData
// ---------------------------------------------------------------------------

/// Ordered multimap of field name to submitted entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: IndexMap<String, Vec<Entry>>,
}

impl FormData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry under `name`, after any existing ones.
    pub fn append(&mut self, name: impl Into<String>, entry: impl Into<Entry>) {
        self.entries
            .entry(name.into())
            .or_default()
            .push(entry.into());
    }

    /// Builder-style [`append`](Self::append).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, entry: impl Into<Entry>) -> Self {
        self.append(name, entry);
        self
    }

    /// Every entry recorded for `name`, in submission order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[Entry] {
        self.entries.get(name).map_or(&[], Vec::as_slice)
    }

    /// Distinct names in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten structured data into named entries under `form_name`.
    ///
    /// Objects and arrays extend the path; strings and numbers become text
    /// entries; `true` becomes `"on"` like a checked checkbox; `false` and
    /// `null` produce nothing.
    #[must_use]
    pub fn from_json(form_name: &str, data: &serde_json::Value) -> Self {
        let mut form = Self::new();
        flatten_json(&mut form, &Path::from_keys([form_name]), data);
        form
    }
}

fn flatten_json(form: &mut FormData, path: &Path, data: &serde_json::Value) {
    use serde_json::Value as Json;
    match data {
        Json::Null | Json::Bool(false) => {}
        Json::Bool(true) => form.append(path.serialize(), "on"),
        Json::Number(n) => form.append(path.serialize(), n.to_string()),
        Json::String(s) => form.append(path.serialize(), s.as_str()),
        Json::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_json(form, &path.child(index), item);
            }
        }
        Json::Object(map) => {
            for (key, item) in map {
                flatten_json(form, &path.child(PathKey::from(key.as_str())), item);
            }
        }
    }
}

impl<N: Into<String>, E: Into<Entry>> FromIterator<(N, E)> for FormData {
    fn from_iter<I: IntoIterator<Item = (N, E)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (name, entry) in iter {
            form.append(name, entry);
        }
        form
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A validated value. Groups produce records, repeats produce lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    File(FileEntry),
    List(Vec<Value>),
    Record(IndexMap<String, Value>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Record(map) => Some(map),
            _ => None,
        }
    }

    /// Record entry lookup; `None` for non-records.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_record().and_then(|map| map.get(key))
    }

    /// Convert plain JSON into a value. Files cannot be expressed in JSON.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Json::String(s) => Self::Text(s.clone()),
            Json::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render as JSON. Integral numbers are written without a fraction.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    Json::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number)
                }
            }
            Self::Text(s) => Json::String(s.clone()),
            Self::File(file) => serde_json::to_value(file).unwrap_or(Json::Null),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Record(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
