#![forbid(unsafe_code)]

//! Immutable paths locating a node inside a field tree.
//!
//! A [`Path`] is an ordered list of [`PathKey`]s. String keys address record
//! entries, integer keys address list slots. Paths serialize to the dotted
//! and bracketed form used as form input names:
//!
//! | Keys                | Serialized     |
//! |---------------------|----------------|
//! | `[]`                | `""`           |
//! | `["a", "b"]`        | `"a.b"`        |
//! | `["a", 42, "b"]`    | `"a[42].b"`    |
//! | `[1, "c"]`          | `"[1].c"`      |
//! | `[0, 1]`            | `"[0][1]"`     |
//!
//! # Invariants
//!
//! 1. `Path::parse(p.serialize()) == p` for every path built from valid items.
//! 2. A path never changes once built; `append`/`prepend`/`shift` allocate a new one.
//! 3. The serialized form is computed at most once per path (shared by clones).

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted list index (exclusive), matching the integer range that
/// survives a round-trip through JSON numbers.
pub const MAX_SAFE_INDEX: usize = (1 << 53) - 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while building, splitting, or parsing paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// `split_head_or_err` was called on the empty path.
    #[error("cannot split head of empty path")]
    EmptyPathSplit,
    /// A string key is empty or contains a structural separator.
    #[error("string path item cannot be empty or contain . or [ or ] (received \"{item}\")")]
    InvalidStringItem { item: String },
    /// An integer key is outside the safe index range.
    #[error("number path item must be a non-negative safe integer (received {item})")]
    InvalidNumberItem { item: usize },
    /// The input string is not a serialized path.
    #[error("malformed path \"{input}\" at byte {position}")]
    Malformed { input: String, position: usize },
}

// ---------------------------------------------------------------------------
// PathKey
// ---------------------------------------------------------------------------

/// One step of a path: a list index or a record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathKey {
    /// Position inside a list.
    Index(usize),
    /// Entry name inside a record.
    Name(String),
}

impl PathKey {
    /// Returns the index if this key addresses a list slot.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Name(_) => None,
        }
    }

    /// Returns the name if this key addresses a record entry.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Index(_) => None,
            Self::Name(name) => Some(name),
        }
    }

    /// Check that the key can be serialized without ambiguity.
    pub fn validate(&self) -> Result<(), PathError> {
        match self {
            Self::Index(item) => {
                if *item < MAX_SAFE_INDEX {
                    Ok(())
                } else {
                    Err(PathError::InvalidNumberItem { item: *item })
                }
            }
            Self::Name(item) => {
                if !item.is_empty() && !item.contains(is_separator) {
                    Ok(())
                } else {
                    Err(PathError::InvalidStringItem { item: item.clone() })
                }
            }
        }
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for PathKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PathKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '[' | ']')
}

/// A plain key sequence, the serializable form of a path used to address issues.
pub type RawPath = Vec<PathKey>;

// ---------------------------------------------------------------------------
// Path
// ---------------------------------------------------------------------------

/// An immutable, cheaply clonable sequence of [`PathKey`]s.
#[derive(Clone, Default)]
pub struct Path {
    keys: Arc<[PathKey]>,
    serialized: Arc<OnceLock<String>>,
}

impl Path {
    /// The empty path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from any sequence of keys.
    #[must_use]
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PathKey>,
    {
        Self::from_vec(keys.into_iter().map(Into::into).collect())
    }

    /// Build a path from a raw key slice.
    #[must_use]
    pub fn from_raw(raw: &[PathKey]) -> Self {
        Self::from_vec(raw.to_vec())
    }

    fn from_vec(keys: Vec<PathKey>) -> Self {
        Self {
            keys: keys.into(),
            serialized: Arc::default(),
        }
    }

    /// The keys of this path.
    #[must_use]
    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    /// Copy the keys out as a [`RawPath`].
    #[must_use]
    pub fn to_raw(&self) -> RawPath {
        self.keys.to_vec()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// First key, if any.
    #[must_use]
    pub fn head(&self) -> Option<&PathKey> {
        self.keys.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathKey> {
        self.keys.iter()
    }

    /// A new path with `keys` added at the end.
    #[must_use]
    pub fn append<I, K>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PathKey>,
    {
        let mut next = self.keys.to_vec();
        next.extend(keys.into_iter().map(Into::into));
        Self::from_vec(next)
    }

    /// A new path with a single key added at the end.
    #[must_use]
    pub fn child(&self, key: impl Into<PathKey>) -> Self {
        self.append([key.into()])
    }

    /// A new path with `keys` added at the front.
    #[must_use]
    pub fn prepend<I, K>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PathKey>,
    {
        let mut next: Vec<PathKey> = keys.into_iter().map(Into::into).collect();
        next.extend(self.keys.iter().cloned());
        Self::from_vec(next)
    }

    /// The path without its first key (empty stays empty).
    #[must_use]
    pub fn shift(&self) -> Self {
        self.split_head().1
    }

    /// Split into the first key and the remaining path.
    #[must_use]
    pub fn split_head(&self) -> (Option<PathKey>, Path) {
        match self.keys.split_first() {
            None => (None, Path::root()),
            Some((head, tail)) => (Some(head.clone()), Path::from_raw(tail)),
        }
    }

    /// Like [`split_head`](Self::split_head) but the empty path is an error.
    pub fn split_head_or_err(&self) -> Result<(PathKey, Path), PathError> {
        match self.split_head() {
            (Some(head), tail) => Ok((head, tail)),
            (None, _) => Err(PathError::EmptyPathSplit),
        }
    }

    /// Check every key with [`PathKey::validate`].
    pub fn validate(&self) -> Result<(), PathError> {
        self.keys.iter().try_for_each(PathKey::validate)
    }

    /// Structural equality against a raw key slice.
    #[must_use]
    pub fn matches(&self, raw: &[PathKey]) -> bool {
        *self.keys == *raw
    }

    /// The serialized form (`a[0].b`), computed once.
    pub fn serialize(&self) -> &str {
        self.serialized.get_or_init(|| serialize_keys(&self.keys))
    }

    /// Parse the serialized form back into a path.
    ///
    /// Accepts exactly the strings produced by [`serialize`](Self::serialize)
    /// for valid keys.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let malformed = |position: usize| PathError::Malformed {
            input: input.to_string(),
            position,
        };

        let mut keys = Vec::new();
        let mut name = String::new();
        // A `.` was consumed and a name must follow.
        let mut expect_name = false;
        let mut chars = input.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '.' => {
                    if !name.is_empty() {
                        keys.push(PathKey::Name(std::mem::take(&mut name)));
                    } else if expect_name || !matches!(keys.last(), Some(PathKey::Index(_))) {
                        return Err(malformed(pos));
                    }
                    expect_name = true;
                }
                '[' => {
                    if !name.is_empty() {
                        keys.push(PathKey::Name(std::mem::take(&mut name)));
                    } else if expect_name {
                        return Err(malformed(pos));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some((_, ']')) => break,
                            Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                            Some((bad, _)) => return Err(malformed(bad)),
                            None => return Err(malformed(input.len())),
                        }
                    }
                    let index: usize = digits.parse().map_err(|_| malformed(pos))?;
                    let key = PathKey::Index(index);
                    key.validate()?;
                    keys.push(key);
                    expect_name = false;
                }
                ']' => return Err(malformed(pos)),
                other => {
                    if name.is_empty() && !expect_name && !keys.is_empty() {
                        // A name after an index needs a `.` separator.
                        return Err(malformed(pos));
                    }
                    name.push(other);
                    expect_name = false;
                }
            }
        }

        if !name.is_empty() {
            keys.push(PathKey::Name(name));
        } else if expect_name {
            return Err(malformed(input.len()));
        }

        Ok(Self::from_vec(keys))
    }
}

fn serialize_keys(keys: &[PathKey]) -> String {
    let mut out = String::new();
    for (index, key) in keys.iter().enumerate() {
        match key {
            PathKey::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
            PathKey::Name(name) => {
                if index > 0 {
                    out.push('.');
                }
                out.push_str(name);
            }
        }
    }
    out
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.keys, &other.keys) || self.keys == other.keys
    }
}

impl Eq for Path {}

impl std::hash::Hash for Path {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.keys.hash(state);
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.serialize())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.serialize())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<RawPath> for Path {
    fn from(raw: RawPath) -> Self {
        Self::from_vec(raw)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathKey;
    type IntoIter = std::slice::Iter<'a, PathKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

impl Serialize for Path {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.keys.iter())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawPath::deserialize(deserializer).map(Path::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &[PathKey]) -> Path {
        Path::from_raw(raw)
    }

    fn name(s: &str) -> PathKey {
        PathKey::from(s)
    }

    fn idx(i: usize) -> PathKey {
        PathKey::Index(i)
    }

    #[test]
    fn serialize_table() {
        let cases: Vec<(Vec<PathKey>, &str)> = vec![
            (vec![], ""),
            (vec![name("foo")], "foo"),
            (vec![name("a"), idx(42), name("b")], "a[42].b"),
            (vec![name("a"), name("b"), name("c")], "a.b.c"),
            (vec![name("a"), idx(1), name("c"), name("d")], "a[1].c.d"),
            (vec![idx(1), name("c"), name("d")], "[1].c.d"),
            (vec![name("a"), name("b"), name("c"), idx(9)], "a.b.c[9]"),
            (vec![idx(0), idx(1), idx(2)], "[0][1][2]"),
            (vec![name("____")], "____"),
            (vec![name("$$"), idx(0), name("---")], "$$[0].---"),
        ];
        for (keys, expected) in cases {
            let path = p(&keys);
            assert_eq!(path.serialize(), expected);
            assert_eq!(Path::parse(expected).unwrap().keys(), keys.as_slice());
        }
    }

    #[test]
    fn serialize_is_memoized_and_stable() {
        let path = p(&[name("a"), idx(42), name("b")]);
        let first = path.serialize() as *const str;
        assert_eq!(path.serialize(), "a[42].b");
        assert_eq!(first, path.serialize() as *const str);
    }

    #[test]
    fn append_leaves_original_untouched() {
        let path = p(&[name("a"), idx(42), name("b")]);
        let next = path.child("c");
        assert_eq!(path.serialize(), "a[42].b");
        assert_eq!(next.serialize(), "a[42].b.c");
    }

    #[test]
    fn prepend_and_shift() {
        let path = p(&[idx(42), name("b")]);
        let full = path.prepend(["form"]);
        assert_eq!(full.serialize(), "form[42].b");
        assert_eq!(full.shift(), path);
        assert_eq!(Path::root().shift(), Path::root());
    }

    #[test]
    fn split_head() {
        let path = p(&[name("a"), idx(42), name("b")]);
        let (head, tail) = path.split_head();
        assert_eq!(head, Some(name("a")));
        assert_eq!(tail.serialize(), "[42].b");

        let (head, tail) = Path::root().split_head();
        assert_eq!(head, None);
        assert!(tail.is_empty());
    }

    #[test]
    fn split_head_or_err_on_empty() {
        let err = Path::root().split_head_or_err().unwrap_err();
        assert_eq!(err, PathError::EmptyPathSplit);
        assert_eq!(err.to_string(), "cannot split head of empty path");
    }

    #[test]
    fn equality_is_structural() {
        let a = p(&[name("a"), idx(42), name("b")]);
        let b = p(&[name("a"), idx(42), name("b")]);
        let c = p(&[name("a"), idx(42), name("c")]);
        assert_eq!(a, a.clone());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.matches(&[name("a"), idx(42), name("b")]));
        assert!(!a.matches(&[name("a"), idx(42)]));
    }

    #[test]
    fn validate_items() {
        assert!(name("ok_key-1$=").validate().is_ok());
        assert!(idx(0).validate().is_ok());
        for bad in ["a.b", "a[", "]", ""] {
            assert!(matches!(
                name(bad).validate(),
                Err(PathError::InvalidStringItem { .. })
            ));
        }
        assert!(matches!(
            idx(MAX_SAFE_INDEX).validate(),
            Err(PathError::InvalidNumberItem { .. })
        ));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for bad in [".a", "a..b", "a.", "a.[0]", "[x]", "[0]b", "a]", "[1"] {
            assert!(
                matches!(Path::parse(bad), Err(PathError::Malformed { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn iterates_keys() {
        let path: Path = "a[42].b".parse().unwrap();
        let keys: Vec<&PathKey> = path.iter().collect();
        assert_eq!(keys, vec![&name("a"), &idx(42), &name("b")]);
    }

    #[test]
    fn raw_path_serde_is_plain_array() {
        let path = p(&[name("a"), idx(1)]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["a",1]"#);
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
