#![forbid(unsafe_code)]

//! Field trees: nesting of fields, lists, and records.
//!
//! Fields are transparent for addressing: a field at path `p` places its
//! children at `p` as well, so only list slots and record entries add path
//! keys.
//!
//! ```text
//! { a: [F1, F2], b: F3, c: Group(null) }
//!
//!   F1  ["a", 0]
//!   F2  ["a", 1]
//!   F3  ["b"]
//!   G   ["c"]
//! ```
//!
//! # Traversal
//!
//! [`FieldTree::traverse`] visits fields in pre-order. The visitor gets a
//! [`Next`] handle and decides whether and when to call
//! [`Next::descend`], which visits the field's children and returns their
//! results. Visitors are `Fn`; accumulate through `Cell`/`RefCell` and never
//! hold a borrow across `descend`.

use std::cell::RefCell;
use std::collections::BTreeMap;

use formtree_core::{Path, PathKey};
use indexmap::IndexMap;

use crate::error::FormError;
use crate::field::Field;

/// A recursive arrangement of fields.
#[derive(Debug, Clone, Default)]
pub enum FieldTree {
    #[default]
    Null,
    Field(Field),
    List(Vec<FieldTree>),
    Record(IndexMap<String, FieldTree>),
}

type Visitor<'v, T> = dyn Fn(&Field, &Path, Next<'_, T>) -> T + 'v;

/// Continuation handed to a traversal visitor.
pub struct Next<'a, T> {
    children: &'a FieldTree,
    path: &'a Path,
    visitor: &'a Visitor<'a, T>,
}

impl<T> Next<'_, T> {
    /// Visit the current field's children and collect the visitor results.
    pub fn descend(self) -> Vec<T> {
        let mut out = Vec::new();
        walk(self.children, self.path, self.visitor, &mut out);
        out
    }

    /// The path of the field being visited.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path
    }
}

fn walk<T>(tree: &FieldTree, path: &Path, visitor: &Visitor<'_, T>, out: &mut Vec<T>) {
    match tree {
        FieldTree::Null => {}
        FieldTree::Field(field) => {
            let next = Next {
                children: field.children(),
                path,
                visitor,
            };
            out.push(visitor(field, path, next));
        }
        FieldTree::List(items) => {
            for (index, item) in items.iter().enumerate() {
                walk(item, &path.child(index), visitor, out);
            }
        }
        FieldTree::Record(entries) => {
            for (key, item) in entries {
                walk(item, &path.child(key.as_str()), visitor, out);
            }
        }
    }
}

impl FieldTree {
    /// Record node from `(name, subtree)` pairs, keeping their order.
    #[must_use]
    pub fn record<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldTree)>,
        K: Into<String>,
    {
        Self::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// List node.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = FieldTree>) -> Self {
        Self::List(items.into_iter().collect())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Self::Field(field) => Some(field),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[FieldTree]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&IndexMap<String, FieldTree>> {
        match self {
            Self::Record(entries) => Some(entries),
            _ => None,
        }
    }

    /// Record entry by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldTree> {
        self.as_record().and_then(|entries| entries.get(key))
    }

    /// List slot by index.
    #[must_use]
    pub fn index(&self, index: usize) -> Option<&FieldTree> {
        self.as_list().and_then(|items| items.get(index))
    }

    /// Pre-order traversal. Returns the results of the top-level fields.
    pub fn traverse<T, V>(&self, visitor: V) -> Vec<T>
    where
        V: Fn(&Field, &Path, Next<'_, T>) -> T,
    {
        let mut out = Vec::new();
        walk(self, &Path::root(), &visitor, &mut out);
        out
    }

    /// Every field with its path, in traversal order.
    #[must_use]
    pub fn fields(&self) -> Vec<(Field, Path)> {
        let found = RefCell::new(Vec::new());
        self.traverse(|field, path, next| {
            found.borrow_mut().push((field.clone(), path.clone()));
            next.descend();
        });
        found.into_inner()
    }

    /// The field addressed by `path`, if any.
    #[must_use]
    pub fn find_by_path(&self, path: &Path) -> Option<Field> {
        let (head, rest) = path.split_head();
        match (self, head) {
            (Self::Field(field), None) => Some(field.clone()),
            (Self::Field(field), Some(_)) => field.children().find_by_path(path),
            (Self::List(items), Some(PathKey::Index(index))) => {
                items.get(index)?.find_by_path(&rest)
            }
            (Self::Record(entries), Some(PathKey::Name(name))) => {
                entries.get(&name)?.find_by_path(&rest)
            }
            _ => None,
        }
    }

    /// Where `field` sits in this tree.
    ///
    /// `Ok(None)` when absent; [`FormError::ReusedField`] when the same
    /// identity occurs at more than one path.
    pub fn field_path(&self, field: &Field) -> Result<Option<Path>, FormError> {
        let key = field.key();
        let found = RefCell::new(Vec::new());
        self.traverse(|current, path, next| {
            if current.key() == key {
                found.borrow_mut().push(path.clone());
            }
            next.descend();
        });
        let mut paths = found.into_inner();
        match paths.len() {
            0 => Ok(None),
            1 => Ok(paths.pop()),
            _ => Err(FormError::ReusedField { key, paths }),
        }
    }

    /// Deep copy where every field gets a fresh key.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Field(field) => Self::Field(field.duplicate()),
            Self::List(items) => Self::List(items.iter().map(Self::duplicate).collect()),
            Self::Record(entries) => Self::Record(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.duplicate()))
                    .collect(),
            ),
        }
    }

    /// Reshape the tree to match the structure implied by `paths`.
    ///
    /// Paths are relative to this node. Fields with a restore function (such
    /// as `repeat`) rebuild their children from the paths that reach them;
    /// other nodes forward each path to the branch named by its head. Field
    /// keys are preserved. An empty `paths` returns the tree unchanged.
    #[must_use]
    pub fn restore_from_paths(&self, paths: &[Path]) -> Self {
        if paths.is_empty() {
            return self.clone();
        }
        match self {
            Self::Null => Self::Null,
            Self::Field(field) => {
                let children = match field.restore_children(paths) {
                    Some(children) => children,
                    None => field.children().restore_from_paths(paths),
                };
                Self::Field(field.replace_children(children))
            }
            Self::List(items) => {
                let mut by_index: BTreeMap<usize, Vec<Path>> = BTreeMap::new();
                for path in paths {
                    if let (Some(PathKey::Index(index)), rest) = path.split_head() {
                        by_index.entry(index).or_default().push(rest);
                    }
                }
                Self::List(
                    items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| {
                            item.restore_from_paths(
                                by_index.get(&index).map_or(&[][..], Vec::as_slice),
                            )
                        })
                        .collect(),
                )
            }
            Self::Record(entries) => {
                let mut by_key: IndexMap<String, Vec<Path>> = IndexMap::new();
                for path in paths {
                    if let (Some(PathKey::Name(name)), rest) = path.split_head() {
                        by_key.entry(name).or_default().push(rest);
                    }
                }
                Self::Record(
                    entries
                        .iter()
                        .map(|(key, item)| {
                            let restored = item.restore_from_paths(
                                by_key.get(key).map_or(&[][..], Vec::as_slice),
                            );
                            (key.clone(), restored)
                        })
                        .collect(),
                )
            }
        }
    }

    /// A single root field for this tree, grouping it if needed.
    ///
    /// Returns the root and whether an implicit group was added.
    #[must_use]
    pub fn wrap(&self) -> (Field, bool) {
        match self {
            Self::Field(field) => (field.clone(), false),
            other => (Field::group(other.clone()), true),
        }
    }

    /// Reverse of [`wrap`](Self::wrap).
    #[must_use]
    pub fn unwrap_root(root: &Field, wrapped: bool) -> Self {
        if wrapped {
            root.children().clone()
        } else {
            Self::Field(root.clone())
        }
    }

    /// Node-by-node identity: same shape and the same field allocations.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Field(a), Self::Field(b)) => a.ptr_eq(b),
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
            }
            (Self::Record(a), Self::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.ptr_eq(vb))
            }
            _ => false,
        }
    }
}

impl From<Field> for FieldTree {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl From<Vec<FieldTree>> for FieldTree {
    fn from(items: Vec<FieldTree>) -> Self {
        Self::List(items)
    }
}

impl From<IndexMap<String, FieldTree>> for FieldTree {
    fn from(entries: IndexMap<String, FieldTree>) -> Self {
        Self::Record(entries)
    }
}
