#![forbid(unsafe_code)]

//! Field nodes: identity, children, and a validation function.
//!
//! A [`Field`] is a cheap handle (`Arc`) to an immutable node. Cloning the
//! handle keeps the identity; every *derived* field gets a new one:
//!
//! | Operation                  | Key          | Children           |
//! |----------------------------|--------------|--------------------|
//! | `field.clone()`            | same         | same               |
//! | `field.validate(step)`     | fresh        | same               |
//! | `field.duplicate()`        | fresh        | duplicated (fresh) |
//! | `field.with_children(f)`   | same         | `f(children)`      |
//!
//! Validation receives a [`FieldInput`]: the raw entries submitted under the
//! field's name plus the already-resolved value of its children.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use formtree_core::{FieldKey, Path};

use crate::issue::Issue;
use crate::tree::FieldTree;
use crate::value::{Entry, Value};

/// What a field's validation function sees.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInput {
    /// Entries submitted under the field's serialized name.
    pub values: Vec<Entry>,
    /// Resolved value of the children (`Null` for leaves).
    pub children: Value,
}

impl FieldInput {
    #[must_use]
    pub fn new(values: Vec<Entry>, children: Value) -> Self {
        Self { values, children }
    }
}

/// Outcome of a validation step.
///
/// `Failure(vec![])` means "no verdict": the field ends up neither valid nor
/// in error.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Success(Value),
    Failure(Vec<Issue>),
}

impl Validation {
    #[must_use]
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success(value.into())
    }

    #[must_use]
    pub fn failure(issue: Issue) -> Self {
        Self::Failure(vec![issue])
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Feed a success into `step`; failures pass through.
    #[must_use]
    pub fn and_then(self, step: impl FnOnce(Value) -> Validation) -> Self {
        match self {
            Self::Success(value) => step(value),
            failure @ Self::Failure(_) => failure,
        }
    }
}

pub(crate) type ValidateFn = dyn Fn(&FieldInput) -> Validation + Send + Sync;
pub(crate) type RestoreFn = dyn Fn(&[Path]) -> FieldTree + Send + Sync;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Shared handle to an immutable field node.
#[derive(Clone)]
pub struct Field {
    inner: Arc<FieldInner>,
}

struct FieldInner {
    key: FieldKey,
    kind: &'static str,
    children: FieldTree,
    validate: Arc<ValidateFn>,
    restore: Option<Arc<RestoreFn>>,
}

impl Field {
    /// Build a field from its children and a validation function.
    ///
    /// `kind` is a short label used in debug output only.
    #[must_use]
    pub fn new<F>(kind: &'static str, children: impl Into<FieldTree>, validate: F) -> Self
    where
        F: Fn(&FieldInput) -> Validation + Send + Sync + 'static,
    {
        Self::from_parts(FieldKey::fresh(), kind, children.into(), Arc::new(validate), None)
    }

    pub(crate) fn from_parts(
        key: FieldKey,
        kind: &'static str,
        children: FieldTree,
        validate: Arc<ValidateFn>,
        restore: Option<Arc<RestoreFn>>,
    ) -> Self {
        Self {
            inner: Arc::new(FieldInner {
                key,
                kind,
                children,
                validate,
                restore,
            }),
        }
    }

    /// Attach a function that rebuilds the children from observed paths.
    #[must_use]
    pub fn with_restore<R>(self, restore: R) -> Self
    where
        R: Fn(&[Path]) -> FieldTree + Send + Sync + 'static,
    {
        Self::from_parts(
            FieldKey::fresh(),
            self.inner.kind,
            self.inner.children.clone(),
            Arc::clone(&self.inner.validate),
            Some(Arc::new(restore)),
        )
    }

    /// Rename the debug label. Only meaningful right after construction.
    #[must_use]
    pub fn labeled(self, kind: &'static str) -> Self {
        Self::from_parts(
            self.inner.key,
            kind,
            self.inner.children.clone(),
            Arc::clone(&self.inner.validate),
            self.inner.restore.clone(),
        )
    }

    #[must_use]
    pub fn key(&self) -> FieldKey {
        self.inner.key
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    #[must_use]
    pub fn children(&self) -> &FieldTree {
        &self.inner.children
    }

    /// Whether the field knows how to rebuild its children from paths.
    #[must_use]
    pub fn has_restore(&self) -> bool {
        self.inner.restore.is_some()
    }

    /// Children rebuilt from `paths`, if the field has a restore function.
    #[must_use]
    pub fn restore_children(&self, paths: &[Path]) -> Option<FieldTree> {
        self.inner.restore.as_ref().map(|restore| restore(paths))
    }

    /// Run the validation function as is.
    #[must_use]
    pub fn run(&self, input: &FieldInput) -> Validation {
        (self.inner.validate)(input)
    }

    /// Run the validation function; a panic becomes a `ValidationError` issue.
    #[must_use]
    pub fn run_guarded(&self, input: &FieldInput) -> Validation {
        match catch_unwind(AssertUnwindSafe(|| self.run(input))) {
            Ok(result) => result,
            Err(payload) => {
                let cause = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "validation step panicked".to_string());
                Validation::failure(Issue::ValidationError { cause })
            }
        }
    }

    /// Chain another step after this field's validation.
    ///
    /// The step only runs on success and receives the produced value.
    /// The result is a new field with a fresh key.
    #[must_use]
    pub fn validate<F>(&self, step: F) -> Self
    where
        F: Fn(Value) -> Validation + Send + Sync + 'static,
    {
        let prev = Arc::clone(&self.inner.validate);
        Self::from_parts(
            FieldKey::fresh(),
            self.inner.kind,
            self.inner.children.clone(),
            Arc::new(move |input: &FieldInput| prev(input).and_then(&step)),
            self.inner.restore.clone(),
        )
    }

    /// Same field (same key) with children replaced by `update(children)`.
    #[must_use]
    pub fn with_children(&self, update: impl FnOnce(&FieldTree) -> FieldTree) -> Self {
        self.replace_children(update(&self.inner.children))
    }

    /// Same field (same key) with `children` as its children.
    #[must_use]
    pub fn replace_children(&self, children: FieldTree) -> Self {
        Self::from_parts(
            self.inner.key,
            self.inner.kind,
            children,
            Arc::clone(&self.inner.validate),
            self.inner.restore.clone(),
        )
    }

    /// Deep copy with fresh keys for this field and all its descendants.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self::from_parts(
            FieldKey::fresh(),
            self.inner.kind,
            self.inner.children.duplicate(),
            Arc::clone(&self.inner.validate),
            self.inner.restore.clone(),
        )
    }

    /// True when both handles point at the same node allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.inner.key == other.inner.key
    }
}

impl Eq for Field {}

impl std::hash::Hash for Field {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.key.hash(state);
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Field");
        s.field("key", &self.inner.key.raw())
            .field("kind", &self.inner.kind);
        if !self.inner.children.is_null() {
            s.field("children", &self.inner.children);
        }
        s.finish()
    }
}
