#![forbid(unsafe_code)]

//! Per-field runtime state and the form snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use formtree_core::{FieldKey, KeyedMap, Path};

use crate::field::{Field, FieldInput};
use crate::issue::Issue;
use crate::tree::FieldTree;
use crate::value::Value;

/// Runtime state of one field, keyed by its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    /// Identity of the field this state belongs to.
    pub key: FieldKey,
    /// Path including the form name as first key.
    pub path: Path,
    /// Serialized `path`; the name raw entries are read from.
    pub name: String,
    /// This field's key plus every descendant key.
    pub keys: Arc<HashSet<FieldKey>>,
    /// Input captured at mount or reset.
    pub initial_raw: Option<FieldInput>,
    /// Input used by the last validation.
    pub raw: Option<FieldInput>,
    /// Validated value; `None` when failed or unknown.
    pub value: Option<Value>,
    /// Issues from validation or from outside; `None` when there are none.
    pub issues: Option<Vec<Issue>>,
    /// `issues`, but only once the field is touched.
    pub touched_issues: Option<Vec<Issue>>,
    /// Issues came from `SetIssues` or initial issues, not validation.
    pub has_external_issues: bool,
    /// The field has received an input snapshot.
    pub is_mounted: bool,
    /// The user interacted with the field since mount or reset.
    pub is_touched: bool,
    /// `raw` differs from `initial_raw`.
    pub is_dirty: bool,
    /// A submit happened since mount or reset.
    pub is_submitted: bool,
}

impl FieldState {
    /// Fresh, unmounted state. `issues` seeds external issues.
    #[must_use]
    pub fn new(field: &Field, path: Path, keys: Arc<HashSet<FieldKey>>, issues: Option<Vec<Issue>>) -> Self {
        let name = path.serialize().to_string();
        Self {
            key: field.key(),
            path,
            name,
            keys,
            initial_raw: None,
            raw: None,
            value: None,
            has_external_issues: issues.is_some(),
            touched_issues: issues.clone(),
            issues,
            is_mounted: false,
            is_touched: false,
            is_dirty: false,
            is_submitted: false,
        }
    }

    /// The value children see: only for mounted fields without issues.
    #[must_use]
    pub fn resolved_value(&self) -> Option<&Value> {
        if !self.is_mounted || self.issues.is_some() {
            return None;
        }
        self.value.as_ref()
    }

    /// Whether this field alone counts as an error for `has_errors`.
    #[must_use]
    pub fn has_error(&self) -> bool {
        !self.is_mounted || self.issues.is_some()
    }
}

/// Immutable snapshot of a form: the root field and every field's state.
#[derive(Debug, Clone)]
pub struct FormState {
    /// Root of the tree, possibly an implicit group.
    pub root_field: Field,
    /// The caller's tree was not a single field and got an implicit group.
    pub root_field_wrapped: bool,
    /// One state per field in the tree.
    pub states: KeyedMap<FieldKey, FieldState>,
}

impl FormState {
    /// The tree as the caller supplied it.
    #[must_use]
    pub fn tree(&self) -> FieldTree {
        FieldTree::unwrap_root(&self.root_field, self.root_field_wrapped)
    }

    /// State of the root field.
    #[must_use]
    pub fn root_state(&self) -> Option<&FieldState> {
        self.states.get(&self.root_field.key())
    }

    /// State of `field`, if it is part of the tree.
    #[must_use]
    pub fn field_state(&self, field: &Field) -> Option<&FieldState> {
        self.states.get(&field.key())
    }
}
