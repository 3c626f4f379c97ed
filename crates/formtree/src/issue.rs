#![forbid(unsafe_code)]

//! Typed validation issues and path-addressed issue lists.

use std::fmt;

use formtree_core::{FieldKey, RawPath};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::field::Field;
use crate::tree::FieldTree;

/// A single validation failure. Serialized with a `kind` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Issue {
    /// The field never received an input snapshot.
    FieldNotMounted,
    /// A validation step panicked; `cause` is the panic message.
    ValidationError { cause: String },
    /// A required field has no entry.
    MissingField,
    /// More than one entry under a single-value field.
    UnexpectedMultipleValues,
    /// A file where text was expected.
    UnexpectedFile,
    /// Text where a file was expected.
    UnexpectedString,
    /// Text that does not read as a number; `value` is the raw text.
    InvalidNumber { value: String },
    /// A required file has zero size.
    EmptyFile,
    /// A [`Schema`](crate::schema::Schema) rejected the value.
    Schema {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: RawPath,
    },
    /// Application-defined issue, usually added through [`IssuesBuilder`].
    Custom { code: String, message: String },
}

impl Issue {
    /// Shorthand for [`Issue::Custom`].
    #[must_use]
    pub fn custom(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Custom {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The stable kind name, as written in the `kind` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FieldNotMounted => "FieldNotMounted",
            Self::ValidationError { .. } => "ValidationError",
            Self::MissingField => "MissingField",
            Self::UnexpectedMultipleValues => "UnexpectedMultipleValues",
            Self::UnexpectedFile => "UnexpectedFile",
            Self::UnexpectedString => "UnexpectedString",
            Self::InvalidNumber { .. } => "InvalidNumber",
            Self::EmptyFile => "EmptyFile",
            Self::Schema { .. } => "Schema",
            Self::Custom { .. } => "Custom",
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldNotMounted => f.write_str("field is not mounted"),
            Self::ValidationError { cause } => write!(f, "validation failed: {cause}"),
            Self::MissingField => f.write_str("field is required"),
            Self::UnexpectedMultipleValues => f.write_str("expected a single value"),
            Self::UnexpectedFile => f.write_str("expected text, got a file"),
            Self::UnexpectedString => f.write_str("expected a file, got text"),
            Self::InvalidNumber { value } => write!(f, "\"{value}\" is not a number"),
            Self::EmptyFile => f.write_str("file is empty"),
            Self::Schema { message, .. } | Self::Custom { message, .. } => f.write_str(message),
        }
    }
}

/// Issues attached to one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuesItem {
    pub path: RawPath,
    pub issues: Vec<Issue>,
}

impl IssuesItem {
    #[must_use]
    pub fn new(path: RawPath, issues: Vec<Issue>) -> Self {
        Self { path, issues }
    }
}

pub type Issues = Vec<IssuesItem>;

// ---------------------------------------------------------------------------
// IssuesBuilder
// ---------------------------------------------------------------------------

/// Collects issues per field and resolves them to paths on demand.
///
/// Paths are resolved against the tree the builder was created with, so a
/// field that is not part of that tree (or appears in it twice) is an error.
#[derive(Debug, Clone)]
pub struct IssuesBuilder {
    tree: FieldTree,
    fields: IndexMap<FieldKey, (Field, Vec<Issue>)>,
}

impl IssuesBuilder {
    #[must_use]
    pub fn new(tree: FieldTree) -> Self {
        Self {
            tree,
            fields: IndexMap::new(),
        }
    }

    /// Attach `issue` to `field`.
    pub fn add(&mut self, field: &Field, issue: Issue) {
        self.fields
            .entry(field.key())
            .or_insert_with(|| (field.clone(), Vec::new()))
            .1
            .push(issue);
    }

    #[must_use]
    pub fn has_issues(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Resolve collected issues to path-addressed items, in insertion order.
    pub fn get_issues(&self) -> Result<Issues, FormError> {
        let mut items = Vec::with_capacity(self.fields.len());
        for (field, issues) in self.fields.values() {
            if issues.is_empty() {
                continue;
            }
            let path = self
                .tree
                .field_path(field)?
                .ok_or(FormError::FieldNotFound { key: field.key() })?;
            items.push(IssuesItem::new(path.to_raw(), issues.clone()));
        }
        Ok(items)
    }
}
