#![forbid(unsafe_code)]

//! Form-state engine.
//!
//! A form is a tree of [`Field`]s. Each field turns its raw entries (and the
//! values of its children) into a [`Value`] or a list of [`Issue`]s. The
//! [`FormStore`] keeps one immutable [`FormState`] snapshot and replaces it
//! on every [`Action`]; [`FormController`] wires the store to a form target.
//!
//! - [`field`] / [`kinds`] - field identity, validation chaining, built-in kinds
//! - [`tree`] - field trees: traversal, lookup, reshape from submitted names
//! - [`schema`] - adapter for external schema validators
//! - [`store`] - the reducer and snapshot store
//! - [`controller`] - event routing, results, one-shot [`validate_form`]
//!
//! ```ignore
//! use formtree::{ControllerOptions, Field, FieldTree, FormData, validate_form};
//!
//! let fields = FieldTree::record([
//!     ("name", Field::string().into()),
//!     ("age", Field::number().into()),
//! ]);
//! let data = FormData::new()
//!     .with("signup.name", "Ada")
//!     .with("signup.age", "36");
//! let result = validate_form(ControllerOptions::new("signup", fields), data)?;
//! assert!(result.is_success());
//! ```

pub mod controller;
pub mod error;
pub mod field;
pub mod issue;
pub mod kinds;
pub mod schema;
pub mod state;
pub mod store;
pub mod tree;
pub mod value;

pub use controller::{
    ControllerOptions, FormController, FormEvent, FormResult, FormTarget, OnReset, OnSubmit,
    SubmitOutcome, validate_form,
};
pub use error::FormError;
pub use field::{Field, FieldInput, Validation};
pub use formtree_core::{FieldKey, KeyedMap, Path, PathError, PathKey, RawPath};
pub use issue::{Issue, Issues, IssuesBuilder, IssuesItem};
pub use schema::{Schema, SchemaIssue};
pub use state::{FieldState, FormState};
pub use store::{Action, FieldsUpdate, FormStore, SubscriptionId};
pub use tree::{FieldTree, Next};
pub use value::{Entry, FileEntry, FormData, Value};
