#![forbid(unsafe_code)]

//! Structural and usage faults.
//!
//! Validation problems are *data* ([`Issue`](crate::Issue)) and never show
//! up here. A [`FormError`] means the tree was misused (a field reused at two
//! paths, a lookup of a field the tree does not contain) or a controller
//! operation was called in the wrong lifecycle phase.

use formtree_core::{FieldKey, KeyedMapError, Path, PathError};
use thiserror::Error;

/// Every fault the engine can raise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// A name or path failed to parse or validate.
    #[error(transparent)]
    Path(#[from] PathError),

    /// A keyed-map lookup failed.
    #[error(transparent)]
    Map(#[from] KeyedMapError),

    /// The same field identity was reached twice in one traversal.
    #[error("field {key} appears at both \"{first}\" and \"{second}\"")]
    DuplicateKey {
        key: FieldKey,
        /// Form-prefixed path of the first occurrence.
        first: Path,
        /// Form-prefixed path of the second occurrence.
        second: Path,
    },

    /// A field was found at more than one path while resolving its location.
    #[error("field {key} is used at {} paths", paths.len())]
    ReusedField { key: FieldKey, paths: Vec<Path> },

    /// Lookup of a field the tree does not contain.
    #[error("field {key} is not part of the tree")]
    FieldNotFound { key: FieldKey },

    /// The tree holds a field the state map has no entry for.
    #[error("no state registered for field {key}")]
    MissingFieldState { key: FieldKey },

    /// A controller operation needs a bound form target.
    #[error("form \"{form}\" is not bound to a target")]
    MissingFormRef { form: String },

    /// The root value was read before the form was mounted.
    #[error("form \"{form}\" has not been mounted")]
    GetValueUnmountedForm { form: String },

    /// The root value was read while some field is still unresolved.
    #[error("value of form \"{form}\" is not resolved")]
    GetValueUnresolved { form: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_errors_convert() {
        let err: FormError = PathError::EmptyPathSplit.into();
        assert_eq!(err.to_string(), "cannot split head of empty path");
    }

    #[test]
    fn reused_field_message_counts_paths() {
        let err = FormError::ReusedField {
            key: FieldKey::from_raw(3),
            paths: vec![Path::from_keys(["a"]), Path::from_keys(["b"])],
        };
        assert_eq!(err.to_string(), "field FieldKey(3) is used at 2 paths");
    }

    #[test]
    fn duplicate_key_names_both_paths() {
        let err = FormError::DuplicateKey {
            key: FieldKey::from_raw(1),
            first: Path::from_keys(["form", "a"]),
            second: Path::from_keys(["form", "b"]),
        };
        assert_eq!(
            err.to_string(),
            "field FieldKey(1) appears at both \"form.a\" and \"form.b\""
        );
    }
}
