#![forbid(unsafe_code)]

//! Built-in field kinds.
//!
//! Every kind is a composition of smaller ones:
//!
//! ```text
//! value ─┬─ optional_string ─┬─ string
//!        │                   ├─ optional_number ── number
//!        │                   └─ checkbox
//!        └─ file ── non_empty_file
//! values
//! group(children)
//! repeat(child, count)
//! ```

use std::collections::BTreeMap;

use formtree_core::Path;

use crate::field::{Field, FieldInput, Validation};
use crate::issue::Issue;
use crate::tree::FieldTree;
use crate::value::Value;

impl Field {
    /// Zero or one raw entry. More than one is `UnexpectedMultipleValues`.
    #[must_use]
    pub fn value() -> Self {
        Field::new("value", FieldTree::Null, |input: &FieldInput| {
            match input.values.as_slice() {
                [] => Validation::Success(Value::Null),
                [entry] => Validation::Success(entry.clone().into()),
                _ => Validation::failure(Issue::UnexpectedMultipleValues),
            }
        })
    }

    /// Every raw entry as a list. Never fails.
    #[must_use]
    pub fn values() -> Self {
        Field::new("values", FieldTree::Null, |input: &FieldInput| {
            Validation::Success(Value::List(
                input.values.iter().cloned().map(Value::from).collect(),
            ))
        })
    }

    /// Text or null; files are `UnexpectedFile`.
    #[must_use]
    pub fn optional_string() -> Self {
        Field::value()
            .validate(|value| match value {
                Value::File(_) => Validation::failure(Issue::UnexpectedFile),
                other => Validation::Success(other),
            })
            .labeled("optional_string")
    }

    /// Required text.
    #[must_use]
    pub fn string() -> Self {
        Field::optional_string()
            .validate(require_present)
            .labeled("string")
    }

    /// Number or null. Empty text is null.
    #[must_use]
    pub fn optional_number() -> Self {
        Field::optional_string()
            .validate(|value| match value {
                Value::Text(text) => parse_number(&text),
                other => Validation::Success(other),
            })
            .labeled("optional_number")
    }

    /// Required number.
    #[must_use]
    pub fn number() -> Self {
        Field::optional_number()
            .validate(require_present)
            .labeled("number")
    }

    /// `true` when any entry is present, `false` otherwise.
    #[must_use]
    pub fn checkbox() -> Self {
        Field::optional_string()
            .validate(|value| Validation::success(!value.is_null()))
            .labeled("checkbox")
    }

    /// Required file entry.
    #[must_use]
    pub fn file() -> Self {
        Field::value()
            .validate(|value| match value {
                Value::File(file) => Validation::Success(Value::File(file)),
                Value::Null => Validation::failure(Issue::MissingField),
                _ => Validation::failure(Issue::UnexpectedString),
            })
            .labeled("file")
    }

    /// Required file with a non-zero size.
    #[must_use]
    pub fn non_empty_file() -> Self {
        Field::file()
            .validate(|value| match value {
                Value::File(file) if file.size == 0 => Validation::failure(Issue::EmptyFile),
                other => Validation::Success(other),
            })
            .labeled("non_empty_file")
    }

    /// A field whose value is the value of `children`.
    #[must_use]
    pub fn group(children: impl Into<FieldTree>) -> Self {
        Field::new("group", children, |input: &FieldInput| {
            Validation::Success(input.children.clone())
        })
    }

    /// `initial_count` duplicates of `child`; the value is the list of their
    /// values. The slot count follows the paths seen on restore.
    #[must_use]
    pub fn repeat(child: impl Into<FieldTree>, initial_count: usize) -> Self {
        let template = child.into();
        let slots: Vec<FieldTree> = (0..initial_count).map(|_| template.duplicate()).collect();
        Field::new("repeat", FieldTree::List(slots), |input: &FieldInput| {
            Validation::Success(input.children.clone())
        })
        .with_restore(move |paths| restore_repeat(&template, paths))
    }
}

fn require_present(value: Value) -> Validation {
    if value.is_null() {
        Validation::failure(Issue::MissingField)
    } else {
        Validation::Success(value)
    }
}

/// Empty text is null and blank text is zero. Decimal, exponent and
/// `0x`/`0o`/`0b` forms are accepted. Non-finite results are rejected.
fn parse_number(text: &str) -> Validation {
    if text.is_empty() {
        return Validation::Success(Value::Null);
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Validation::Success(Value::Number(0.0));
    }
    let parsed = match radix_digits(trimmed) {
        Some((radix, digits)) => parse_radix(digits, radix),
        None => trimmed.parse::<f64>().ok(),
    };
    match parsed {
        Some(n) if n.is_finite() => Validation::Success(Value::Number(n)),
        _ => Validation::failure(Issue::InvalidNumber {
            value: text.to_string(),
        }),
    }
}

fn radix_digits(text: &str) -> Option<(u32, &str)> {
    let (prefix, digits) = text.split_at_checked(2)?;
    match prefix {
        "0x" | "0X" => Some((16, digits)),
        "0o" | "0O" => Some((8, digits)),
        "0b" | "0B" => Some((2, digits)),
        _ => None,
    }
}

fn parse_radix(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
    })
}

/// One slot per index up to the highest index seen, each restored from the
/// paths below it.
fn restore_repeat(template: &FieldTree, paths: &[Path]) -> FieldTree {
    let mut by_index: BTreeMap<usize, Vec<Path>> = BTreeMap::new();
    for path in paths {
        let (head, rest) = path.split_head();
        if let Some(index) = head.and_then(|key| key.as_index()) {
            by_index.entry(index).or_default().push(rest);
        }
    }
    let size = by_index.keys().next_back().map_or(0, |last| last + 1);
    let slots = (0..size)
        .map(|index| {
            let slot = template.duplicate();
            match by_index.get(&index) {
                Some(paths) => slot.restore_from_paths(paths),
                None => slot,
            }
        })
        .collect();
    FieldTree::List(slots)
}
