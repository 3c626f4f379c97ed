#![forbid(unsafe_code)]

//! Adapter for external schema validators.
//!
//! A [`Schema`] takes the value produced so far and either returns the
//! (possibly transformed) value or a list of [`SchemaIssue`]s. Plug one into
//! a field with [`Field::schema`].

use std::sync::Arc;

use formtree_core::RawPath;

use crate::field::{Field, Validation};
use crate::issue::Issue;
use crate::value::Value;

/// One problem reported by a schema, relative to the checked value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub code: String,
    pub message: String,
    pub path: RawPath,
}

impl SchemaIssue {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: RawPath::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, path: RawPath) -> Self {
        self.path = path;
        self
    }
}

impl From<SchemaIssue> for Issue {
    fn from(issue: SchemaIssue) -> Self {
        Issue::Schema {
            code: issue.code,
            message: issue.message,
            path: issue.path,
        }
    }
}

pub trait Schema: Send + Sync {
    fn parse(&self, value: Value) -> Result<Value, Vec<SchemaIssue>>;
}

impl<F> Schema for F
where
    F: Fn(Value) -> Result<Value, Vec<SchemaIssue>> + Send + Sync,
{
    fn parse(&self, value: Value) -> Result<Value, Vec<SchemaIssue>> {
        self(value)
    }
}

impl Field {
    /// Run `schema` as the next validation step.
    #[must_use]
    pub fn schema<S: Schema + 'static>(&self, schema: S) -> Self {
        let schema = Arc::new(schema);
        self.validate(move |value| match schema.parse(value) {
            Ok(parsed) => Validation::Success(parsed),
            Err(issues) => Validation::Failure(issues.into_iter().map(Issue::from).collect()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldInput;
    use crate::value::Entry;
    use formtree_core::PathKey;

    struct Slug;

    impl Schema for Slug {
        fn parse(&self, value: Value) -> Result<Value, Vec<SchemaIssue>> {
            match value.as_str() {
                Some(s) if s.chars().all(|c| c.is_ascii_lowercase() || c == '-') => {
                    Ok(Value::from(s.to_string()))
                }
                _ => Err(vec![SchemaIssue::new("slug", "Not a slug")]),
            }
        }
    }

    fn run(field: &Field, text: &str) -> Validation {
        field.run(&FieldInput::new(vec![Entry::from(text)], Value::Null))
    }

    #[test]
    fn schema_success_and_failure() {
        let field = Field::string().schema(Slug);
        assert_eq!(run(&field, "my-post"), Validation::success("my-post"));
        assert_eq!(
            run(&field, "My Post"),
            Validation::failure(Issue::Schema {
                code: "slug".into(),
                message: "Not a slug".into(),
                path: vec![],
            })
        );
    }

    #[test]
    fn closure_schema_can_transform() {
        let field = Field::string().schema(|value: Value| match value {
            Value::Text(s) => Ok(Value::from(s.trim().to_string())),
            other => Err(vec![
                SchemaIssue::new("type", format!("unexpected {other}")).at(vec![PathKey::from("x")]),
            ]),
        });
        assert_eq!(run(&field, "  hi "), Validation::success("hi"));
    }
}
