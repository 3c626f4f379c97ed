#![forbid(unsafe_code)]

//! Stable field identities.
//!
//! Every field gets a [`FieldKey`] when it is built. Keys never repeat within
//! a process, so a field can be recognized across tree rebuilds no matter
//! where it moves.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey(u64);

impl FieldKey {
    /// Allocate a key that has not been handed out before.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value. Intended for tests and diagnostics.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldKey({})", self.0)
    }
}
