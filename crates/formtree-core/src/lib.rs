#![forbid(unsafe_code)]

//! Building blocks for formtree: paths, field keys, and the copy-on-write
//! keyed map that holds per-field state.

pub mod key;
pub mod keyed_map;
pub mod path;

pub use key::FieldKey;
pub use keyed_map::{KeyedMap, KeyedMapDraft, KeyedMapError};
pub use path::{MAX_SAFE_INDEX, Path, PathError, PathKey, RawPath};
