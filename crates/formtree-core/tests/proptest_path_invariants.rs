//! Property-based invariant tests for paths and the keyed map.
//!
//! 1. `parse(serialize(p)) == p` for paths built from valid keys.
//! 2. Serialization never produces a leading `.`.
//! 3. `prepend` then `shift` returns the original path.
//! 4. `split_head` recombines into the original path.
//! 5. A draft with no effective writes commits to the same snapshot.
//! 6. Commit keeps exactly the live keys that have a value.

use std::collections::HashSet;
use std::sync::Arc;

use formtree_core::{KeyedMap, Path, PathKey};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn key_strategy() -> impl Strategy<Value = PathKey> {
    prop_oneof![
        (0usize..1_000_000).prop_map(PathKey::Index),
        "[A-Za-z0-9$=_-]{1,8}".prop_map(PathKey::Name),
    ]
}

fn path_strategy() -> impl Strategy<Value = Path> {
    prop::collection::vec(key_strategy(), 0..8).prop_map(|keys| Path::from_raw(&keys))
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Round-trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn parse_inverts_serialize(path in path_strategy()) {
        let text = path.serialize().to_string();
        let parsed = Path::parse(&text);
        prop_assert!(parsed.is_ok(), "failed to parse {:?}", text);
        prop_assert_eq!(parsed.unwrap(), path);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Shape of the serialized form
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn serialized_never_starts_with_dot(path in path_strategy()) {
        prop_assert!(!path.serialize().starts_with('.'));
        prop_assert!(!path.serialize().contains(".."));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3–4. Head manipulation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn prepend_then_shift(path in path_strategy(), head in key_strategy()) {
        let full = path.prepend([head.clone()]);
        prop_assert_eq!(full.head(), Some(&head));
        prop_assert_eq!(full.shift(), path);
    }

    #[test]
    fn split_head_recombines(path in path_strategy()) {
        let (head, tail) = path.split_head();
        let rebuilt = match head {
            Some(head) => tail.prepend([head]),
            None => tail,
        };
        prop_assert_eq!(rebuilt, path);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5–6. Keyed map drafts
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn rewriting_same_arcs_keeps_snapshot(entries in prop::collection::hash_map(0u32..64, any::<i32>(), 0..16)) {
        let map: KeyedMap<u32, i32> = entries.into_iter().collect();
        let mut draft = map.draft();
        let keys: Vec<u32> = map.keys().copied().collect();
        for key in &keys {
            let current = draft.get(key).unwrap();
            draft.set(*key, current);
        }
        prop_assert!(draft.commit(keys).ptr_eq(&map));
    }

    #[test]
    fn commit_keeps_live_keys(
        entries in prop::collection::hash_map(0u32..64, any::<i32>(), 0..16),
        live in prop::collection::hash_set(0u32..64, 0..16),
        extra in 64u32..128,
    ) {
        let map: KeyedMap<u32, i32> = entries.clone().into_iter().collect();
        let mut draft = map.draft();
        draft.set(extra, Arc::new(0));
        let mut live_all: HashSet<u32> = live.clone();
        live_all.insert(extra);
        let next = draft.commit(live_all.iter().copied());

        for key in next.keys() {
            prop_assert!(live_all.contains(key));
        }
        for key in &live {
            prop_assert_eq!(next.contains_key(key), entries.contains_key(key));
        }
        prop_assert!(next.contains_key(&extra));
    }
}
