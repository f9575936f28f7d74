//! Keyed typed scratch map for cross-pass resource handoff (spec.md §3,
//! §4.6.1's `get_blackboard`/`set_type`).

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A map from a well-known string key to a boxed `Any`, downcast by the
/// caller's expected type. Mirrors `RenderGraphBlackboard` in
/// `original_source`, which stores e.g. a `ForwardLightingData { hdrImage,
/// depthImage }` struct under its type name so a later pass can fetch it
/// without stringly-typed resource lookups.
#[derive(Default)]
pub struct Blackboard {
    entries: HashMap<String, (TypeId, Box<dyn Any + Send + Sync>)>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`, replacing any prior entry.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), (TypeId::of::<T>(), Box::new(value)));
    }

    /// Fetch `key`, returning `None` if absent or if it was stored under a
    /// different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        let (type_id, value) = self.entries.get(key)?;
        if *type_id != TypeId::of::<T>() {
            return None;
        }
        value.downcast_ref::<T>()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ForwardLightingData {
        hdr_image: u32,
        depth_image: u32,
    }

    #[test]
    fn roundtrips_a_typed_value_by_key() {
        let mut board = Blackboard::new();
        board.insert("forward_lighting", ForwardLightingData { hdr_image: 1, depth_image: 2 });
        let data = board.get::<ForwardLightingData>("forward_lighting").unwrap();
        assert_eq!(data.hdr_image, 1);
        assert_eq!(data.depth_image, 2);
    }

    #[test]
    fn mismatched_type_returns_none() {
        let mut board = Blackboard::new();
        board.insert("x", 42u32);
        assert!(board.get::<u64>("x").is_none());
    }

    #[test]
    fn missing_key_returns_none() {
        let board = Blackboard::new();
        assert!(board.get::<u32>("missing").is_none());
    }
}
