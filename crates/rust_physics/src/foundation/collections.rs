//! Handle types and specialized collections
//!
//! Every engine object that user code can refer to lives in a slot map and is
//! addressed through a typed, generational key. Stale handles are detected
//! instead of aliasing a newer object.

pub use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// Handle to a collider (or body) owned by a [`crate::physics::World`]
    pub struct ColliderHandle;

    /// Handle to a constraint owned by a [`crate::physics::World`]
    pub struct ConstraintHandle;

    /// Handle to an event subscription
    pub struct SubscriptionHandle;

    /// Handle to a world owned by the [`crate::physics::PhysicsRegistry`]
    pub struct WorldId;
}

/// Unordered pair of colliders, stored with the smaller handle first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderPair {
    /// Smaller handle
    pub a: ColliderHandle,
    /// Larger handle
    pub b: ColliderHandle,
}

impl ColliderPair {
    /// Build a canonical pair from two handles in any order
    pub fn new(first: ColliderHandle, second: ColliderHandle) -> Self {
        if first <= second {
            Self { a: first, b: second }
        } else {
            Self { a: second, b: first }
        }
    }

    /// Whether the pair contains `handle`
    pub fn contains(&self, handle: ColliderHandle) -> bool {
        self.a == handle || self.b == handle
    }

    /// The other member of the pair, if `handle` is a member
    pub fn other(&self, handle: ColliderHandle) -> Option<ColliderHandle> {
        if self.a == handle {
            Some(self.b)
        } else if self.b == handle {
            Some(self.a)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_order_independent() {
        let mut map: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let h1 = map.insert(());
        let h2 = map.insert(());

        assert_eq!(ColliderPair::new(h1, h2), ColliderPair::new(h2, h1));
        assert_eq!(ColliderPair::new(h2, h1).other(h1), Some(h2));
        assert!(ColliderPair::new(h1, h2).contains(h2));
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut map: SlotMap<ColliderHandle, u32> = SlotMap::with_key();
        let old = map.insert(1);
        map.remove(old);
        let new = map.insert(2);

        assert!(map.get(old).is_none());
        assert_eq!(map.get(new), Some(&2));
    }
}
