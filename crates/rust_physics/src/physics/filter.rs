//! Collision filters
//!
//! A [`Filter`] decides which colliders another collider (or a probe) may
//! interact with. Explicit skips always win over explicit onlys; an empty
//! only-set places no restriction.

use std::collections::BTreeSet;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::foundation::collections::ColliderHandle;

use super::collision_layers::{layer_index, Layer, MAX_LAYERS};

bitflags! {
    /// Kinds of collider a filter lets through
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ColliderKinds: u8 {
        /// Colliders that never move on their own
        const STATIC = 1 << 0;
        /// Dynamic bodies
        const DYNAMIC = 1 << 1;
        /// Colliders that only report overlaps
        const INTANGIBLE = 1 << 2;
    }
}

/// Set of layers, one bit per layer
///
/// Serialized as the list of member layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Layer>", from = "Vec<Layer>")]
pub struct LayerSet(u64);

impl From<LayerSet> for Vec<Layer> {
    fn from(set: LayerSet) -> Self {
        set.iter().collect()
    }
}

impl From<Vec<Layer>> for LayerSet {
    fn from(layers: Vec<Layer>) -> Self {
        Self::from_layers(layers)
    }
}

impl LayerSet {
    /// No layers
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every layer
    pub const fn all() -> Self {
        Self(u64::MAX)
    }

    /// Set holding the given layers
    pub fn from_layers(layers: impl IntoIterator<Item = Layer>) -> Self {
        let mut set = Self::empty();
        for layer in layers {
            set.insert(layer);
        }
        set
    }

    /// Add a layer
    pub fn insert(&mut self, layer: Layer) {
        self.0 |= 1 << layer_index(layer);
    }

    /// Remove a layer
    pub fn remove(&mut self, layer: Layer) {
        self.0 &= !(1 << layer_index(layer));
    }

    /// Membership test
    pub fn contains(&self, layer: Layer) -> bool {
        self.0 & (1 << layer_index(layer)) != 0
    }

    /// Whether no layer is set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Member layers in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Layer> + '_ {
        (0..MAX_LAYERS as Layer).filter(move |l| self.contains(*l))
    }
}

/// What the filter is asked about
#[derive(Debug, Clone, Copy)]
pub struct FilterCandidate {
    /// Collider handle
    pub handle: ColliderHandle,
    /// Layer of the collider
    pub layer: Layer,
    /// Kind flags of the collider
    pub kinds: ColliderKinds,
}

/// Collider/layer/kind filter used for passive collisions and queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    /// When non-empty, only these colliders pass
    #[serde(skip)]
    pub only_colliders: BTreeSet<ColliderHandle>,
    /// These colliders never pass
    #[serde(skip)]
    pub skip_colliders: BTreeSet<ColliderHandle>,
    /// When non-empty, only colliders on these layers pass
    pub only_layers: LayerSet,
    /// Colliders on these layers never pass
    pub skip_layers: LayerSet,
    /// Kinds that pass
    pub include: ColliderKinds,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            only_colliders: BTreeSet::new(),
            skip_colliders: BTreeSet::new(),
            only_layers: LayerSet::empty(),
            skip_layers: LayerSet::empty(),
            include: ColliderKinds::all(),
        }
    }
}

impl Filter {
    /// Filter that lets everything through
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether static colliders pass
    pub fn include_static(&mut self, include: bool) -> &mut Self {
        self.include.set(ColliderKinds::STATIC, include);
        self
    }

    /// Set whether dynamic bodies pass
    pub fn include_dynamic(&mut self, include: bool) -> &mut Self {
        self.include.set(ColliderKinds::DYNAMIC, include);
        self
    }

    /// Set whether intangible colliders pass
    pub fn include_intangible(&mut self, include: bool) -> &mut Self {
        self.include.set(ColliderKinds::INTANGIBLE, include);
        self
    }

    /// Whether `candidate` passes the filter
    pub fn allows(&self, candidate: &FilterCandidate) -> bool {
        if self.skip_colliders.contains(&candidate.handle) || self.skip_layers.contains(candidate.layer) {
            return false;
        }
        if !self.only_colliders.is_empty() && !self.only_colliders.contains(&candidate.handle) {
            return false;
        }
        if !self.only_layers.is_empty() && !self.only_layers.contains(candidate.layer) {
            return false;
        }
        if candidate.kinds.contains(ColliderKinds::INTANGIBLE) && !self.include.contains(ColliderKinds::INTANGIBLE) {
            return false;
        }
        let motion = candidate.kinds & (ColliderKinds::STATIC | ColliderKinds::DYNAMIC);
        self.include.intersects(motion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SlotMap;

    fn candidates() -> (ColliderHandle, ColliderHandle) {
        let mut handles: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        (handles.insert(()), handles.insert(()))
    }

    #[test]
    fn test_default_allows_everything() {
        let (a, _) = candidates();
        let filter = Filter::default();
        for kinds in [ColliderKinds::STATIC, ColliderKinds::DYNAMIC, ColliderKinds::STATIC | ColliderKinds::INTANGIBLE] {
            assert!(filter.allows(&FilterCandidate { handle: a, layer: 0, kinds }));
        }
    }

    #[test]
    fn test_skip_beats_only() {
        let (a, b) = candidates();
        let mut filter = Filter::default();
        filter.only_colliders.insert(a);
        filter.skip_colliders.insert(a);
        assert!(!filter.allows(&FilterCandidate { handle: a, layer: 0, kinds: ColliderKinds::DYNAMIC }));
        assert!(!filter.allows(&FilterCandidate { handle: b, layer: 0, kinds: ColliderKinds::DYNAMIC }));

        let mut layers = Filter::default();
        layers.only_layers = LayerSet::from_layers([3, 4]);
        layers.skip_layers.insert(4);
        assert!(layers.allows(&FilterCandidate { handle: b, layer: 3, kinds: ColliderKinds::DYNAMIC }));
        assert!(!layers.allows(&FilterCandidate { handle: b, layer: 4, kinds: ColliderKinds::DYNAMIC }));
        assert!(!layers.allows(&FilterCandidate { handle: b, layer: 5, kinds: ColliderKinds::DYNAMIC }));
    }

    #[test]
    fn test_out_of_range_layer_does_not_alias() {
        let mut set = LayerSet::empty();
        set.insert(70);
        assert!(set.contains(63));
        assert!(!set.contains(6));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![63]);

        set.remove(255);
        assert!(set.is_empty());
    }

    #[test]
    fn test_kind_flags() {
        let (a, _) = candidates();
        let mut filter = Filter::default();
        filter.include_static(false).include_intangible(false);
        assert!(!filter.allows(&FilterCandidate { handle: a, layer: 0, kinds: ColliderKinds::STATIC }));
        assert!(filter.allows(&FilterCandidate { handle: a, layer: 0, kinds: ColliderKinds::DYNAMIC }));
        let trigger = ColliderKinds::DYNAMIC | ColliderKinds::INTANGIBLE;
        assert!(!filter.allows(&FilterCandidate { handle: a, layer: 0, kinds: trigger }));
    }

    #[test]
    fn test_layer_set_iter() {
        let set = LayerSet::from_layers([9, 1, 63]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 9, 63]);
        assert!(LayerSet::all().contains(40));
    }
}
