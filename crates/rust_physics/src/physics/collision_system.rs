//! Collision detection and touch tracking
//!
//! The collision system is split into two phases. The broad phase asks the
//! spatial query for simulated units (plain colliders and compound roots)
//! whose swept bounds overlap. The narrow phase tests the units part by part,
//! so every child of a compound keeps its own filter, layer and events.
//!
//! Touches are keyed by the pair of source colliders. A touch gets a fresh
//! [`TouchId`] when it starts and keeps it until the pair stops touching or
//! one side is removed.

use std::collections::{BTreeMap, BTreeSet};

use crate::events::{sort_for_delivery, Contact, EventKind, PhysicsEvent, TouchId, TouchPhase, TouchRecord};
use crate::foundation::collections::{ColliderHandle, ColliderPair, SlotMap};
use crate::foundation::math::{Iso, Vec3};
use crate::physics::collision::{contacts, RawContact, Shape, AABB};
use crate::spatial::spatial_query::SpatialQuery;

use super::collider::Collider;
use super::settings::WorldSettings;

/// One piece of a unit's collision geometry
#[derive(Debug, Clone, Copy)]
pub(crate) struct PartRef<'a> {
    /// Collider the geometry belongs to
    pub source: ColliderHandle,
    /// Scaled shape
    pub shape: &'a Shape,
    /// Pose relative to the unit
    pub local: Iso,
}

/// Collision geometry of a simulated unit
pub(crate) fn unit_parts(handle: ColliderHandle, collider: &Collider) -> Vec<PartRef<'_>> {
    match &collider.compound {
        Some(compound) => compound
            .parts()
            .iter()
            .map(|p| PartRef { source: p.source, shape: &p.shape, local: p.local })
            .collect(),
        None => vec![PartRef { source: handle, shape: collider.scaled_shape(), local: Iso::identity() }],
    }
}

/// Current world bounds of a unit
pub(crate) fn unit_bounds(collider: &Collider) -> AABB {
    match &collider.compound {
        Some(compound) => compound.local_aabb().transformed(&collider.pose()),
        None => collider.world_aabb(),
    }
}

/// Bounds covering a unit's motion over `dt`, grown by `margin`
pub(crate) fn swept_bounds(collider: &Collider, dt: f32, margin: f32) -> AABB {
    let bounds = unit_bounds(collider);
    let spin = collider.angular_velocity.norm() * bounds.bounding_radius() * dt;
    bounds
        .swept(&(collider.linear_velocity * dt))
        .expanded(margin + spin)
}

/// Whether two colliders may interact: both filters and the layer matrix
/// must agree
pub(crate) fn interacts(
    colliders: &SlotMap<ColliderHandle, Collider>,
    settings: &WorldSettings,
    a: ColliderHandle,
    b: ColliderHandle,
) -> bool {
    let (Some(ca), Some(cb)) = (colliders.get(a), colliders.get(b)) else {
        return false;
    };
    let filter_a = ca.filter.as_ref().unwrap_or(&settings.default_filter);
    let filter_b = cb.filter.as_ref().unwrap_or(&settings.default_filter);
    settings.layer_matrix.can_collide(ca.layer, cb.layer)
        && filter_a.allows(&cb.candidate(b))
        && filter_b.allows(&ca.candidate(a))
}

/// Contacts found between two source colliders during a step
#[derive(Debug, Clone)]
pub struct ContactManifold {
    /// Source colliders
    pub pair: ColliderPair,
    /// Simulated units of `pair.a` and `pair.b`
    pub units: (ColliderHandle, ColliderHandle),
    /// Whether either side is intangible
    pub overlap: bool,
    /// Contacts with A = `pair.a`, closer than the speculative margin
    pub contacts: Vec<RawContact>,
    /// Normal impulse per contact, filled in by the solver
    pub impulses: Vec<f32>,
}

impl ContactManifold {
    /// Smallest separation
    pub fn min_separation(&self) -> f32 {
        self.contacts
            .iter()
            .map(|c| c.separation)
            .fold(f32::INFINITY, f32::min)
    }
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    id: TouchId,
    overlap: bool,
}

/// Core collision detection system
///
/// Owns the broad-phase spatial structure and the set of live touches.
pub struct CollisionSystem {
    /// Spatial partitioning structure for the broad phase
    spatial_query: Box<dyn SpatialQuery>,

    /// Touches alive after the last step
    touches: BTreeMap<ColliderPair, Touch>,

    next_touch_id: u64,
}

impl std::fmt::Debug for CollisionSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionSystem")
            .field("indexed", &self.spatial_query.entity_count())
            .field("touches", &self.touches.len())
            .finish()
    }
}

impl CollisionSystem {
    /// Create a collision system over the given spatial query
    pub fn new(spatial_query: Box<dyn SpatialQuery>) -> Self {
        Self {
            spatial_query,
            touches: BTreeMap::new(),
            next_touch_id: 1,
        }
    }

    /// Broad-phase structure, also used by probes
    pub fn spatial_query(&self) -> &dyn SpatialQuery {
        self.spatial_query.as_ref()
    }

    /// Insert or move a unit in the broad phase
    pub fn update_bounds(&mut self, handle: ColliderHandle, bounds: AABB) {
        if self.spatial_query.bounds(handle).is_some() {
            self.spatial_query.update(handle, bounds);
        } else {
            self.spatial_query.insert(handle, bounds);
        }
    }

    /// Swap the broad-phase structure; callers re-register every unit
    pub fn set_spatial_query(&mut self, spatial_query: Box<dyn SpatialQuery>) {
        self.spatial_query = spatial_query;
    }

    /// Take a unit out of the broad phase
    pub fn unregister(&mut self, handle: ColliderHandle) {
        self.spatial_query.remove(handle);
    }

    /// Number of live touches
    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }

    /// Whether the pair of source colliders is touching
    pub fn is_touching(&self, a: ColliderHandle, b: ColliderHandle) -> bool {
        self.touches.contains_key(&ColliderPair::new(a, b))
    }

    /// Candidate unit pairs whose indexed bounds overlap, in handle order
    ///
    /// Pairs listed in `joined` are held together by a constraint and never
    /// collide.
    pub fn broad_phase(
        &self,
        colliders: &SlotMap<ColliderHandle, Collider>,
        joined: &BTreeSet<ColliderPair>,
    ) -> Vec<ColliderPair> {
        let mut pairs = BTreeSet::new();

        for (handle, collider) in colliders {
            if collider.merged_into.is_some() {
                continue;
            }
            let Some(bounds) = self.spatial_query.bounds(handle) else {
                continue;
            };

            for other in self.spatial_query.query_aabb(&bounds) {
                if other == handle {
                    continue;
                }
                let pair = ColliderPair::new(handle, other);
                if !joined.contains(&pair) {
                    pairs.insert(pair);
                }
            }
        }

        pairs.into_iter().collect()
    }

    /// Exact tests of the candidate unit pairs
    pub fn narrow_phase(
        &self,
        colliders: &SlotMap<ColliderHandle, Collider>,
        settings: &WorldSettings,
        unit_pairs: &[ColliderPair],
        dt: f32,
    ) -> Vec<ContactManifold> {
        let mut manifolds = Vec::new();

        for unit_pair in unit_pairs {
            let (Some(unit_a), Some(unit_b)) = (colliders.get(unit_pair.a), colliders.get(unit_pair.b)) else {
                continue;
            };
            let both_fixed = !unit_a.is_dynamic() && !unit_b.is_dynamic();
            let (pose_a, pose_b) = (unit_a.pose(), unit_b.pose());

            let relative_speed = (unit_a.linear_velocity - unit_b.linear_velocity).norm()
                + unit_a.angular_velocity.norm() * unit_bounds(unit_a).bounding_radius()
                + unit_b.angular_velocity.norm() * unit_bounds(unit_b).bounding_radius();
            let margin = settings.contact_tolerance + relative_speed * dt;

            for part_a in unit_parts(unit_pair.a, unit_a) {
                for part_b in unit_parts(unit_pair.b, unit_b) {
                    let overlap = is_intangible(colliders, part_a.source) || is_intangible(colliders, part_b.source);
                    if both_fixed && !overlap {
                        continue;
                    }
                    if !interacts(colliders, settings, part_a.source, part_b.source) {
                        continue;
                    }

                    let world_a = pose_a * part_a.local;
                    let world_b = pose_b * part_b.local;
                    let bounds_a = part_a.shape.local_aabb().transformed(&world_a).expanded(margin);
                    if !bounds_a.intersects(&part_b.shape.local_aabb().transformed(&world_b)) {
                        continue;
                    }

                    let found = contacts(part_a.shape, &world_a, part_b.shape, &world_b, margin);
                    if found.is_empty() {
                        continue;
                    }

                    let pair = ColliderPair::new(part_a.source, part_b.source);
                    let (found, units) = if pair.a == part_a.source {
                        (found, (unit_pair.a, unit_pair.b))
                    } else {
                        (found.iter().map(RawContact::flipped).collect(), (unit_pair.b, unit_pair.a))
                    };
                    manifolds.push(ContactManifold {
                        pair,
                        units,
                        overlap,
                        impulses: vec![0.0; found.len()],
                        contacts: found,
                    });
                }
            }
        }

        log::trace!("Narrow phase: {} candidate pairs, {} manifolds", unit_pairs.len(), manifolds.len());
        manifolds
    }

    /// Turn this step's manifolds into Enter/Stay/Exit events
    ///
    /// Collisions count as touching within `contact_tolerance`; overlaps
    /// only while the shapes actually intersect.
    pub fn update_touches(&mut self, manifolds: &[ContactManifold], contact_tolerance: f32) -> Vec<PhysicsEvent> {
        let mut current = BTreeMap::new();
        let mut events = Vec::new();

        for manifold in manifolds {
            let threshold = if manifold.overlap { 0.0 } else { contact_tolerance };
            if manifold.min_separation() > threshold {
                continue;
            }
            let reported: Vec<Contact> = if manifold.overlap {
                Vec::new()
            } else {
                manifold
                    .contacts
                    .iter()
                    .zip(manifold.impulses.iter().chain(std::iter::repeat(&0.0)))
                    .filter(|(c, _)| c.separation <= threshold)
                    .map(|(c, impulse)| Contact {
                        position: c.position(),
                        normal: c.normal,
                        distance: c.separation,
                        impulse: *impulse,
                    })
                    .collect()
            };

            let (touch, phase) = match self.touches.remove(&manifold.pair) {
                Some(previous) if previous.overlap == manifold.overlap => (previous, TouchPhase::Stay),
                Some(previous) => {
                    // Tangibility changed mid-touch: end the old touch
                    events.extend(pair_events(TouchPhase::Exit, previous, manifold.pair, &[]));
                    (self.begin_touch(manifold.pair, manifold.overlap), TouchPhase::Enter)
                }
                None => (self.begin_touch(manifold.pair, manifold.overlap), TouchPhase::Enter),
            };
            events.extend(pair_events(phase, touch, manifold.pair, &reported));
            current.insert(manifold.pair, touch);
        }

        for (pair, touch) in std::mem::replace(&mut self.touches, current) {
            log::debug!("Touch {:?} ended between {:?} and {:?}", touch.id, pair.a, pair.b);
            events.extend(pair_events(TouchPhase::Exit, touch, pair, &[]));
        }

        sort_for_delivery(&mut events);
        events
    }

    /// End every touch involving `handle`
    pub fn remove_collider(&mut self, handle: ColliderHandle) -> Vec<PhysicsEvent> {
        let ended: Vec<ColliderPair> = self.touches.keys().filter(|p| p.contains(handle)).copied().collect();
        let mut events = Vec::new();
        for pair in ended {
            if let Some(touch) = self.touches.remove(&pair) {
                events.extend(pair_events(TouchPhase::Exit, touch, pair, &[]));
            }
        }
        self.spatial_query.remove(handle);
        sort_for_delivery(&mut events);
        events
    }

    /// End every touch
    pub fn clear_touches(&mut self) -> Vec<PhysicsEvent> {
        let mut events: Vec<PhysicsEvent> = std::mem::take(&mut self.touches)
            .into_iter()
            .flat_map(|(pair, touch)| pair_events(TouchPhase::Exit, touch, pair, &[]))
            .collect();
        sort_for_delivery(&mut events);
        events
    }

    fn begin_touch(&mut self, pair: ColliderPair, overlap: bool) -> Touch {
        let id = TouchId(self.next_touch_id);
        self.next_touch_id += 1;
        log::debug!(
            "{} {:?} started between {:?} and {:?}",
            if overlap { "Overlap" } else { "Collision" },
            id,
            pair.a,
            pair.b
        );
        Touch { id, overlap }
    }
}

fn is_intangible(colliders: &SlotMap<ColliderHandle, Collider>, handle: ColliderHandle) -> bool {
    colliders.get(handle).map_or(false, Collider::is_intangible)
}

/// The two events of one touch, one per receiver
///
/// `contacts` are seen from `pair.a`; the copy for `pair.b` has its normals
/// flipped.
fn pair_events(phase: TouchPhase, touch: Touch, pair: ColliderPair, contacts: &[Contact]) -> [PhysicsEvent; 2] {
    let kind = EventKind::new(phase, touch.overlap);
    let flipped: Vec<Contact> = contacts
        .iter()
        .map(|c| Contact { normal: -c.normal, ..*c })
        .collect();
    [
        PhysicsEvent {
            kind,
            receiver: pair.a,
            record: TouchRecord { id: touch.id, collider: pair.b, contact_count: contacts.len(), contacts: contacts.to_vec() },
        },
        PhysicsEvent {
            kind,
            receiver: pair.b,
            record: TouchRecord { id: touch.id, collider: pair.a, contact_count: flipped.len(), contacts: flipped },
        },
    ]
}

/// Mean contact normal from `pair.a` toward `pair.b`
pub(crate) fn manifold_normal(manifold: &ContactManifold) -> Vec3 {
    let sum: Vec3 = manifold.contacts.iter().map(|c| c.normal).sum();
    sum.try_normalize(1.0e-6)
        .or_else(|| manifold.contacts.first().map(|c| c.normal))
        .unwrap_or_else(Vec3::y)
}
