//! Collision and overlap events
//!
//! Key principles:
//! - Every live touch between two colliders has an id, unique for the
//!   lifetime of the touch
//! - Enter fires once when a touch starts, Stay on every following step,
//!   Exit once when it ends (separation or destruction)
//! - Within a step, all Enters are delivered before all Stays, and all
//!   Stays before all Exits
//! - Handlers subscribe per collider and per event kind and get an explicit
//!   [`SubscriptionHandle`] back for unsubscribing

use crate::foundation::collections::{ColliderHandle, SlotMap, SubscriptionHandle};
use crate::foundation::math::Vec3;

/// Identifier of one live touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TouchId(pub u64);

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// A physical touch started
    CollisionEnter,
    /// A physical touch persisted through a step
    CollisionStay,
    /// A physical touch ended
    CollisionExit,
    /// An intangible overlap started
    OverlapEnter,
    /// An intangible overlap persisted through a step
    OverlapStay,
    /// An intangible overlap ended
    OverlapExit,
}

/// Phase of a touch, shared by collisions and overlaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TouchPhase {
    /// First step of the touch
    Enter,
    /// Later steps
    Stay,
    /// After the touch ended
    Exit,
}

impl EventKind {
    /// Kind for a touch phase
    pub fn new(phase: TouchPhase, overlap: bool) -> Self {
        match (phase, overlap) {
            (TouchPhase::Enter, false) => Self::CollisionEnter,
            (TouchPhase::Stay, false) => Self::CollisionStay,
            (TouchPhase::Exit, false) => Self::CollisionExit,
            (TouchPhase::Enter, true) => Self::OverlapEnter,
            (TouchPhase::Stay, true) => Self::OverlapStay,
            (TouchPhase::Exit, true) => Self::OverlapExit,
        }
    }

    /// Phase of this kind
    pub fn phase(self) -> TouchPhase {
        match self {
            Self::CollisionEnter | Self::OverlapEnter => TouchPhase::Enter,
            Self::CollisionStay | Self::OverlapStay => TouchPhase::Stay,
            Self::CollisionExit | Self::OverlapExit => TouchPhase::Exit,
        }
    }

    /// Whether this is an overlap event
    pub fn is_overlap(self) -> bool {
        matches!(self, Self::OverlapEnter | Self::OverlapStay | Self::OverlapExit)
    }
}

/// One contact point as seen by the receiving collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World position
    pub position: Vec3,
    /// Unit normal pointing from the receiving collider toward the other
    pub normal: Vec3,
    /// Signed separation, negative when penetrating
    pub distance: f32,
    /// Normal impulse the solver applied during the step
    pub impulse: f32,
}

/// Touch record delivered with an event
#[derive(Debug, Clone, PartialEq)]
pub struct TouchRecord {
    /// Touch id
    pub id: TouchId,
    /// The other collider
    pub collider: ColliderHandle,
    /// Number of contacts
    pub contact_count: usize,
    /// Contacts; empty for overlaps and exits
    pub contacts: Vec<Contact>,
}

/// Event delivered to one collider
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsEvent {
    /// What happened
    pub kind: EventKind,
    /// Collider receiving the event
    pub receiver: ColliderHandle,
    /// Touch details
    pub record: TouchRecord,
}

/// Event handler trait
pub trait EventHandler: Send {
    /// Handle an event
    fn on_event(&mut self, event: &PhysicsEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&PhysicsEvent) + Send,
{
    fn on_event(&mut self, event: &PhysicsEvent) {
        self(event);
    }
}

struct Subscription {
    collider: ColliderHandle,
    kind: EventKind,
    handler: Box<dyn EventHandler>,
}

/// Per-collider publish/subscribe channel
#[derive(Default)]
pub struct EventBus {
    subscriptions: SlotMap<SubscriptionHandle, Subscription>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind` events delivered to `collider`
    pub fn subscribe(
        &mut self,
        collider: ColliderHandle,
        kind: EventKind,
        handler: Box<dyn EventHandler>,
    ) -> SubscriptionHandle {
        self.subscriptions.insert(Subscription { collider, kind, handler })
    }

    /// Remove a subscription, returns false for stale handles
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscriptions.remove(handle).is_some()
    }

    /// Drop every subscription of a collider
    pub fn remove_collider(&mut self, collider: ColliderHandle) {
        self.subscriptions.retain(|_, s| s.collider != collider);
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether there are no subscriptions
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Deliver events in order to matching subscribers
    pub fn dispatch(&mut self, events: &[PhysicsEvent]) {
        if self.subscriptions.is_empty() {
            return;
        }
        for event in events {
            for (_, subscription) in self.subscriptions.iter_mut() {
                if subscription.collider == event.receiver && subscription.kind == event.kind {
                    subscription.handler.on_event(event);
                }
            }
        }
    }
}

/// Sort events into delivery order: phase first, then touch id, then
/// receiver
pub fn sort_for_delivery(events: &mut [PhysicsEvent]) {
    events.sort_by_key(|e| (e.kind.phase(), e.record.id, e.receiver));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn event(kind: EventKind, receiver: ColliderHandle, other: ColliderHandle, id: u64) -> PhysicsEvent {
        PhysicsEvent {
            kind,
            receiver,
            record: TouchRecord { id: TouchId(id), collider: other, contact_count: 0, contacts: Vec::new() },
        }
    }

    #[test]
    fn test_dispatch_filters_by_collider_and_kind() {
        let mut colliders: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let (a, b) = (colliders.insert(()), colliders.insert(()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut bus = EventBus::new();
        let sink = Arc::clone(&seen);
        let handle = bus.subscribe(
            a,
            EventKind::CollisionEnter,
            Box::new(move |e: &PhysicsEvent| sink.lock().unwrap().push(e.record.id)),
        );

        bus.dispatch(&[
            event(EventKind::CollisionEnter, a, b, 1),
            event(EventKind::CollisionEnter, b, a, 1),
            event(EventKind::CollisionStay, a, b, 2),
        ]);
        assert_eq!(*seen.lock().unwrap(), vec![TouchId(1)]);

        assert!(bus.unsubscribe(handle));
        assert!(!bus.unsubscribe(handle));
        bus.dispatch(&[event(EventKind::CollisionEnter, a, b, 3)]);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_delivery_order() {
        let mut colliders: SlotMap<ColliderHandle, ()> = SlotMap::with_key();
        let (a, b) = (colliders.insert(()), colliders.insert(()));
        let mut events = vec![
            event(EventKind::OverlapExit, a, b, 1),
            event(EventKind::CollisionStay, a, b, 2),
            event(EventKind::CollisionEnter, a, b, 3),
        ];
        sort_for_delivery(&mut events);
        let phases: Vec<_> = events.iter().map(|e| e.kind.phase()).collect();
        assert_eq!(phases, vec![TouchPhase::Enter, TouchPhase::Stay, TouchPhase::Exit]);
    }
}
