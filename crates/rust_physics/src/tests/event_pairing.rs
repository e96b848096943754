//! Every touch opens with Enter, stays every step and closes with one Exit

use std::collections::BTreeMap;

use crate::events::{PhysicsEvent, TouchId, TouchPhase};
use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::{Transform, Vec3};
use crate::physics::{ColliderDesc, Shape, World};

/// Phases per (receiver, touch) with the step they were seen in
type Timeline = BTreeMap<(ColliderHandle, TouchId), Vec<(usize, TouchPhase)>>;

fn record(timeline: &mut Timeline, step: usize, events: &[PhysicsEvent]) {
    for event in events {
        timeline
            .entry((event.receiver, event.record.id))
            .or_default()
            .push((step, event.kind.phase()));
    }
}

fn assert_well_formed(timeline: &Timeline) {
    for (key, phases) in timeline {
        let (first_step, first) = phases[0];
        assert_eq!(first, TouchPhase::Enter, "{:?} did not start with Enter", key);
        let (last_step, last) = phases[phases.len() - 1];
        assert_eq!(last, TouchPhase::Exit, "{:?} did not end with Exit", key);
        assert_eq!(phases.iter().filter(|(_, p)| *p == TouchPhase::Exit).count(), 1);

        let stays: Vec<usize> = phases
            .iter()
            .filter(|(_, p)| *p == TouchPhase::Stay)
            .map(|(s, _)| *s)
            .collect();
        let expected: Vec<usize> = (first_step + 1..last_step).collect();
        assert_eq!(stays, expected, "{:?} missed a Stay", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touches_are_paired() {
        let mut world = World::default();
        world
            .add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(20.0, 1.0, 20.0))))
            .unwrap();
        let jumper = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(-3.0, 1.2, 0.0)))
            .unwrap();
        let doomed = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(3.0, 1.2, 0.0)))
            .unwrap();

        let mut timeline = Timeline::new();
        let mut step = 0;
        for _ in 0..30 {
            step += 1;
            world.step();
            record(&mut timeline, step, world.step_events());
        }

        // Removal ends the touch between steps
        let before = world.step_events().len();
        world.remove_collider(doomed).unwrap();
        record(&mut timeline, step + 1, &world.step_events()[before..]);

        world
            .teleport(jumper, Transform::from_position(Vec3::new(-3.0, 10.0, 0.0)))
            .unwrap();
        for _ in 0..5 {
            step += 1;
            world.step();
            record(&mut timeline, step, world.step_events());
        }

        assert!(timeline.len() >= 4);
        assert_well_formed(&timeline);
    }

    #[test]
    fn test_step_events_are_ordered_by_phase() {
        let mut world = World::default();
        world
            .add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(20.0, 1.0, 20.0))))
            .unwrap();
        for i in 0..4 {
            let height = 1.0 + 0.5 * i as f32;
            world
                .add_collider(
                    ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(2.0 * i as f32, height, 0.0)),
                )
                .unwrap();
        }
        for _ in 0..60 {
            world.step();
            let phases: Vec<TouchPhase> = world.step_events().iter().map(|e| e.kind.phase()).collect();
            assert!(phases.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
