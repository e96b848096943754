//! Layer matrix and filter control over which pairs touch

use crate::events::{EventKind, PhysicsEvent};
use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::Vec3;
use crate::physics::{ColliderDesc, Filter, LayerCollisionMatrix, Shape, World, WorldSettings};

fn ground_desc() -> ColliderDesc {
    ColliderDesc::new(Shape::cuboid(Vec3::new(20.0, 1.0, 20.0)))
}

fn ball_desc(x: f32) -> ColliderDesc {
    ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(x, 0.8, 0.0))
}

fn run(world: &mut World, steps: usize) -> Vec<PhysicsEvent> {
    let mut events = Vec::new();
    for _ in 0..steps {
        world.step();
        events.extend_from_slice(world.step_events());
    }
    events
}

fn received_by(events: &[PhysicsEvent], receiver: ColliderHandle) -> Vec<&PhysicsEvent> {
    events.iter().filter(|e| e.receiver == receiver).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_layer_pair_never_collides() {
        let mut layer_matrix = LayerCollisionMatrix::new();
        layer_matrix.set(5, 9, false);
        let mut world = World::new(WorldSettings { layer_matrix, ..WorldSettings::default() });

        let ground = world.add_collider(ground_desc().with_layer(5)).unwrap();
        let ball = world.add_collider(ball_desc(0.0).with_layer(9)).unwrap();
        assert!(world.collider(ground).unwrap().world_aabb().intersects(&world.collider(ball).unwrap().world_aabb()));

        let events = run(&mut world, 60);
        assert!(events.is_empty());
        assert!(world.collider(ball).unwrap().transform().position.y < 0.0);
    }

    #[test]
    fn test_skipped_collider_passes_through() {
        let mut world = World::default();
        let ground = world.add_collider(ground_desc()).unwrap();
        let mut skip_ground = Filter::new();
        skip_ground.skip_colliders.insert(ground);

        let normal = world
            .add_collider(ball_desc(-2.0).with_position(Vec3::new(-2.0, 1.2, 0.0)))
            .unwrap();
        let ghost = world.add_collider(ball_desc(2.0).with_filter(skip_ground)).unwrap();

        let events = run(&mut world, 60);
        assert!(received_by(&events, normal)
            .iter()
            .any(|e| e.kind == EventKind::CollisionEnter && e.record.collider == ground));
        assert!(received_by(&events, ghost).is_empty());
        assert!(world.collider(ghost).unwrap().transform().position.y < 0.0);
        assert!(world.collider(normal).unwrap().transform().position.y > 0.9);
    }

    #[test]
    fn test_trigger_reports_overlaps_only() {
        let mut world = World::default();
        let trigger = world
            .add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(4.0, 1.0, 4.0))).intangible(true))
            .unwrap();
        let ball = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.25)).with_position(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        let mut blind = Filter::new();
        blind.include_intangible(false);
        let blind_ball = world
            .add_collider(
                ColliderDesc::dynamic(Shape::sphere(0.25))
                    .with_position(Vec3::new(1.0, 1.0, 0.0))
                    .with_filter(blind),
            )
            .unwrap();

        let events = run(&mut world, 90);
        let kinds: Vec<EventKind> = received_by(&events, ball)
            .iter()
            .filter(|e| e.kind != EventKind::OverlapStay)
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![EventKind::OverlapEnter, EventKind::OverlapExit]);
        assert!(received_by(&events, trigger).iter().all(|e| e.kind.is_overlap()));
        assert!(received_by(&events, blind_ball).is_empty());
    }
}
