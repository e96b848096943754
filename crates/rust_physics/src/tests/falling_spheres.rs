//! Two spheres meeting under strong gravity

use crate::events::{EventKind, PhysicsEvent};
use crate::foundation::collections::ColliderHandle;
use crate::foundation::math::Vec3;
use crate::physics::{ColliderDesc, Shape, World, WorldSettings};

/// Large spheres in centimeters: the lower one static, the upper one falling
fn sphere_world(settings: WorldSettings) -> (World, ColliderHandle, ColliderHandle) {
    let settings = WorldSettings { gravity: Vec3::new(0.0, -980.0, 0.0), simulation_rate: 60.0, ..settings };
    let mut world = World::new(settings);
    let lower = world
        .add_collider(ColliderDesc::new(Shape::sphere(50.0)).with_position(Vec3::new(0.0, -100.0, 0.0)))
        .unwrap();
    let upper = world
        .add_collider(ColliderDesc::dynamic(Shape::sphere(50.0)).with_position(Vec3::new(0.0, 100.0, 0.0)))
        .unwrap();
    (world, lower, upper)
}

fn run(world: &mut World, steps: usize) -> Vec<PhysicsEvent> {
    let mut events = Vec::new();
    for _ in 0..steps {
        world.step();
        events.extend_from_slice(world.step_events());
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_collision_enter_has_single_contact() {
        let (mut world, lower, upper) = sphere_world(WorldSettings::default());
        let events = run(&mut world, 60);

        let enter = events
            .iter()
            .find(|e| e.kind == EventKind::CollisionEnter && e.receiver == upper)
            .expect("spheres should touch");
        assert_eq!(enter.record.collider, lower);
        assert_eq!(enter.record.contact_count, 1);
        assert_eq!(enter.record.contacts.len(), 1);

        let contact = enter.record.contacts[0];
        assert_abs_diff_eq!(contact.distance, 0.0, epsilon = 0.1);
        assert_abs_diff_eq!(contact.position, Vec3::new(0.0, -50.0, 0.0), epsilon = 0.5);
        assert_abs_diff_eq!(contact.normal, Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-3);

        let mirrored = events
            .iter()
            .find(|e| e.kind == EventKind::CollisionEnter && e.receiver == lower)
            .expect("both sides get the event");
        assert_eq!(mirrored.record.id, enter.record.id);
        assert_abs_diff_eq!(mirrored.record.contacts[0].normal, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-3);
    }

    #[test]
    fn test_upper_sphere_comes_to_rest() {
        let (mut world, _, upper) = sphere_world(WorldSettings::default());
        run(&mut world, 120);
        let collider = world.collider(upper).unwrap();
        assert_abs_diff_eq!(collider.transform().position.y, 0.0, epsilon = 0.5);
    }
}
