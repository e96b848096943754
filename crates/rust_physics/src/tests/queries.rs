//! Repeated queries over an unchanged world agree with each other

use crate::foundation::math::{Quat, Vec3};
use crate::physics::{ColliderDesc, Shape, World};

fn cluttered_world() -> World {
    let mut world = World::default();
    for i in 0..5 {
        let x = 3.0 + 2.5 * i as f32;
        let y = if i % 2 == 0 { 0.3 } else { -0.4 };
        world
            .add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(1.0, 2.0, 1.0))).with_position(Vec3::new(x, y, 0.0)))
            .unwrap();
        world
            .add_collider(ColliderDesc::new(Shape::sphere(0.6)).with_position(Vec3::new(x + 1.2, 0.0, 0.4)))
            .unwrap();
    }
    world
}

fn rays() -> Vec<(Vec3, Vec3)> {
    let start = Vec3::new(0.0, 0.0, 0.0);
    [-0.2_f32, -0.05, 0.0, 0.1, 0.25]
        .iter()
        .map(|&angle| {
            let direction = Quat::from_axis_angle(&Vec3::z_axis(), angle) * Vec3::x();
            (start, start + direction * 25.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_hit_is_first_of_all_hits() {
        let world = cluttered_world();
        let probe = world.create_probe();
        let query = probe.query(&world);

        for (start, end) in rays() {
            let all = query.ray_cast_all(start, end);
            let nearest = query.ray_cast(start, end);
            assert_eq!(nearest, all.first().copied());
            assert!(all.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[test]
    fn test_queries_do_not_change_results() {
        let world = cluttered_world();
        let probe = world.create_probe();
        let query = probe.query(&world);

        for (start, end) in rays() {
            let first = query.ray_cast_all(start, end);
            let visited = query.visit_ray_hits(start, end, |_| {});
            let second = query.ray_cast_all(start, end);
            assert_eq!(first, second);
            assert_eq!(visited, first.len());
        }

        let swept = query.sphere_cast_all(0.3, Vec3::zeros(), Vec3::new(25.0, 0.0, 0.0));
        assert_eq!(swept, query.sphere_cast_all(0.3, Vec3::zeros(), Vec3::new(25.0, 0.0, 0.0)));
        assert!(!swept.is_empty());
    }
}
