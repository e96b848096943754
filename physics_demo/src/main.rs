//! Headless physics demo
//!
//! Drops a scatter of boxes and balls onto a floor in the root world, swings
//! a hinged door with a motor, and runs probes against the result. Events and
//! query results are logged; run with `RUST_LOG=debug` for per-collider
//! detail.
//!
//! Usage: `physics_demo [settings.toml|settings.ron]`

use rand::Rng;
use rust_physics::events::{EventKind, PhysicsEvent};
use rust_physics::foundation::logging;
use rust_physics::physics::registry;
use rust_physics::physics::{HingeMotor, MotorTarget};
use rust_physics::prelude::*;

// Scene layout
const FLOOR_SIZE: f32 = 40.0;
const NUM_BODIES: usize = 24;
const DROP_HEIGHT: f32 = 6.0;
const SCATTER: f32 = 6.0;

// Simulation length
const FRAME_DT: f32 = 1.0 / 60.0;
const NUM_FRAMES: usize = 300;
const REPORT_EVERY: usize = 60;

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error(transparent)]
    Config(#[from] rust_physics::config::ConfigError),
}

fn load_settings() -> Result<WorldSettings, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading world settings from {}", path);
            Ok(WorldSettings::load_from_file(path)?)
        }
        None => Ok(WorldSettings { debug_draw: true, ..WorldSettings::default() }),
    }
}

fn build_scene(world: &mut World) -> Result<Vec<ColliderHandle>, DemoError> {
    let mut rng = rand::thread_rng();

    world.add_collider(
        ColliderDesc::new(Shape::cuboid(Vec3::new(FLOOR_SIZE, 1.0, FLOOR_SIZE)))
            .with_position(Vec3::new(0.0, -0.5, 0.0))
            .with_matter(Matter::new(0.8)),
    )?;

    let mut bodies = Vec::with_capacity(NUM_BODIES);
    for i in 0..NUM_BODIES {
        let position = Vec3::new(
            rng.gen_range(-SCATTER..SCATTER),
            DROP_HEIGHT + i as f32 * 0.6,
            rng.gen_range(-SCATTER..SCATTER),
        );
        let shape = if i % 2 == 0 {
            Shape::sphere(rng.gen_range(0.3..0.7))
        } else {
            Shape::cuboid(Vec3::new(rng.gen_range(0.5..1.2), rng.gen_range(0.5..1.2), rng.gen_range(0.5..1.2)))
        };
        let bounce = Matter::new(0.5).with_bounciness(rng.gen_range(0.0..0.4));
        bodies.push(world.add_collider(ColliderDesc::dynamic(shape).with_position(position).with_matter(bounce))?);
    }

    // A trigger volume in the middle of the floor
    world.add_collider(
        ColliderDesc::new(Shape::cuboid(Vec3::new(4.0, 2.0, 4.0)))
            .with_position(Vec3::new(0.0, 1.0, 0.0))
            .intangible(true),
    )?;
    Ok(bodies)
}

fn build_door(world: &mut World) -> Result<ConstraintHandle, DemoError> {
    let door = world.add_collider(
        ColliderDesc::dynamic(Shape::cuboid(Vec3::new(2.0, 3.0, 0.2))).with_position(Vec3::new(12.0, 1.6, 0.0)),
    )?;
    let settings = HingeSettings {
        axis: Vec3::y(),
        motor: HingeMotor {
            target: MotorTarget::AngularVelocity,
            target_value: 1.5,
            max_impulse: 5.0,
            enabled: true,
        },
        ..HingeSettings::default()
    };
    let hinge = world.add_constraint(
        door,
        ConstraintDesc::new(ConstraintKind::Hinge(settings)).with_pivot(Vec3::new(11.0, 1.6, 0.0)),
    )?;
    Ok(hinge)
}

fn log_event(event: &PhysicsEvent) {
    match event.kind {
        EventKind::CollisionEnter => log::debug!(
            "{:?} hit {:?} with {} contacts",
            event.receiver,
            event.record.collider,
            event.record.contact_count
        ),
        EventKind::OverlapEnter => log::info!("{:?} entered the trigger", event.receiver),
        EventKind::OverlapExit => log::info!("{:?} left the trigger", event.receiver),
        _ => {}
    }
}

fn run() -> Result<(), DemoError> {
    let settings = load_settings()?;
    let mut registry = registry::global();
    *registry = PhysicsRegistry::with_root_settings(settings);

    let world = registry.root_mut();
    let bodies = build_scene(world)?;
    let hinge = build_door(world)?;
    for &body in bodies.iter().take(4) {
        world.subscribe(body, EventKind::CollisionEnter, log_event)?;
    }

    let probe = registry.create_global_probe();
    probe.ray_cast(&mut *registry, Vec3::new(0.0, 30.0, 0.0), Vec3::new(0.0, -5.0, 0.0), |hit| match hit {
        Some(hit) => log::info!("Deferred ray hit {:?} at {:?}", hit.collider, hit.position),
        None => log::info!("Deferred ray missed"),
    })?;

    for frame in 1..=NUM_FRAMES {
        registry.update(FRAME_DT);
        let world = registry.root_mut();
        world.step_events().iter().for_each(log_event);

        if frame % REPORT_EVERY == 0 {
            let resting = bodies
                .iter()
                .filter_map(|&b| world.collider(b).ok())
                .filter(|c| c.velocity().norm() < 0.05)
                .count();
            log::info!(
                "Frame {}: {}/{} bodies resting, door at {:.2} rad, {} debug shapes",
                frame,
                resting,
                bodies.len(),
                world.hinge_angle(hinge)?,
                world.drain_debug_draw().len()
            );
        }
    }

    let query = registry.query(&probe)?;
    let hits = query.ray_cast_all(Vec3::new(-20.0, 0.5, 0.0), Vec3::new(20.0, 0.5, 0.0));
    log::info!("Ray across the floor hit {} colliders", hits.len());
    if let Some(hit) = query.sphere_cast(0.5, Vec3::new(0.0, 20.0, 0.0), Vec3::new(0.0, -1.0, 0.0)) {
        log::info!("Sphere cast stopped at {:?} on {:?}", hit.position, hit.collider);
    }

    drop(registry);
    registry::shutdown();
    Ok(())
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        log::error!("Demo failed: {}", err);
        std::process::exit(1);
    }
}
