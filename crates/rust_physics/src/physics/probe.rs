//! Spatial queries
//!
//! A [`Probe`] is a query descriptor: a filter, a scope and a debug-draw
//! flag. It does not hold on to any world. Casts come in two flavours:
//!
//! - Deferred casts are queued on a [`CastQueue`] (a [`World`] or the
//!   [`PhysicsRegistry`](super::registry::PhysicsRegistry)) and their
//!   callbacks run once the next fixed step has completed, so they observe
//!   post-step state.
//! - Immediate casts go through [`Probe::query`] and return right away.
//!
//! Nearest-hit casts return `None` on a miss; `*_all` casts return every
//! hit sorted nearest first, and an empty list on a miss. Shape casts refuse
//! mesh and levelset shapes with an error before anything is queued.

use crate::debug::draw::{HIT_COLOR, RAY_COLOR};
use crate::foundation::collections::{ColliderHandle, WorldId};
use crate::foundation::math::{Iso, Quat, Translation3, Vec3, Vec4};
use crate::physics::collision::{ray_cast, shape_cast, Ray, Shape, AABB};

use super::collision_system::unit_parts;
use super::error::{PhysicsError, Result};
use super::filter::Filter;
use super::world::World;

/// Which worlds a probe searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeScope {
    /// One world; `None` for a world not owned by a registry
    World(Option<WorldId>),
    /// The registry's root world
    Root,
    /// Every world in the registry
    Global,
}

/// Triangle details of a mesh hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Triangle index in the mesh
    pub index: usize,
    /// Barycentric coordinates of the hit point
    pub barycentric: [f32; 3],
}

/// Result of a ray, sphere or shape cast
///
/// Valid only for the duration of the query that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastHit {
    /// World the collider lives in, if registered
    pub world: Option<WorldId>,
    /// Collider that was hit
    pub collider: ColliderHandle,
    /// World position of the hit
    pub position: Vec3,
    /// Surface normal at the hit
    pub normal: Vec3,
    /// Distance traveled from the start
    pub distance: f32,
    /// Fraction of the path from start to end, in `[0, 1]`
    pub t: f32,
    /// Mesh triangle details for concave mesh hits
    pub triangle: Option<TriangleHit>,
    /// Set from a visitor to stop enumerating further hits
    pub skip_remaining: bool,
}

/// Nearest-hit callback
pub type NearestCallback = Box<dyn FnOnce(Option<RayCastHit>) + Send>;
/// All-hits callback
pub type AllCallback = Box<dyn FnOnce(Vec<RayCastHit>) + Send>;

#[derive(Debug, Clone)]
enum CastPath {
    Ray { start: Vec3, end: Vec3 },
    Sweep { shape: Shape, start: Iso, end: Iso },
}

enum CastCallback {
    Nearest(NearestCallback),
    All(AllCallback),
}

/// A deferred cast waiting for the next completed step
pub struct CastRequest {
    probe: Probe,
    path: CastPath,
    callback: CastCallback,
}

impl std::fmt::Debug for CastRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastRequest")
            .field("probe", &self.probe)
            .field("path", &self.path)
            .finish()
    }
}

impl CastRequest {
    /// Scope of the probe that issued the cast
    pub fn scope(&self) -> ProbeScope {
        self.probe.scope
    }

    /// Run the cast against `worlds` and invoke the callback
    pub(crate) fn resolve(self, worlds: &[&World]) {
        let query = ProbeQuery { probe: &self.probe, worlds: worlds.to_vec() };
        let hits = query.hits(&self.path);
        match self.callback {
            CastCallback::Nearest(callback) => callback(hits.into_iter().next()),
            CastCallback::All(callback) => callback(hits),
        }
    }
}

/// Something deferred casts can be queued on
pub trait CastQueue {
    /// Queue a cast; it resolves after the next completed step
    fn enqueue_cast(&mut self, request: CastRequest) -> Result<()>;
}

/// Query descriptor
#[derive(Debug, Clone)]
pub struct Probe {
    /// Colliders the probe may hit
    pub filter: Filter,
    /// Record rays and hits into the world's debug draw buffer
    pub debug_draw: bool,
    scope: ProbeScope,
}

/// Sweepable copy of `shape`, with degenerate dimensions clamped
fn cast_shape(shape: &Shape) -> Result<Shape> {
    match shape {
        Shape::Mesh(_) | Shape::Levelset(_) => Err(PhysicsError::UnsupportedCastShape(shape.name())),
        _ => Ok(shape.sanitized()),
    }
}

fn translation(position: &Vec3) -> Iso {
    Iso::from_parts(Translation3::from(*position), Quat::identity())
}

impl Probe {
    /// Probe over `scope` with `filter`
    pub fn new(scope: ProbeScope, filter: Filter) -> Self {
        Self { filter, debug_draw: false, scope }
    }

    /// Enable or disable debug drawing
    #[must_use]
    pub fn with_debug_draw(mut self, debug_draw: bool) -> Self {
        self.debug_draw = debug_draw;
        self
    }

    /// Worlds this probe searches
    pub fn scope(&self) -> ProbeScope {
        self.scope
    }

    /// Immediate queries against one world
    pub fn query<'w>(&'w self, world: &'w World) -> ProbeQuery<'w> {
        ProbeQuery { probe: self, worlds: vec![world] }
    }

    /// Immediate queries against several worlds
    pub fn query_worlds<'w>(&'w self, worlds: Vec<&'w World>) -> ProbeQuery<'w> {
        ProbeQuery { probe: self, worlds }
    }

    fn enqueue<Q: CastQueue + ?Sized>(&self, queue: &mut Q, path: CastPath, callback: CastCallback) -> Result<()> {
        queue.enqueue_cast(CastRequest { probe: self.clone(), path, callback })
    }

    /// Nearest hit of a ray from `start` to `end`, after the next step
    pub fn ray_cast<Q, F>(&self, queue: &mut Q, start: Vec3, end: Vec3, callback: F) -> Result<()>
    where
        Q: CastQueue + ?Sized,
        F: FnOnce(Option<RayCastHit>) + Send + 'static,
    {
        self.enqueue(queue, CastPath::Ray { start, end }, CastCallback::Nearest(Box::new(callback)))
    }

    /// Every hit of a ray from `start` to `end`, after the next step
    pub fn ray_cast_all<Q, F>(&self, queue: &mut Q, start: Vec3, end: Vec3, callback: F) -> Result<()>
    where
        Q: CastQueue + ?Sized,
        F: FnOnce(Vec<RayCastHit>) + Send + 'static,
    {
        self.enqueue(queue, CastPath::Ray { start, end }, CastCallback::All(Box::new(callback)))
    }

    /// Nearest hit of a sphere swept from `start` to `end`, after the next step
    pub fn sphere_cast<Q, F>(&self, queue: &mut Q, radius: f32, start: Vec3, end: Vec3, callback: F) -> Result<()>
    where
        Q: CastQueue + ?Sized,
        F: FnOnce(Option<RayCastHit>) + Send + 'static,
    {
        let shape = cast_shape(&Shape::sphere(radius))?;
        let path = CastPath::Sweep { shape, start: translation(&start), end: translation(&end) };
        self.enqueue(queue, path, CastCallback::Nearest(Box::new(callback)))
    }

    /// Every hit of a sphere swept from `start` to `end`, after the next step
    pub fn sphere_cast_all<Q, F>(&self, queue: &mut Q, radius: f32, start: Vec3, end: Vec3, callback: F) -> Result<()>
    where
        Q: CastQueue + ?Sized,
        F: FnOnce(Vec<RayCastHit>) + Send + 'static,
    {
        let shape = cast_shape(&Shape::sphere(radius))?;
        let path = CastPath::Sweep { shape, start: translation(&start), end: translation(&end) };
        self.enqueue(queue, path, CastCallback::All(Box::new(callback)))
    }

    /// Nearest hit of `shape` swept between two poses, after the next step
    ///
    /// Mesh and levelset shapes are rejected immediately.
    pub fn shape_cast<Q, F>(&self, queue: &mut Q, shape: &Shape, start: Iso, end: Iso, callback: F) -> Result<()>
    where
        Q: CastQueue + ?Sized,
        F: FnOnce(Option<RayCastHit>) + Send + 'static,
    {
        let path = CastPath::Sweep { shape: cast_shape(shape)?, start, end };
        self.enqueue(queue, path, CastCallback::Nearest(Box::new(callback)))
    }

    /// Every hit of `shape` swept between two poses, after the next step
    ///
    /// Mesh and levelset shapes are rejected immediately.
    pub fn shape_cast_all<Q, F>(&self, queue: &mut Q, shape: &Shape, start: Iso, end: Iso, callback: F) -> Result<()>
    where
        Q: CastQueue + ?Sized,
        F: FnOnce(Vec<RayCastHit>) + Send + 'static,
    {
        let path = CastPath::Sweep { shape: cast_shape(shape)?, start, end };
        self.enqueue(queue, path, CastCallback::All(Box::new(callback)))
    }
}

/// Immediate queries of a probe against a set of worlds
#[derive(Debug)]
pub struct ProbeQuery<'w> {
    probe: &'w Probe,
    worlds: Vec<&'w World>,
}

impl ProbeQuery<'_> {
    /// Nearest hit of a ray from `start` to `end`
    pub fn ray_cast(&self, start: Vec3, end: Vec3) -> Option<RayCastHit> {
        self.ray_cast_all(start, end).into_iter().next()
    }

    /// Every hit of a ray from `start` to `end`, nearest first
    pub fn ray_cast_all(&self, start: Vec3, end: Vec3) -> Vec<RayCastHit> {
        self.hits(&CastPath::Ray { start, end })
    }

    /// Visit ray hits nearest first until a visitor sets `skip_remaining`
    ///
    /// Returns the number of hits visited.
    pub fn visit_ray_hits<F>(&self, start: Vec3, end: Vec3, mut visitor: F) -> usize
    where
        F: FnMut(&mut RayCastHit),
    {
        let mut visited = 0;
        for mut hit in self.ray_cast_all(start, end) {
            visitor(&mut hit);
            visited += 1;
            if hit.skip_remaining {
                break;
            }
        }
        visited
    }

    /// Nearest hit of a sphere swept from `start` to `end`
    pub fn sphere_cast(&self, radius: f32, start: Vec3, end: Vec3) -> Option<RayCastHit> {
        self.sphere_cast_all(radius, start, end).into_iter().next()
    }

    /// Every hit of a sphere swept from `start` to `end`, nearest first
    pub fn sphere_cast_all(&self, radius: f32, start: Vec3, end: Vec3) -> Vec<RayCastHit> {
        let shape = Shape::sphere(radius).sanitized();
        self.hits(&CastPath::Sweep { shape, start: translation(&start), end: translation(&end) })
    }

    /// Nearest hit of `shape` swept between two poses
    pub fn shape_cast(&self, shape: &Shape, start: &Iso, end: &Iso) -> Result<Option<RayCastHit>> {
        Ok(self.shape_cast_all(shape, start, end)?.into_iter().next())
    }

    /// Every hit of `shape` swept between two poses, nearest first
    pub fn shape_cast_all(&self, shape: &Shape, start: &Iso, end: &Iso) -> Result<Vec<RayCastHit>> {
        Ok(self.hits(&CastPath::Sweep { shape: cast_shape(shape)?, start: *start, end: *end }))
    }

    fn hits(&self, path: &CastPath) -> Vec<RayCastHit> {
        let mut hits: Vec<RayCastHit> = self
            .worlds
            .iter()
            .flat_map(|world| match path {
                CastPath::Ray { start, end } => ray_hits(world, &self.probe.filter, start, end),
                CastPath::Sweep { shape, start, end } => sweep_hits(world, &self.probe.filter, shape, start, end),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.world.cmp(&b.world))
                .then(a.collider.cmp(&b.collider))
        });

        if self.probe.debug_draw {
            let (start, end) = match path {
                CastPath::Ray { start, end } => (*start, *end),
                CastPath::Sweep { start, end, .. } => (start.translation.vector, end.translation.vector),
            };
            for world in &self.worlds {
                world.debug_draw_with(|buffer| {
                    buffer.draw_line(start, end, Vec4::from(RAY_COLOR));
                    for hit in &hits {
                        buffer.draw_point(hit.position, Vec4::from(HIT_COLOR), 0.05);
                        if let CastPath::Sweep { shape: Shape::Sphere(sphere), .. } = path {
                            buffer.draw_sphere(start.lerp(&end, hit.t), sphere.radius, Vec4::from(HIT_COLOR));
                        }
                    }
                });
            }
        }
        hits
    }
}

fn ray_hits(world: &World, filter: &Filter, start: &Vec3, end: &Vec3) -> Vec<RayCastHit> {
    let delta = end - start;
    let length = delta.norm();
    if !(length > 1.0e-9) {
        return Vec::new();
    }
    let ray = Ray::new(*start, delta / length);
    let colliders = world.collider_map();

    let mut hits = Vec::new();
    for unit in world.spatial_query().query_ray(ray.origin, ray.direction, length) {
        let Some(collider) = colliders.get(unit) else {
            continue;
        };
        let pose = collider.pose();
        for part in unit_parts(unit, collider) {
            let Some(source) = colliders.get(part.source) else {
                continue;
            };
            if !filter.allows(&source.candidate(part.source)) {
                continue;
            }
            if let Some(hit) = ray_cast(part.shape, &(pose * part.local), &ray, length) {
                hits.push(RayCastHit {
                    world: world.id(),
                    collider: part.source,
                    position: hit.point,
                    normal: hit.normal,
                    distance: hit.distance,
                    t: hit.distance / length,
                    triangle: hit.triangle.map(|(index, barycentric)| TriangleHit { index, barycentric }),
                    skip_remaining: false,
                });
            }
        }
    }
    hits
}

fn sweep_hits(world: &World, filter: &Filter, shape: &Shape, start: &Iso, end: &Iso) -> Vec<RayCastHit> {
    let radius = shape.bounding_radius();
    let reach = Vec3::repeat(radius);
    let swept = AABB::from_center_extents(start.translation.vector, reach)
        .union(&AABB::from_center_extents(end.translation.vector, reach));
    let length = (end.translation.vector - start.translation.vector).norm();
    let colliders = world.collider_map();

    let mut hits = Vec::new();
    for unit in world.spatial_query().query_aabb(&swept) {
        let Some(collider) = colliders.get(unit) else {
            continue;
        };
        let pose = collider.pose();
        for part in unit_parts(unit, collider) {
            let Some(source) = colliders.get(part.source) else {
                continue;
            };
            if !filter.allows(&source.candidate(part.source)) {
                continue;
            }
            if let Some(hit) = shape_cast(shape, start, end, part.shape, &(pose * part.local)) {
                hits.push(RayCastHit {
                    world: world.id(),
                    collider: part.source,
                    position: hit.point,
                    normal: hit.normal,
                    distance: hit.fraction * length,
                    t: hit.fraction,
                    triangle: None,
                    skip_remaining: false,
                });
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::draw::DebugShape;
    use crate::physics::collider::ColliderDesc;
    use crate::physics::collision::MeshShape;
    use crate::physics::settings::WorldSettings;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    fn row_of_boxes() -> (World, Vec<ColliderHandle>) {
        let mut world = World::new(WorldSettings::default());
        let handles = (0..3)
            .map(|i| {
                let desc = ColliderDesc::new(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)))
                    .with_position(Vec3::new(5.0 * (i + 1) as f32, 0.0, 0.0));
                world.add_collider(desc).expect("valid collider")
            })
            .collect();
        (world, handles)
    }

    #[test]
    fn test_ray_cast_all_is_sorted_and_matches_nearest() {
        let (world, handles) = row_of_boxes();
        let probe = world.create_probe();
        let query = probe.query(&world);

        let all = query.ray_cast_all(Vec3::zeros(), Vec3::new(30.0, 0.0, 0.0));
        assert_eq!(all.iter().map(|h| h.collider).collect::<Vec<_>>(), handles);
        assert_relative_eq!(all[0].distance, 4.5, epsilon = 1e-4);
        assert_relative_eq!(all[0].t, 0.15, epsilon = 1e-4);
        assert_relative_eq!(all[0].normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-4);

        let nearest = query.ray_cast(Vec3::zeros(), Vec3::new(30.0, 0.0, 0.0));
        assert_eq!(nearest, all.first().copied());
        assert!(query.ray_cast_all(Vec3::zeros(), Vec3::new(0.0, 30.0, 0.0)).is_empty());
    }

    #[test]
    fn test_skip_remaining_stops_enumeration() {
        let (world, _) = row_of_boxes();
        let probe = world.create_probe();
        let visited = probe.query(&world).visit_ray_hits(Vec3::zeros(), Vec3::new(30.0, 0.0, 0.0), |hit| {
            hit.skip_remaining = hit.distance > 5.0;
        });
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_filter_skips_collider() {
        let (world, handles) = row_of_boxes();
        let mut probe = world.create_probe();
        probe.filter.skip_colliders.insert(handles[0]);
        let hit = probe.query(&world).ray_cast(Vec3::zeros(), Vec3::new(30.0, 0.0, 0.0));
        assert_eq!(hit.map(|h| h.collider), Some(handles[1]));
    }

    #[test]
    fn test_sphere_cast_hits_face() {
        let (world, handles) = row_of_boxes();
        let probe = world.create_probe();
        let hit = probe
            .query(&world)
            .sphere_cast(0.5, Vec3::zeros(), Vec3::new(30.0, 0.0, 0.0))
            .expect("sphere reaches the first box");
        assert_eq!(hit.collider, handles[0]);
        assert_relative_eq!(hit.distance, 4.0, epsilon = 0.05);
    }

    #[test]
    fn test_sphere_cast_draws_sphere_at_hit() {
        let (world, _) = row_of_boxes();
        let caster = world.create_probe().with_debug_draw(true);
        let hit = caster
            .query(&world)
            .sphere_cast(0.5, Vec3::zeros(), Vec3::new(30.0, 0.0, 0.0))
            .expect("sphere reaches the first box");

        let shapes = world.drain_debug_draw();
        let spheres: Vec<_> = shapes
            .iter()
            .filter_map(|s| match s {
                DebugShape::Sphere { center, radius, .. } => Some((*center, *radius)),
                _ => None,
            })
            .collect();
        assert_eq!(spheres.len(), 3);
        assert_relative_eq!(spheres[0].0.x, hit.distance, epsilon = 1e-3);
        assert_relative_eq!(spheres[0].1, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_mesh_shape_cast_is_rejected() {
        let (mut world, _) = row_of_boxes();
        let probe = world.create_probe();
        let vertices = [Vec3::zeros(), Vec3::x(), Vec3::y()];
        let mesh = Shape::Mesh(MeshShape::from_mesh(&vertices, &[0, 1, 2], false).expect("valid mesh"));

        let result = probe.query(&world).shape_cast(&mesh, &Iso::identity(), &Iso::identity());
        assert!(matches!(result, Err(PhysicsError::UnsupportedCastShape(_))));

        let queued = probe.shape_cast(&mut world, &mesh, Iso::identity(), Iso::identity(), |_| {});
        assert!(matches!(queued, Err(PhysicsError::UnsupportedCastShape(_))));
    }

    #[test]
    fn test_deferred_cast_waits_for_step() {
        let (mut world, handles) = row_of_boxes();
        let probe = world.create_probe();
        let result = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&result);
        probe
            .ray_cast(&mut world, Vec3::zeros(), Vec3::new(30.0, 0.0, 0.0), move |hit| {
                *sink.lock().unwrap() = Some(hit.map(|h| h.collider));
            })
            .expect("ray casts are always accepted");

        assert!(result.lock().unwrap().is_none());
        world.step();
        assert_eq!(*result.lock().unwrap(), Some(Some(handles[0])));
    }
}
