//! World registry
//!
//! Owns every world of the process, keyed by [`WorldId`]. Worlds step in
//! ascending `update_order`; the root world is created on first use with
//! order 0. Worlds never interact physically, but global probes query all of
//! them and their deferred casts resolve once every world has stepped.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::foundation::collections::{SlotMap, WorldId};

use super::error::{PhysicsError, Result};
use super::probe::{CastQueue, CastRequest, Probe, ProbeQuery, ProbeScope};
use super::settings::WorldSettings;
use super::world::World;

/// Update order of the root world
pub const ROOT_UPDATE_ORDER: i32 = 0;

#[derive(Debug)]
struct WorldEntry {
    world: World,
    update_order: i32,
}

/// Set of independent worlds
#[derive(Debug, Default)]
pub struct PhysicsRegistry {
    worlds: SlotMap<WorldId, WorldEntry>,
    root: Option<WorldId>,
    root_settings: WorldSettings,
    global_casts: Vec<CastRequest>,
}

impl PhysicsRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose root world will use `settings`
    pub fn with_root_settings(settings: WorldSettings) -> Self {
        Self { root_settings: settings, ..Self::default() }
    }

    /// Add a world stepped at `update_order`
    pub fn create_world(&mut self, settings: WorldSettings, update_order: i32) -> WorldId {
        let id = self.worlds.insert_with_key(|id| {
            let mut world = World::new(settings);
            world.set_id(id);
            WorldEntry { world, update_order }
        });
        log::info!("Registered world {:?} with update order {}", id, update_order);
        id
    }

    /// Id of the root world, creating it on first use
    pub fn root_id(&mut self) -> WorldId {
        match self.root {
            Some(id) if self.worlds.contains_key(id) => id,
            _ => {
                let id = self.create_world(self.root_settings.clone(), ROOT_UPDATE_ORDER);
                self.root = Some(id);
                id
            }
        }
    }

    /// Root world, creating it on first use
    pub fn root_mut(&mut self) -> &mut World {
        let id = self.root_id();
        &mut self.worlds[id].world
    }

    /// Root world if it exists
    pub fn root(&self) -> Option<&World> {
        self.root.and_then(|id| self.worlds.get(id)).map(|entry| &entry.world)
    }

    /// World by id
    pub fn world(&self, id: WorldId) -> Result<&World> {
        self.worlds
            .get(id)
            .map(|entry| &entry.world)
            .ok_or(PhysicsError::WorldNotFound(id))
    }

    /// Mutable world by id
    pub fn world_mut(&mut self, id: WorldId) -> Result<&mut World> {
        self.worlds
            .get_mut(id)
            .map(|entry| &mut entry.world)
            .ok_or(PhysicsError::WorldNotFound(id))
    }

    /// Take a world out of the registry
    pub fn remove_world(&mut self, id: WorldId) -> Result<World> {
        let entry = self.worlds.remove(id).ok_or(PhysicsError::WorldNotFound(id))?;
        if self.root == Some(id) {
            self.root = None;
        }
        log::info!("Removed world {:?}", id);
        Ok(entry.world)
    }

    /// Number of worlds
    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// World ids in stepping order
    pub fn world_ids(&self) -> Vec<WorldId> {
        let mut ids: Vec<(i32, WorldId)> = self
            .worlds
            .iter()
            .map(|(id, entry)| (entry.update_order, id))
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Worlds in stepping order
    pub fn worlds(&self) -> Vec<&World> {
        self.world_ids()
            .into_iter()
            .filter_map(|id| self.worlds.get(id))
            .map(|entry| &entry.world)
            .collect()
    }

    /// Advance every world by `frame_dt`; returns the steps run in total
    pub fn update(&mut self, frame_dt: f32) -> u32 {
        let mut steps = 0;
        for id in self.world_ids() {
            if let Some(entry) = self.worlds.get_mut(id) {
                steps += entry.world.update(frame_dt);
            }
        }

        if steps > 0 && !self.global_casts.is_empty() {
            let casts = std::mem::take(&mut self.global_casts);
            let worlds = self.worlds();
            for cast in casts {
                cast.resolve(&worlds);
            }
        }
        steps
    }

    /// Probe over the root world, using its default filter
    pub fn create_root_probe(&mut self) -> Probe {
        let filter = self.root_mut().settings().default_filter.clone();
        Probe::new(ProbeScope::Root, filter)
    }

    /// Probe over every world
    pub fn create_global_probe(&self) -> Probe {
        Probe::new(ProbeScope::Global, self.root_settings.default_filter.clone())
    }

    /// Immediate queries for `probe` over the worlds its scope covers
    pub fn query<'r>(&'r self, probe: &'r Probe) -> Result<ProbeQuery<'r>> {
        let worlds = match probe.scope() {
            ProbeScope::Global => self.worlds(),
            ProbeScope::Root => self.root().into_iter().collect(),
            ProbeScope::World(Some(id)) => vec![self.world(id)?],
            ProbeScope::World(None) => self.root().into_iter().collect(),
        };
        Ok(probe.query_worlds(worlds))
    }

    /// Drop every world and pending cast
    pub fn clear(&mut self) {
        log::info!("Clearing physics registry ({} worlds)", self.worlds.len());
        self.worlds.clear();
        self.root = None;
        self.global_casts.clear();
    }
}

impl CastQueue for PhysicsRegistry {
    fn enqueue_cast(&mut self, request: CastRequest) -> Result<()> {
        match request.scope() {
            ProbeScope::Global => {
                self.global_casts.push(request);
                Ok(())
            }
            ProbeScope::World(Some(id)) => self.world_mut(id)?.enqueue_cast(request),
            ProbeScope::World(None) | ProbeScope::Root => self.root_mut().enqueue_cast(request),
        }
    }
}

static GLOBAL: OnceLock<Mutex<PhysicsRegistry>> = OnceLock::new();

/// Process-wide registry
///
/// The root world inside it is created by the first call that needs it and
/// lives until [`shutdown`].
pub fn global() -> MutexGuard<'static, PhysicsRegistry> {
    GLOBAL
        .get_or_init(|| Mutex::new(PhysicsRegistry::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Tear down every world of the process-wide registry
pub fn shutdown() {
    if let Some(registry) = GLOBAL.get() {
        registry.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::physics::collider::ColliderDesc;
    use crate::physics::collision::Shape;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn box_at(world: &mut World, x: f32) {
        world
            .add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0))).with_position(Vec3::new(x, 0.0, 0.0)))
            .unwrap();
    }

    #[test]
    fn test_root_world_is_created_lazily() {
        let mut registry = PhysicsRegistry::new();
        assert!(registry.root().is_none());
        let id = registry.root_id();
        assert_eq!(registry.root_id(), id);
        assert_eq!(registry.root().and_then(World::id), Some(id));
        assert_eq!(registry.world_count(), 1);
    }

    #[test]
    fn test_worlds_step_in_update_order() {
        let mut registry = PhysicsRegistry::new();
        let late = registry.create_world(WorldSettings::default(), 5);
        let early = registry.create_world(WorldSettings::default(), -1);
        let root = registry.root_id();
        assert_eq!(registry.world_ids(), vec![early, root, late]);

        assert_eq!(registry.update(1.0 / 60.0 + 1e-4), 3);
        for id in [early, root, late] {
            assert_eq!(registry.world(id).unwrap().step_count(), 1);
        }
    }

    #[test]
    fn test_removed_world_is_not_found() {
        let mut registry = PhysicsRegistry::new();
        let id = registry.create_world(WorldSettings::default(), 1);
        registry.remove_world(id).unwrap();
        assert!(matches!(registry.world(id), Err(PhysicsError::WorldNotFound(_))));

        let probe = Probe::new(ProbeScope::World(Some(id)), Default::default());
        let result = probe.ray_cast(&mut registry, Vec3::zeros(), Vec3::x(), |_| {});
        assert!(matches!(result, Err(PhysicsError::WorldNotFound(_))));
    }

    #[test]
    fn test_global_probe_spans_worlds() {
        let mut registry = PhysicsRegistry::new();
        let near = registry.create_world(WorldSettings::default(), 1);
        let far = registry.create_world(WorldSettings::default(), 2);
        box_at(registry.world_mut(far).unwrap(), 10.0);
        box_at(registry.world_mut(near).unwrap(), 5.0);

        let probe = registry.create_global_probe();
        let hits = registry.query(&probe).unwrap().ray_cast_all(Vec3::zeros(), Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].world, Some(near));
        assert_eq!(hits[1].world, Some(far));
        assert_relative_eq!(hits[0].distance, 4.5, epsilon = 1e-4);
    }

    #[test]
    fn test_deferred_global_cast_waits_for_update() {
        let mut registry = PhysicsRegistry::new();
        let id = registry.create_world(WorldSettings::default(), 1);
        box_at(registry.world_mut(id).unwrap(), 5.0);

        let result = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&result);
        let probe = registry.create_global_probe();
        probe
            .ray_cast(&mut registry, Vec3::zeros(), Vec3::new(20.0, 0.0, 0.0), move |hit| {
                *sink.lock().unwrap() = Some(hit);
            })
            .unwrap();

        assert_eq!(registry.update(0.001), 0);
        assert!(result.lock().unwrap().is_none());
        registry.update(1.0 / 60.0);
        let hit = result.lock().unwrap().take().flatten().expect("cast should resolve");
        assert_eq!(hit.world, Some(id));
    }

    #[test]
    fn test_root_cast_goes_to_root_world() {
        let mut registry = PhysicsRegistry::new();
        box_at(registry.root_mut(), 3.0);
        let probe = registry.create_root_probe();
        probe.ray_cast(&mut registry, Vec3::zeros(), Vec3::x() * 10.0, |_| {}).unwrap();
        assert_eq!(registry.root().map(World::pending_cast_count), Some(1));
    }

    #[test]
    fn test_global_registry_shutdown() {
        let id = global().root_id();
        assert!(global().world(id).is_ok());
        shutdown();
        assert!(global().world(id).is_err());
    }
}
