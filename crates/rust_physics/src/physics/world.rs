//! Physics world
//!
//! A [`World`] owns colliders, bodies and constraints and advances them in
//! fixed steps. One step runs:
//!
//! 1. kinematic targets and queued forces become velocities
//! 2. stale constraint anchors are recomputed
//! 3. swept bounds feed the broad phase, then the narrow phase
//! 4. joints and contacts are solved together for `solver_iterations`
//! 5. speed limits are applied and positions integrated
//! 6. touches are compared with the previous step and events delivered
//! 7. deferred casts are resolved against the new state
//!
//! Worlds do not interact with each other. Several worlds can be grouped in a
//! [`PhysicsRegistry`](super::registry::PhysicsRegistry).

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::debug::draw::{BOUNDS_COLOR, CONTACT_COLOR};
use crate::debug::{DebugDrawBuffer, DebugShape};
use crate::events::{EventBus, EventHandler, EventKind, PhysicsEvent, TouchPhase};
use crate::foundation::collections::{ColliderHandle, ColliderPair, ConstraintHandle, SlotMap, SubscriptionHandle, WorldId};
use crate::foundation::math::{Iso, Quat, Transform, Vec3, Vec4};
use crate::foundation::time::{FixedStepClock, Stopwatch};
use crate::physics::collision::{CompoundPart, CompoundShape, Shape};
use crate::spatial::{OctreeSpatialQuery, SpatialQuery};

use super::body::{Body, ForceMode};
use super::collider::{Collider, ColliderDesc};
use super::collision_layers::clamp_layer;
use super::collision_system::{manifold_normal, swept_bounds, unit_bounds, CollisionSystem};
use super::constraint::{hinge_angle, Anchor, Constraint, ConstraintDesc, ConstraintKind, ConstraintState, HingeSettings};
use super::constraint_solver::JointConstraint;
use super::contact_solver::{ContactConstraint, ContactInput, SolverBody};
use super::error::{PhysicsError, Result};
use super::filter::Filter;
use super::matter::Matter;
use super::probe::{CastQueue, CastRequest, Probe, ProbeScope};
use super::scene::TransformStore;
use super::settings::WorldSettings;

/// A set of colliders, bodies and constraints simulated together
#[derive(Debug)]
pub struct World {
    id: Option<WorldId>,
    settings: WorldSettings,
    colliders: SlotMap<ColliderHandle, Collider>,
    constraints: SlotMap<ConstraintHandle, Constraint>,
    collision: CollisionSystem,
    events: EventBus,
    step_events: Vec<PhysicsEvent>,
    clock: FixedStepClock,
    pending_casts: Vec<CastRequest>,
    debug: Mutex<DebugDrawBuffer>,
    step_count: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldSettings::default())
    }
}

fn spatial_query_for(settings: &WorldSettings) -> Box<dyn SpatialQuery> {
    Box::new(OctreeSpatialQuery::with_bounds(
        settings.broad_phase.bounds,
        settings.broad_phase.octree.clone(),
    ))
}

/// Index of the solver body for `handle`, creating it on first use
fn body_index(
    bodies: &mut Vec<SolverBody>,
    index: &mut HashMap<ColliderHandle, usize>,
    colliders: &SlotMap<ColliderHandle, Collider>,
    handle: ColliderHandle,
) -> usize {
    if let Some(&i) = index.get(&handle) {
        return i;
    }
    let Some(collider) = colliders.get(handle) else {
        return 0;
    };
    let body = match collider.body.as_ref().filter(|_| collider.is_dynamic()) {
        Some(body) => SolverBody {
            handle,
            inverse_mass: body.inverse_mass(),
            inverse_inertia: body.inverse_inertia_world(&collider.transform.rotation),
            center: collider.center_of_mass(),
            linear: collider.linear_velocity,
            angular: collider.angular_velocity,
        },
        None => SolverBody::fixed(
            handle,
            collider.transform.position,
            collider.linear_velocity,
            collider.angular_velocity,
        ),
    };
    bodies.push(body);
    index.insert(handle, bodies.len() - 1);
    bodies.len() - 1
}

/// Clamp a velocity to the world speed limits
fn limit_speed(settings: &WorldSettings, size: f32, dt: f32, velocity: Vec3) -> Vec3 {
    let mut max_speed = f32::INFINITY;
    if settings.absolute_speed_limit > 0.0 {
        max_speed = settings.absolute_speed_limit;
    }
    if settings.relative_speed_limit > 0.0 && size > 0.0 {
        max_speed = max_speed.min(settings.relative_speed_limit * size / dt);
    }
    let speed = velocity.norm();
    if speed > max_speed {
        velocity * (max_speed / speed)
    } else {
        velocity
    }
}

impl World {
    /// Create an empty world
    pub fn new(settings: WorldSettings) -> Self {
        let settings = settings.sanitized();
        log::info!(
            "Creating physics world: {} Hz, gravity {:?}",
            settings.simulation_rate,
            settings.gravity
        );
        Self {
            id: None,
            collision: CollisionSystem::new(spatial_query_for(&settings)),
            settings,
            colliders: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            events: EventBus::new(),
            step_events: Vec::new(),
            clock: FixedStepClock::new(),
            pending_casts: Vec::new(),
            debug: Mutex::new(DebugDrawBuffer::new()),
            step_count: 0,
        }
    }

    /// Registry id, `None` for a standalone world
    pub fn id(&self) -> Option<WorldId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: WorldId) {
        self.id = Some(id);
    }

    /// Current settings
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Replace the settings; invalid values are clamped
    pub fn set_settings(&mut self, settings: WorldSettings) {
        let settings = settings.sanitized();
        let rebuild_index = settings.broad_phase != self.settings.broad_phase;
        self.settings = settings;
        if rebuild_index {
            log::debug!("Broad-phase layout changed, rebuilding index");
            self.collision.set_spatial_query(spatial_query_for(&self.settings));
            let handles: Vec<ColliderHandle> = self.colliders.keys().collect();
            for handle in handles {
                self.refresh_bounds(handle);
            }
        }
    }

    /// Fixed steps run so far
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    // ---- Colliders -------------------------------------------------------

    /// Add a collider (and its body, if the description has one)
    ///
    /// A collider nested under a dynamic or compound-forcing body is merged
    /// into that body's compound shape. Degenerate dimensions are clamped;
    /// only malformed mesh or levelset data is an error.
    pub fn add_collider(&mut self, mut desc: ColliderDesc) -> Result<ColliderHandle> {
        desc.shape.validate()?;
        desc.shape = desc.shape.sanitized();
        if let Some(parent) = desc.parent {
            if !self.colliders.contains_key(parent) {
                return Err(PhysicsError::ParentNotFound(parent));
            }
        }

        let collider = Collider::new(desc);
        let kind = collider.shape().name();
        let handle = self.colliders.insert(collider);

        match self.compound_root_of(handle) {
            Some(root) => {
                if let Some(collider) = self.colliders.get_mut(handle) {
                    collider.merged_into = Some(root);
                }
                self.rebuild_compound(root);
                log::debug!("Added {} collider {:?} merged into {:?}", kind, handle, root);
            }
            None => {
                self.rebuild_compound(handle);
                log::debug!("Added {} collider {:?}", kind, handle);
            }
        }
        Ok(handle)
    }

    /// Remove a collider
    ///
    /// Its live touches end with Exit events delivered right away.
    /// Constraints it owns are removed; constraints targeting it break.
    /// Colliders nested under it keep their world transforms.
    pub fn remove_collider(&mut self, handle: ColliderHandle) -> Result<()> {
        let collider = self.colliders.get(handle).ok_or(PhysicsError::ColliderNotFound(handle))?;
        let was_merged = collider.merged_into.is_some();
        let had_children = self.colliders.values().any(|c| c.parent == Some(handle));

        let exits = self.collision.remove_collider(handle);
        self.deliver(exits);
        self.events.remove_collider(handle);

        self.constraints.retain(|_, c| c.owner != handle);
        for (constraint_handle, constraint) in self.constraints.iter_mut() {
            if constraint.target == Some(handle) && constraint.state != ConstraintState::Broken {
                log::debug!("Constraint {:?} broke: target {:?} removed", constraint_handle, handle);
                constraint.state = ConstraintState::Broken;
            }
        }

        self.colliders.remove(handle);
        for (_, child) in self.colliders.iter_mut() {
            if child.parent == Some(handle) {
                child.parent = None;
            }
        }
        if was_merged || had_children {
            self.rebuild_hierarchy();
        }
        log::debug!("Removed collider {:?}", handle);
        Ok(())
    }

    /// Collider by handle
    pub fn collider(&self, handle: ColliderHandle) -> Result<&Collider> {
        self.colliders.get(handle).ok_or(PhysicsError::ColliderNotFound(handle))
    }

    fn collider_mut(&mut self, handle: ColliderHandle) -> Result<&mut Collider> {
        self.colliders.get_mut(handle).ok_or(PhysicsError::ColliderNotFound(handle))
    }

    /// Whether `handle` refers to a live collider
    pub fn contains(&self, handle: ColliderHandle) -> bool {
        self.colliders.contains_key(handle)
    }

    /// All colliders in handle order
    pub fn colliders(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> {
        self.colliders.iter()
    }

    /// Number of colliders
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    pub(crate) fn collider_map(&self) -> &SlotMap<ColliderHandle, Collider> {
        &self.colliders
    }

    pub(crate) fn spatial_query(&self) -> &dyn SpatialQuery {
        self.collision.spatial_query()
    }

    /// Body component of a collider
    pub fn body_mut(&mut self, handle: ColliderHandle) -> Result<&mut Body> {
        self.collider_mut(handle)?
            .body
            .as_mut()
            .ok_or(PhysicsError::NotABody(handle))
    }

    /// Queue a force or torque-free impulse at the center of mass
    pub fn add_force(&mut self, handle: ColliderHandle, force: Vec3, mode: ForceMode) -> Result<()> {
        self.body_mut(handle)?.add_force(force, mode);
        Ok(())
    }

    /// Queue a torque
    pub fn add_torque(&mut self, handle: ColliderHandle, torque: Vec3, mode: ForceMode) -> Result<()> {
        self.body_mut(handle)?.add_torque(torque, mode);
        Ok(())
    }

    /// Queue a force applied at a world position
    pub fn add_force_at_position(
        &mut self,
        handle: ColliderHandle,
        force: Vec3,
        position: Vec3,
        mode: ForceMode,
    ) -> Result<()> {
        let center = self.collider(handle)?.center_of_mass();
        self.body_mut(handle)?.add_force_at_position(force, position, center, mode);
        Ok(())
    }

    /// Switch a body between dynamic and static
    pub fn set_dynamic(&mut self, handle: ColliderHandle, dynamic: bool) -> Result<()> {
        self.body_mut(handle)?.set_dynamic(dynamic);
        self.rebuild_hierarchy();
        Ok(())
    }

    /// Set the linear velocity
    pub fn set_velocity(&mut self, handle: ColliderHandle, velocity: Vec3) -> Result<()> {
        self.collider_mut(handle)?.linear_velocity = velocity;
        Ok(())
    }

    /// Set the angular velocity
    pub fn set_angular_velocity(&mut self, handle: ColliderHandle, angular_velocity: Vec3) -> Result<()> {
        self.collider_mut(handle)?.angular_velocity = angular_velocity;
        Ok(())
    }

    /// Replace the collider's own matter; `None` falls back to the default
    pub fn set_matter(&mut self, handle: ColliderHandle, matter: Option<Matter>) -> Result<()> {
        self.collider_mut(handle)?.matter = matter.map(|m| m.clamped());
        Ok(())
    }

    /// Replace the collider's own filter; `None` falls back to the default
    pub fn set_filter(&mut self, handle: ColliderHandle, filter: Option<Filter>) -> Result<()> {
        self.collider_mut(handle)?.filter = filter;
        Ok(())
    }

    /// Move the collider to another layer
    pub fn set_layer(&mut self, handle: ColliderHandle, layer: u32) -> Result<()> {
        self.collider_mut(handle)?.layer = clamp_layer(layer);
        Ok(())
    }

    /// Switch between physical and intangible
    pub fn set_intangible(&mut self, handle: ColliderHandle, intangible: bool) -> Result<()> {
        self.collider_mut(handle)?.intangible = intangible;
        Ok(())
    }

    /// Replace the shape and update the broad phase
    pub fn set_shape(&mut self, handle: ColliderHandle, shape: Shape) -> Result<()> {
        shape.validate()?;
        let collider = self.collider_mut(handle)?;
        collider.set_shape(shape.sanitized());
        let unit = collider.merged_into.unwrap_or(handle);
        self.rebuild_compound(unit);
        Ok(())
    }

    /// Move a collider from outside the simulation
    ///
    /// Dynamic bodies and colliders merged into a compound are teleported.
    /// Other colliders move to the new pose over the next step with an
    /// inferred velocity, so bodies resting on them are carried along.
    pub fn set_transform(&mut self, handle: ColliderHandle, transform: Transform) -> Result<()> {
        let collider = self.collider(handle)?;
        if collider.is_dynamic() || collider.merged_into.is_some() {
            return self.teleport(handle, transform);
        }
        let rescale = collider.transform.scale != transform.scale;
        let collider = self.collider_mut(handle)?;
        if rescale {
            collider.transform.scale = transform.scale;
            collider.rescale();
        }
        collider.kinematic_target = Some(transform.isometry());
        if rescale {
            self.rebuild_compound(handle);
        }
        Ok(())
    }

    /// Move a collider discontinuously
    ///
    /// Constraint anchors involving it are recomputed before the next step.
    pub fn teleport(&mut self, handle: ColliderHandle, transform: Transform) -> Result<()> {
        let collider = self.collider_mut(handle)?;
        let rescale = collider.transform.scale != transform.scale;
        collider.transform = transform;
        collider.kinematic_target = None;
        collider.transform_version += 1;
        if rescale {
            collider.rescale();
        }
        let merged_into = collider.merged_into;

        match merged_into {
            // Moving a part relative to its root reshapes the compound
            Some(root) => self.rebuild_compound(root),
            None if rescale => self.rebuild_compound(handle),
            None => {
                self.sync_merged();
                self.refresh_bounds(handle);
            }
        }
        Ok(())
    }

    /// Topmost ancestor that gathers nested colliders into a compound
    fn compound_root_of(&self, handle: ColliderHandle) -> Option<ColliderHandle> {
        let mut root = None;
        let mut current = self.colliders.get(handle)?.parent;
        let mut depth = 0;
        while let Some(parent) = current {
            let collider = self.colliders.get(parent)?;
            if collider
                .body
                .as_ref()
                .map_or(false, |b| b.is_dynamic() || b.force_compound)
            {
                root = Some(parent);
            }
            current = collider.parent;
            depth += 1;
            if depth > self.colliders.len() {
                break;
            }
        }
        root
    }

    /// Rebuild the compound of `root` from its merged colliders
    fn rebuild_compound(&mut self, root: ColliderHandle) {
        let members: Vec<ColliderHandle> = self
            .colliders
            .iter()
            .filter(|(_, c)| c.merged_into == Some(root))
            .map(|(h, _)| h)
            .collect();
        let Some(root_collider) = self.colliders.get(root) else {
            return;
        };
        let root_pose = root_collider.pose();
        let inverse_root = root_pose.inverse();
        let root_dynamic = root_collider.body.as_ref().map_or(false, Body::is_dynamic);
        let forced = root_collider.body.as_ref().map_or(false, |b| b.force_compound);

        let mut parts = vec![CompoundPart {
            shape: root_collider.scaled_shape().clone(),
            local: Iso::identity(),
            source: root,
        }];
        for &member in &members {
            if let Some(collider) = self.colliders.get_mut(member) {
                let local = inverse_root * collider.pose();
                collider.local_to_root = local;
                collider.root_dynamic = root_dynamic;
                collider.linear_velocity = Vec3::zeros();
                collider.angular_velocity = Vec3::zeros();
                parts.push(CompoundPart { shape: collider.scaled_shape().clone(), local, source: member });
            }
        }

        if let Some(root_collider) = self.colliders.get_mut(root) {
            root_collider.compound = if members.is_empty() && !forced {
                None
            } else {
                Some(CompoundShape::new(parts))
            };
            root_collider.refresh_body_geometry();
        }
        for member in members {
            self.collision.unregister(member);
        }
        self.refresh_bounds(root);
    }

    /// Recompute every merge from the parent links
    fn rebuild_hierarchy(&mut self) {
        let handles: Vec<ColliderHandle> = self.colliders.keys().collect();
        let roots: Vec<(ColliderHandle, Option<ColliderHandle>)> =
            handles.iter().map(|&h| (h, self.compound_root_of(h))).collect();

        for &(handle, root) in &roots {
            if let Some(collider) = self.colliders.get_mut(handle) {
                collider.merged_into = root;
                if root.is_none() {
                    collider.local_to_root = Iso::identity();
                    collider.root_dynamic = false;
                }
            }
        }
        for (handle, root) in roots {
            if root.is_none() {
                self.rebuild_compound(handle);
            }
        }
    }

    fn refresh_bounds(&mut self, handle: ColliderHandle) {
        let Some(collider) = self.colliders.get(handle) else {
            return;
        };
        if collider.merged_into.is_none() {
            self.collision.update_bounds(handle, unit_bounds(collider));
        }
    }

    /// Move merged colliders with their compound roots
    fn sync_merged(&mut self) {
        let updates: Vec<(ColliderHandle, Iso, Vec3, Vec3)> = self
            .colliders
            .iter()
            .filter_map(|(handle, collider)| {
                let root = self.colliders.get(collider.merged_into?)?;
                let pose = root.pose() * collider.local_to_root;
                let angular = root.angular_velocity;
                let linear = root.linear_velocity + angular.cross(&(pose.translation.vector - root.center_of_mass()));
                Some((handle, pose, linear, angular))
            })
            .collect();
        for (handle, pose, linear, angular) in updates {
            if let Some(collider) = self.colliders.get_mut(handle) {
                collider.transform = collider.transform.with_isometry(&pose);
                collider.linear_velocity = linear;
                collider.angular_velocity = angular;
            }
        }
    }

    fn unit_of(&self, handle: ColliderHandle) -> ColliderHandle {
        self.colliders
            .get(handle)
            .and_then(|c| c.merged_into)
            .unwrap_or(handle)
    }

    /// Transform version of a collider, including its compound root's
    fn version_of(&self, handle: ColliderHandle) -> u64 {
        let Some(collider) = self.colliders.get(handle) else {
            return 0;
        };
        let root_version = collider
            .merged_into
            .and_then(|root| self.colliders.get(root))
            .map_or(0, |root| root.transform_version);
        collider.transform_version + root_version
    }

    // ---- Constraints -----------------------------------------------------

    /// Attach a constraint to the body `owner`
    ///
    /// The anchor is computed from the current poses before the next step.
    pub fn add_constraint(&mut self, owner: ColliderHandle, desc: ConstraintDesc) -> Result<ConstraintHandle> {
        let owner_collider = self.collider(owner)?;
        if owner_collider.body.is_none() {
            return Err(PhysicsError::NotABody(owner));
        }
        if let Some(target) = desc.target {
            if target == owner {
                return Err(PhysicsError::SelfConstraint(owner));
            }
            self.collider(target)?;
        }

        let handle = self.constraints.insert(Constraint::new(owner, &desc));
        log::debug!(
            "Added {} constraint {:?} on {:?} (target {:?})",
            desc.kind.name(),
            handle,
            owner,
            desc.target
        );
        Ok(handle)
    }

    /// Ball joint at a world `position`, anchored immediately
    pub fn add_point_constraint(
        &mut self,
        owner: ColliderHandle,
        target: Option<ColliderHandle>,
        position: Vec3,
    ) -> Result<ConstraintHandle> {
        let mut desc = ConstraintDesc::new(ConstraintKind::Point).with_pivot(position);
        desc.target = target;
        let handle = self.add_constraint(owner, desc)?;
        self.anchor_constraint(handle);
        Ok(handle)
    }

    /// Remove a constraint
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Result<()> {
        self.constraints
            .remove(handle)
            .map(|_| log::debug!("Removed constraint {:?}", handle))
            .ok_or(PhysicsError::ConstraintNotFound(handle))
    }

    /// Constraint by handle
    pub fn constraint(&self, handle: ConstraintHandle) -> Result<&Constraint> {
        self.constraints.get(handle).ok_or(PhysicsError::ConstraintNotFound(handle))
    }

    /// All constraints in handle order
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintHandle, &Constraint)> {
        self.constraints.iter()
    }

    /// Recompute the anchor from the current poses of both endpoints
    pub fn reanchor_target(&mut self, handle: ConstraintHandle) -> Result<()> {
        let constraint = self.constraint(handle)?;
        let target = constraint.target.ok_or(PhysicsError::NoConstraintTarget(handle))?;
        self.collider(target)?;
        self.anchor_constraint(handle);
        Ok(())
    }

    /// Replace a hinge's axis, limit and motor
    pub fn set_hinge(&mut self, handle: ConstraintHandle, settings: HingeSettings) -> Result<()> {
        let constraint = self
            .constraints
            .get_mut(handle)
            .ok_or(PhysicsError::ConstraintNotFound(handle))?;
        if constraint.set_hinge(&settings) {
            Ok(())
        } else {
            Err(PhysicsError::NotAHinge(handle))
        }
    }

    /// Current hinge angle in radians
    pub fn hinge_angle(&self, handle: ConstraintHandle) -> Result<f32> {
        let constraint = self.constraint(handle)?;
        let ConstraintKind::Hinge(settings) = constraint.kind else {
            return Err(PhysicsError::NotAHinge(handle));
        };
        let owner_pose = self.collider(constraint.owner)?.pose();
        let target_pose = match constraint.target {
            Some(target) => Some(self.collider(target)?.pose()),
            None => None,
        };

        let versions = self.constraint_versions(constraint);
        let anchor = match constraint.anchor {
            Some(anchor) if !constraint.needs_anchor(versions) => anchor,
            _ => {
                let pivot = constraint.pivot.unwrap_or(owner_pose.translation.vector);
                Anchor::compute(&owner_pose, target_pose.as_ref(), &pivot)
            }
        };
        let (owner_frame, target_frame) = anchor.world_frames(&owner_pose, target_pose.as_ref());
        Ok(hinge_angle(&owner_frame.rotation, &target_frame.rotation, &settings.axis))
    }

    fn constraint_versions(&self, constraint: &Constraint) -> (u64, u64) {
        (
            self.version_of(constraint.owner),
            constraint.target.map_or(0, |t| self.version_of(t)),
        )
    }

    fn anchor_constraint(&mut self, handle: ConstraintHandle) {
        let Some(constraint) = self.constraints.get(handle) else {
            return;
        };
        let Some(owner_pose) = self.colliders.get(constraint.owner).map(Collider::pose) else {
            return;
        };
        let target_pose = match constraint.target {
            Some(target) => match self.colliders.get(target) {
                Some(collider) => Some(collider.pose()),
                None => return,
            },
            None => None,
        };
        let versions = self.constraint_versions(constraint);
        if let Some(constraint) = self.constraints.get_mut(handle) {
            constraint.reanchor(&owner_pose, target_pose.as_ref(), versions);
        }
    }

    /// Anchor new constraints and re-anchor those whose endpoints jumped
    fn refresh_anchors(&mut self) {
        let stale: Vec<ConstraintHandle> = self
            .constraints
            .iter()
            .filter(|(_, c)| c.state != ConstraintState::Broken && c.needs_anchor(self.constraint_versions(c)))
            .map(|(h, _)| h)
            .collect();
        for handle in stale {
            log::trace!("Anchoring constraint {:?}", handle);
            self.anchor_constraint(handle);
        }
    }

    /// Unit pairs held together by a live constraint
    fn joined_pairs(&self) -> BTreeSet<ColliderPair> {
        self.constraints
            .values()
            .filter(|c| c.state != ConstraintState::Broken)
            .filter_map(|c| {
                let target = c.target?;
                Some(ColliderPair::new(self.unit_of(c.owner), self.unit_of(target)))
            })
            .collect()
    }

    // ---- Events ----------------------------------------------------------

    /// Subscribe to `kind` events delivered to `collider`
    pub fn subscribe<H>(&mut self, collider: ColliderHandle, kind: EventKind, handler: H) -> Result<SubscriptionHandle>
    where
        H: EventHandler + 'static,
    {
        self.collider(collider)?;
        Ok(self.events.subscribe(collider, kind, Box::new(handler)))
    }

    /// Cancel a subscription; false for stale handles
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.events.unsubscribe(handle)
    }

    /// Whether two colliders are currently touching or overlapping
    pub fn is_touching(&self, a: ColliderHandle, b: ColliderHandle) -> bool {
        self.collision.is_touching(a, b)
    }

    /// Events produced by the last update, in delivery order, followed by
    /// Exit events from removals since
    pub fn step_events(&self) -> &[PhysicsEvent] {
        &self.step_events
    }

    fn deliver(&mut self, events: Vec<PhysicsEvent>) {
        if events.is_empty() {
            return;
        }
        self.events.dispatch(&events);
        self.step_events.extend(events);
    }

    // ---- Stepping --------------------------------------------------------

    /// Advance by a frame of `frame_dt` seconds; returns the steps run
    pub fn update(&mut self, frame_dt: f32) -> u32 {
        self.step_events.clear();
        let steps = self.clock.advance(
            frame_dt,
            self.settings.step_interval(),
            self.settings.max_steps_per_update,
        );
        for _ in 0..steps {
            self.step_once();
        }
        steps
    }

    /// Run exactly one fixed step
    pub fn step(&mut self) {
        self.step_events.clear();
        self.step_once();
    }

    /// Fraction of a step buffered in the accumulator, for rendering
    /// interpolation
    pub fn interpolation_alpha(&self) -> f32 {
        self.clock.alpha(self.settings.step_interval())
    }

    /// Read non-dynamic transforms from the scene, update, then write
    /// simulated transforms back
    pub fn update_with_scene<S>(&mut self, scene: &mut S, frame_dt: f32) -> u32
    where
        S: TransformStore + ?Sized,
    {
        let moved: Vec<(ColliderHandle, Transform)> = self
            .colliders
            .iter()
            .filter(|(_, c)| !c.is_dynamic() && c.merged_into.is_none())
            .filter_map(|(h, c)| {
                let transform = scene.transform(c.entity?)?;
                (transform != c.transform).then_some((h, transform))
            })
            .collect();
        for (handle, transform) in moved {
            if let Err(err) = self.set_transform(handle, transform) {
                log::warn!("Failed to read scene transform of {:?}: {}", handle, err);
            }
        }

        let steps = self.update(frame_dt);

        for (_, collider) in &self.colliders {
            let simulated = collider.is_dynamic() || (collider.merged_into.is_some() && collider.root_dynamic);
            if let (true, Some(entity)) = (simulated, collider.entity) {
                scene.set_transform(entity, collider.transform);
            }
        }
        steps
    }

    /// Rebuild compounds and drop all contact state
    ///
    /// Live touches end with Exit events. Anchors are recomputed before the
    /// next step.
    pub fn reset_simulation(&mut self) {
        let exits = self.collision.clear_touches();
        self.deliver(exits);
        self.rebuild_hierarchy();
        for (_, collider) in self.colliders.iter_mut() {
            collider.kinematic_target = None;
            collider.transform_version += 1;
            if let Some(body) = collider.body.as_mut() {
                body.clear_forces();
            }
        }
        self.clock.reset();
        log::info!("Simulation reset: {} colliders, {} constraints", self.colliders.len(), self.constraints.len());
    }

    fn step_once(&mut self) {
        let stopwatch = Stopwatch::start_new();
        let dt = self.settings.step_dt();
        let tolerance = self.settings.contact_tolerance;

        self.apply_kinematic_targets(dt);
        self.apply_forces(dt);
        self.refresh_anchors();

        for (handle, collider) in &self.colliders {
            if collider.merged_into.is_none() {
                self.collision.update_bounds(handle, swept_bounds(collider, dt, tolerance));
            }
        }
        let joined = self.joined_pairs();
        let pairs = self.collision.broad_phase(&self.colliders, &joined);
        let mut manifolds = self.collision.narrow_phase(&self.colliders, &self.settings, &pairs, dt);

        // Index 0 is the world frame
        let mut bodies = vec![SolverBody::fixed(ColliderHandle::default(), Vec3::zeros(), Vec3::zeros(), Vec3::zeros())];
        let mut index = HashMap::new();
        let restitution_threshold = 2.0 * self.settings.gravity.norm() * dt;

        let mut contact_rows = Vec::new();
        for (i, manifold) in manifolds.iter().enumerate() {
            if manifold.overlap {
                continue;
            }
            let a = body_index(&mut bodies, &mut index, &self.colliders, manifold.units.0);
            let b = body_index(&mut bodies, &mut index, &self.colliders, manifold.units.1);
            if a == b || (!bodies[a].is_movable() && !bodies[b].is_movable()) {
                continue;
            }
            let against_static = !(bodies[a].is_movable() && bodies[b].is_movable());
            let matter = self.matter_of(manifold.pair.a).combine(&self.matter_of(manifold.pair.b), against_static);
            let inputs: Vec<ContactInput> = manifold
                .contacts
                .iter()
                .map(|c| ContactInput { position: c.position(), separation: c.separation })
                .collect();
            let row = ContactConstraint::new(
                &bodies,
                a,
                b,
                manifold_normal(manifold),
                &inputs,
                matter,
                dt,
                tolerance * 0.1,
                restitution_threshold,
            );
            contact_rows.push((i, row));
        }

        let mut joint_rows = Vec::new();
        for (handle, constraint) in &self.constraints {
            if constraint.state == ConstraintState::Broken {
                continue;
            }
            let (Some(anchor), Some(owner)) = (constraint.anchor, self.colliders.get(constraint.owner)) else {
                continue;
            };
            let target_pose = match constraint.target {
                Some(target) => match self.colliders.get(target) {
                    Some(collider) => Some(collider.pose()),
                    None => continue,
                },
                None => None,
            };
            let frames = anchor.world_frames(&owner.pose(), target_pose.as_ref());
            let a = body_index(&mut bodies, &mut index, &self.colliders, self.unit_of(constraint.owner));
            let b = match constraint.target {
                Some(target) => body_index(&mut bodies, &mut index, &self.colliders, self.unit_of(target)),
                None => 0,
            };
            if a == b || (!bodies[a].is_movable() && !bodies[b].is_movable()) {
                continue;
            }
            joint_rows.push((handle, JointConstraint::new(&bodies, a, b, &constraint.kind, &frames, dt)));
        }

        for _ in 0..self.settings.solver_iterations {
            for (_, joint) in &mut joint_rows {
                joint.solve(&mut bodies);
            }
            for (_, contact) in &mut contact_rows {
                contact.solve(&mut bodies);
            }
        }

        for (i, contact) in &contact_rows {
            manifolds[*i].impulses = contact.normal_impulses();
        }
        for (handle, joint) in &joint_rows {
            if let Some(constraint) = self.constraints.get_mut(*handle) {
                constraint.motor_impulse = joint.motor_impulse();
                constraint.state = ConstraintState::Active;
            }
        }
        for (handle, &i) in &index {
            if let Some(collider) = self.colliders.get_mut(*handle) {
                if collider.is_dynamic() {
                    collider.linear_velocity = bodies[i].linear;
                    collider.angular_velocity = bodies[i].angular;
                }
            }
        }

        self.integrate(dt);

        let events = self.collision.update_touches(&manifolds, tolerance);
        if self.settings.debug_draw {
            self.record_debug_shapes(&events);
        }
        self.deliver(events);
        self.step_count += 1;

        let casts = std::mem::take(&mut self.pending_casts);
        for cast in casts {
            cast.resolve(&[&*self]);
        }

        log::trace!(
            "Step {}: {} pairs, {} contacts, {} joints in {:?}",
            self.step_count,
            pairs.len(),
            contact_rows.len(),
            joint_rows.len(),
            stopwatch.elapsed()
        );
    }

    fn matter_of(&self, handle: ColliderHandle) -> Matter {
        self.colliders
            .get(handle)
            .and_then(|c| c.matter)
            .unwrap_or(self.settings.default_matter)
    }

    /// Velocities of colliders moved from outside the simulation
    fn apply_kinematic_targets(&mut self, dt: f32) {
        for (_, collider) in self.colliders.iter_mut() {
            if collider.is_dynamic() || collider.merged_into.is_some() {
                continue;
            }
            match collider.kinematic_target {
                Some(target) => {
                    collider.linear_velocity = (target.translation.vector - collider.transform.position) / dt;
                    collider.angular_velocity =
                        (target.rotation * collider.transform.rotation.inverse()).scaled_axis() / dt;
                }
                None => {
                    collider.linear_velocity = Vec3::zeros();
                    collider.angular_velocity = Vec3::zeros();
                }
            }
        }
    }

    /// Gravity, queued forces and damping
    fn apply_forces(&mut self, dt: f32) {
        let gravity = self.settings.gravity;
        for (_, collider) in self.colliders.iter_mut() {
            let dynamic = collider.is_dynamic();
            let rotation = collider.transform.rotation;
            let Some(body) = collider.body.as_mut() else {
                continue;
            };
            if !dynamic {
                body.clear_forces();
                continue;
            }
            let (dv, dw) = body.take_velocity_delta(dt, &rotation);
            let linear_damping = 1.0 / (1.0 + dt * body.damping);
            let angular_damping = 1.0 / (1.0 + dt * body.angular_damping);
            collider.linear_velocity = (collider.linear_velocity + gravity * dt + dv) * linear_damping;
            collider.angular_velocity = (collider.angular_velocity + dw) * angular_damping;
        }
    }

    /// Move simulated units by their velocities about the center of mass
    fn integrate(&mut self, dt: f32) {
        for (_, collider) in self.colliders.iter_mut() {
            if collider.merged_into.is_some() {
                continue;
            }
            if collider.is_dynamic() {
                collider.linear_velocity = limit_speed(&self.settings, collider.size(), dt, collider.linear_velocity);
                let local_com = collider.body.as_ref().map_or_else(Vec3::zeros, Body::local_center_of_mass);
                let com = collider.center_of_mass() + collider.linear_velocity * dt;
                let rotation = Quat::from_scaled_axis(collider.angular_velocity * dt) * collider.transform.rotation;
                let rotation = Quat::new_normalize(rotation.into_inner());
                collider.transform.position = com - rotation * local_com;
                collider.transform.rotation = rotation;
            } else if let Some(target) = collider.kinematic_target.take() {
                collider.transform = collider.transform.with_isometry(&target);
            }
        }
        self.sync_merged();
    }

    // ---- Queries and debug -----------------------------------------------

    /// Probe scoped to this world, using the world's default filter
    pub fn create_probe(&self) -> Probe {
        Probe::new(ProbeScope::World(self.id), self.settings.default_filter.clone())
            .with_debug_draw(self.settings.debug_draw)
    }

    /// Deferred casts waiting for the next step
    pub fn pending_cast_count(&self) -> usize {
        self.pending_casts.len()
    }

    pub(crate) fn debug_draw_with<F>(&self, draw: F)
    where
        F: FnOnce(&mut DebugDrawBuffer),
    {
        let mut buffer = self.debug.lock().unwrap_or_else(PoisonError::into_inner);
        draw(&mut buffer);
    }

    /// Take the debug shapes recorded since the last call
    pub fn drain_debug_draw(&self) -> Vec<DebugShape> {
        self.debug.lock().unwrap_or_else(PoisonError::into_inner).drain()
    }

    fn record_debug_shapes(&self, events: &[PhysicsEvent]) {
        self.debug_draw_with(|buffer| {
            for (_, collider) in &self.colliders {
                if collider.merged_into.is_none() {
                    buffer.draw_aabb(unit_bounds(collider), Vec4::from(BOUNDS_COLOR));
                }
            }
            // Each touch is delivered twice; draw it once
            let mut drawn = BTreeSet::new();
            for event in events {
                if event.kind.phase() == TouchPhase::Exit || !drawn.insert(event.record.id) {
                    continue;
                }
                for contact in &event.record.contacts {
                    buffer.draw_point(contact.position, Vec4::from(CONTACT_COLOR), 0.05);
                    buffer.draw_contact(contact.position, contact.normal, 0.25);
                }
            }
        });
    }
}

impl CastQueue for World {
    fn enqueue_cast(&mut self, request: CastRequest) -> Result<()> {
        self.pending_casts.push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::BodyDesc;
    use crate::physics::constraint::{HingeLimit, HingeMotor, MotorTarget};
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    fn zero_gravity() -> WorldSettings {
        WorldSettings { gravity: Vec3::zeros(), ..WorldSettings::default() }
    }

    #[test]
    fn test_free_fall_matches_gravity() {
        let mut world = World::default();
        let ball = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(0.0, 10.0, 0.0)))
            .unwrap();
        for _ in 0..60 {
            world.step();
        }
        let velocity = world.collider(ball).unwrap().velocity();
        assert_relative_eq!(velocity.y, -9.81, epsilon = 1e-3);
    }

    #[test]
    fn test_update_runs_fixed_steps() {
        let mut world = World::default();
        assert_eq!(world.update(0.01), 0);
        assert_eq!(world.update(0.01), 1);
        assert_eq!(world.update(0.05), 3);
        assert_eq!(world.step_count(), 4);
        assert!(world.interpolation_alpha() < 1.0);
    }

    #[test]
    fn test_slow_down_time_shrinks_steps() {
        let settings = WorldSettings { slow_down_time: 2.0, ..WorldSettings::default() };
        let mut world = World::new(settings);
        let ball = world.add_collider(ColliderDesc::dynamic(Shape::sphere(0.5))).unwrap();
        for _ in 0..60 {
            world.step();
        }
        assert_relative_eq!(world.collider(ball).unwrap().velocity().y, -9.81 * 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_ball_rests_on_ground() {
        crate::foundation::logging::init_for_tests();
        let mut world = World::default();
        let ground = world
            .add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(20.0, 1.0, 20.0))))
            .unwrap();
        let ball = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(0.0, 3.0, 0.0)))
            .unwrap();
        for _ in 0..240 {
            world.step();
        }
        let collider = world.collider(ball).unwrap();
        assert_relative_eq!(collider.transform().position.y, 1.0, epsilon = 0.05);
        assert!(collider.velocity().norm() < 0.1);
        assert!(world.is_touching(ground, ball));
    }

    #[test]
    fn test_absolute_speed_limit() {
        let settings = WorldSettings { absolute_speed_limit: 2.0, ..zero_gravity() };
        let mut world = World::new(settings);
        let body = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.5)).with_body(BodyDesc {
                velocity: Vec3::new(100.0, 0.0, 0.0),
                ..BodyDesc::default()
            }))
            .unwrap();
        world.step();
        assert_relative_eq!(world.collider(body).unwrap().velocity().norm(), 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_forces_are_cleared_after_step() {
        let mut world = World::new(zero_gravity());
        let body = world
            .add_collider(ColliderDesc::dynamic(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0))).with_body(BodyDesc {
                angular_damping: 0.0,
                ..BodyDesc::default()
            }))
            .unwrap();
        world.add_force(body, Vec3::new(0.0, 0.0, 2.0), ForceMode::VelocityChange).unwrap();
        world.step();
        world.step();
        assert_relative_eq!(world.collider(body).unwrap().velocity(), Vec3::new(0.0, 0.0, 2.0), epsilon = 1e-5);
    }

    #[test]
    fn test_kinematic_move_is_smoothed() {
        let mut world = World::new(zero_gravity());
        let platform = world.add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(2.0, 0.2, 2.0)))).unwrap();
        world
            .set_transform(platform, Transform::from_position(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        assert_relative_eq!(world.collider(platform).unwrap().transform().position.x, 0.0);

        world.step();
        let collider = world.collider(platform).unwrap();
        assert_relative_eq!(collider.transform().position.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(collider.velocity().x, 60.0, epsilon = 1e-2);

        world.step();
        assert_relative_eq!(world.collider(platform).unwrap().velocity().x, 0.0);
    }

    #[test]
    fn test_children_merge_into_dynamic_root() {
        let mut world = World::new(zero_gravity());
        let root = world.add_collider(ColliderDesc::dynamic(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)))).unwrap();
        let child = world
            .add_collider(
                ColliderDesc::new(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)))
                    .with_position(Vec3::new(2.0, 0.0, 0.0))
                    .with_parent(root),
            )
            .unwrap();

        assert_eq!(world.collider(child).unwrap().merged_into(), Some(root));
        assert_eq!(world.collider(root).unwrap().compound().map(|c| c.parts().len()), Some(2));
        assert_relative_eq!(world.collider(root).unwrap().body().unwrap().mass(), 2.0, epsilon = 1e-4);

        world.set_velocity(root, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        for _ in 0..60 {
            world.step();
        }
        let child_position = world.collider(child).unwrap().transform().position;
        assert_relative_eq!(child_position, Vec3::new(2.0, 1.0, 0.0), epsilon = 1e-3);

        world.remove_collider(root).unwrap();
        let child = world.collider(child).unwrap();
        assert_eq!(child.merged_into(), None);
        assert_eq!(child.parent(), None);
    }

    #[test]
    fn test_missing_parent_is_rejected() {
        let mut world = World::default();
        let gone = world.add_collider(ColliderDesc::new(Shape::sphere(1.0))).unwrap();
        world.remove_collider(gone).unwrap();
        let result = world.add_collider(ColliderDesc::new(Shape::sphere(1.0)).with_parent(gone));
        assert!(matches!(result, Err(PhysicsError::ParentNotFound(_))));
        assert!(matches!(world.remove_collider(gone), Err(PhysicsError::ColliderNotFound(_))));
    }

    #[test]
    fn test_point_constraint_holds_pendulum() {
        let mut world = World::default();
        let bob = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.25)).with_position(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        let joint = world.add_point_constraint(bob, None, Vec3::zeros()).unwrap();
        assert_eq!(world.constraint(joint).unwrap().state(), ConstraintState::Anchored);

        for _ in 0..120 {
            world.step();
            let distance = world.collider(bob).unwrap().transform().position.norm();
            assert!((distance - 1.0).abs() < 0.1, "pendulum length drifted to {}", distance);
        }
        assert_eq!(world.constraint(joint).unwrap().state(), ConstraintState::Active);
        assert!(world.collider(bob).unwrap().transform().position.y < -0.1);
    }

    #[test]
    fn test_constraint_breaks_when_target_removed() {
        let mut world = World::default();
        let a = world.add_collider(ColliderDesc::dynamic(Shape::sphere(0.5))).unwrap();
        let b = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(2.0, 0.0, 0.0)))
            .unwrap();
        let joint = world
            .add_constraint(a, ConstraintDesc::new(ConstraintKind::Fixed).with_target(b))
            .unwrap();
        world.step();
        world.remove_collider(b).unwrap();
        assert_eq!(world.constraint(joint).unwrap().state(), ConstraintState::Broken);
        world.step();

        world.remove_collider(a).unwrap();
        assert!(matches!(world.constraint(joint), Err(PhysicsError::ConstraintNotFound(_))));
    }

    #[test]
    fn test_reanchor_requires_target() {
        let mut world = World::default();
        let a = world.add_collider(ColliderDesc::dynamic(Shape::sphere(0.5))).unwrap();
        let joint = world.add_constraint(a, ConstraintDesc::new(ConstraintKind::Fixed)).unwrap();
        assert!(matches!(world.reanchor_target(joint), Err(PhysicsError::NoConstraintTarget(_))));
        assert!(matches!(
            world.add_constraint(a, ConstraintDesc::new(ConstraintKind::Point).with_target(a)),
            Err(PhysicsError::SelfConstraint(_))
        ));
        assert!(matches!(world.hinge_angle(joint), Err(PhysicsError::NotAHinge(_))));
    }

    #[test]
    fn test_hinge_motor_spins_wheel() {
        let mut world = World::new(zero_gravity());
        let wheel = world
            .add_collider(ColliderDesc::dynamic(Shape::cuboid(Vec3::new(1.0, 1.0, 1.0))).with_body(BodyDesc {
                angular_damping: 0.0,
                ..BodyDesc::default()
            }))
            .unwrap();
        let settings = HingeSettings {
            axis: Vec3::z(),
            limit: HingeLimit::default(),
            motor: HingeMotor {
                target: MotorTarget::AngularVelocity,
                target_value: 2.0,
                max_impulse: 10.0,
                enabled: true,
            },
        };
        world
            .add_constraint(wheel, ConstraintDesc::new(ConstraintKind::Hinge(settings)))
            .unwrap();
        for _ in 0..10 {
            world.step();
        }
        let spin = world.collider(wheel).unwrap().angular_velocity();
        assert_relative_eq!(spin, Vec3::new(0.0, 0.0, 2.0), epsilon = 1e-3);
    }

    #[test]
    fn test_subscriptions_receive_events() {
        let mut world = World::default();
        let ground = world
            .add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(20.0, 1.0, 20.0))))
            .unwrap();
        let ball = world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(0.0, 1.5, 0.0)))
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = world
            .subscribe(ball, EventKind::CollisionEnter, move |e: &PhysicsEvent| {
                sink.lock().unwrap().push(e.record.collider);
            })
            .unwrap();

        for _ in 0..60 {
            world.step();
        }
        let seen = seen.lock().unwrap().clone();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&other| other == ground));
        assert!(world.unsubscribe(subscription));
        assert!(!world.unsubscribe(subscription));
    }

    #[test]
    fn test_reset_simulation_ends_touches() {
        let mut world = World::default();
        world
            .add_collider(ColliderDesc::new(Shape::cuboid(Vec3::new(20.0, 1.0, 20.0))))
            .unwrap();
        world
            .add_collider(ColliderDesc::dynamic(Shape::sphere(0.5)).with_position(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        world.step();
        world.step();
        assert!(world.step_events().iter().any(|e| e.kind == EventKind::CollisionStay));

        world.reset_simulation();
        let exits: Vec<_> = world.step_events().iter().filter(|e| e.kind == EventKind::CollisionExit).collect();
        assert_eq!(exits.len(), 2);
    }

    #[test]
    fn test_degenerate_shapes_still_simulate() {
        let mut world = World::default();
        let dot = world.add_collider(ColliderDesc::dynamic(Shape::sphere(0.0))).unwrap();
        let flat = world
            .add_collider(
                ColliderDesc::dynamic(Shape::cuboid(Vec3::new(1.0, 0.0, 1.0))).with_position(Vec3::new(5.0, 0.0, 0.0)),
            )
            .unwrap();
        world.set_shape(flat, Shape::cuboid(Vec3::new(-1.0, 1.0, 1.0))).unwrap();

        for _ in 0..30 {
            world.step();
        }
        for handle in [dot, flat] {
            let collider = world.collider(handle).unwrap();
            assert!(collider.body().unwrap().mass() > 0.0);
            assert!(collider.transform().position.y < 0.0);
            assert!(collider.transform().position.y.is_finite());
        }
    }

    #[test]
    fn test_debug_draw_records_bounds() {
        let settings = WorldSettings { debug_draw: true, ..WorldSettings::default() };
        let mut world = World::new(settings);
        world.add_collider(ColliderDesc::new(Shape::sphere(1.0))).unwrap();
        world.step();
        let shapes = world.drain_debug_draw();
        assert!(shapes.iter().any(|s| matches!(s, DebugShape::Box { .. })));
        assert!(world.drain_debug_draw().is_empty());
    }
}
