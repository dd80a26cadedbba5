use bevy::log::{debug, trace, warn};
use bevy::math::Vec2;

use crate::broad_phase::BroadPhase;
use crate::components::{BodyConfig, BodyId, BodyKind, CollisionFlags};
use crate::config::{validate_time_step, BroadPhaseKind, WorldConfig};
use crate::contact::{collide, is_supported, Collider, Manifold};
use crate::error::Result;
use crate::integrator::{integrate, update_aabbs};
use crate::resolver::resolve;
use crate::store::{BodyMut, BodyRef, ObjectStore};

/// A confirmed contact involving at least one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Overlap {
    pub a: BodyId,
    pub b: BodyId,
}

#[derive(Debug)]
pub struct PhysicsWorld {
    config: WorldConfig,
    store: ObjectStore,
    broad_phase: BroadPhase,

    // Results of the last step
    pairs: Vec<(usize, usize)>,
    manifolds: Vec<Manifold>,
    overlaps: Vec<Overlap>,

    steps: u64,
    warned_unsupported: bool,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::with_config(WorldConfig::default())
    }
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: WorldConfig) -> Self {
        Self {
            broad_phase: BroadPhase::new(config.broad_phase),
            config,
            store: ObjectStore::new(),
            pairs: Vec::new(),
            manifolds: Vec::new(),
            overlaps: Vec::new(),
            steps: 0,
            warned_unsupported: false,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec2 {
        self.config.gravity()
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        debug!("gravity set to {:?}", gravity);
        self.config.gravity = gravity.into();
    }

    pub fn time_step(&self) -> f32 {
        self.config.time_step
    }

    pub fn set_time_step(&mut self, dt: f32) -> Result<()> {
        validate_time_step(dt)?;
        debug!("time step set to {}", dt);
        self.config.time_step = dt;
        Ok(())
    }

    pub fn set_friction_enabled(&mut self, enabled: bool) {
        self.config.friction_enabled = enabled;
    }

    pub fn set_restitution_enabled(&mut self, enabled: bool) {
        self.config.restitution_enabled = enabled;
    }

    pub fn set_broad_phase(&mut self, kind: BroadPhaseKind) {
        self.config.broad_phase = kind;
        self.broad_phase.set_kind(kind);
    }

    /// Number of steps taken since creation.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advances by the configured time step.
    pub fn step(&mut self) {
        self.run_step(self.config.time_step);
    }

    /// Advances by a caller-supplied time step.
    pub fn step_dt(&mut self, dt: f32) -> Result<()> {
        validate_time_step(dt)?;
        self.run_step(dt);
        Ok(())
    }

    fn run_step(&mut self, dt: f32) {
        self.pairs.clear();
        self.manifolds.clear();
        self.overlaps.clear();
        for flags in &mut self.store.flags {
            flags.clear();
        }

        integrate(&mut self.store, self.config.gravity(), dt);
        update_aabbs(&mut self.store);

        // Populations of points alone can never touch
        let may_collide = self.config.detect_collisions
            && self.store.shapes.iter().any(|shape| shape.has_extent());
        if may_collide {
            self.find_candidates();
            self.find_contacts();
            let resolved = resolve(&mut self.store, &self.manifolds, &self.config);
            update_aabbs(&mut self.store);
            trace!(
                "step {}: {} bodies, {} pairs, {} manifolds ({} resolved), {} overlaps",
                self.steps,
                self.store.len(),
                self.pairs.len(),
                self.manifolds.len(),
                resolved,
                self.overlaps.len()
            );
        }
        self.steps += 1;
    }

    fn find_candidates(&mut self) {
        let kinds = &self.store.kinds;
        let shapes = &self.store.shapes;
        self.broad_phase.find_pairs(
            &self.store.aabbs,
            |a, b| {
                let both_fixed = kinds[a] == BodyKind::Fixed && kinds[b] == BodyKind::Fixed;
                !both_fixed && (shapes[a].has_extent() || shapes[b].has_extent())
            },
            &mut self.pairs,
        );
    }

    fn find_contacts(&mut self) {
        let store = &mut self.store;
        let mut unsupported = 0;
        for &(a, b) in &self.pairs {
            store.flags[a].insert(CollisionFlags::BROAD_PHASE);
            store.flags[b].insert(CollisionFlags::BROAD_PHASE);

            let (shape_a, shape_b) = (store.shapes[a], store.shapes[b]);
            if !is_supported(shape_a.kind(), shape_b.kind()) {
                unsupported += 1;
                continue;
            }
            let collider_a = Collider::new(shape_a, store.positions[a], store.rotations[a]);
            let collider_b = Collider::new(shape_b, store.positions[b], store.rotations[b]);
            let contact = match collide(&collider_a, &collider_b, self.config.box_contact) {
                Some(contact) => contact,
                None => continue,
            };

            store.flags[a].insert(CollisionFlags::CONTACT);
            store.flags[b].insert(CollisionFlags::CONTACT);
            let (id_a, id_b) = (store.ids[a], store.ids[b]);
            if store.kinds[a] == BodyKind::Sensor || store.kinds[b] == BodyKind::Sensor {
                self.overlaps.push(Overlap { a: id_a, b: id_b });
            } else {
                self.manifolds.push(Manifold {
                    body_a: id_a,
                    body_b: id_b,
                    index_a: a,
                    index_b: b,
                    normal: contact.normal,
                    penetration: contact.penetration,
                    point: contact.point,
                });
            }
        }

        if unsupported > 0 {
            if self.warned_unsupported {
                trace!("{} candidate pairs have no narrow-phase test", unsupported);
            } else {
                warn!(
                    "{} candidate pairs have no narrow-phase test (ellipse or capsule) \
                     and will never collide",
                    unsupported
                );
                self.warned_unsupported = true;
            }
        }
    }

    /// Drops every body and every per-step result.
    pub fn clear(&mut self) {
        debug!("clearing world ({} bodies)", self.store.len());
        self.store.clear();
        self.pairs.clear();
        self.manifolds.clear();
        self.overlaps.clear();
    }

    pub fn create_body(&mut self, id: BodyId, config: &BodyConfig) -> Result<usize> {
        self.store.create(id, config)
    }

    pub fn remove_body(&mut self, id: BodyId) -> Result<()> {
        self.store.remove(id)?;
        // indices in the last step's results may now point elsewhere
        self.pairs.clear();
        self.manifolds.clear();
        Ok(())
    }

    /// Removes every body matching the predicate once the traversal is done.
    pub fn remove_where(&mut self, predicate: impl FnMut(BodyRef<'_>) -> bool) -> Vec<BodyId> {
        let removed = self.store.remove_where(predicate);
        if !removed.is_empty() {
            self.pairs.clear();
            self.manifolds.clear();
        }
        removed
    }

    pub fn body(&self, id: BodyId) -> Result<BodyRef<'_>> {
        self.store.get(id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Result<BodyMut<'_>> {
        self.store.get_mut(id)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.store.contains(id)
    }

    pub fn index_of(&self, id: BodyId) -> Result<usize> {
        self.store.index_of(id)
    }

    pub fn body_count(&self) -> usize {
        self.store.len()
    }

    pub fn bodies(&self) -> impl Iterator<Item = BodyRef<'_>> + '_ {
        self.store.iter()
    }

    pub fn for_each(&self, f: impl FnMut(BodyRef<'_>)) {
        self.store.for_each(f);
    }

    pub fn for_each_mut(&mut self, f: impl FnMut(BodyMut<'_>)) {
        self.store.for_each_mut(f);
    }

    pub fn apply_force(&mut self, id: BodyId, force: Vec2) -> Result<()> {
        self.store.get_mut(id)?.apply_force(force);
        Ok(())
    }

    pub fn apply_impulse(&mut self, id: BodyId, impulse: Vec2) -> Result<()> {
        self.store.get_mut(id)?.apply_impulse(impulse);
        Ok(())
    }

    /// Contacts resolved by the last step, in resolution order.
    pub fn manifolds(&self) -> &[Manifold] {
        &self.manifolds
    }

    /// Sensor overlaps found by the last step.
    pub fn overlaps(&self) -> &[Overlap] {
        &self.overlaps
    }

    /// Broad-phase pairs of the last step as `(index_a, index_b)`.
    pub fn candidate_pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }
}
