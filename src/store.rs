use bevy::log::{debug, trace};
use bevy::math::Vec2;
use bevy::utils::HashMap;

use crate::aabb::Aabb;
use crate::components::{
    inverse_inertia, inverse_mass, validate_mass, BodyConfig, BodyId, BodyKind, CollisionFlags,
    Material, Shape,
};
use crate::error::{PhysicsError, Result};

/// One column per field, all sharing a dense index. Removal swaps the last
/// body into the hole, so indices are only valid until the next removal.
#[derive(Debug, Default)]
pub struct ObjectStore {
    index_of: HashMap<BodyId, usize>,

    pub(crate) ids: Vec<BodyId>,
    pub(crate) kinds: Vec<BodyKind>,
    pub(crate) shapes: Vec<Shape>,

    pub(crate) positions: Vec<Vec2>,
    pub(crate) rotations: Vec<f32>,
    pub(crate) velocities: Vec<Vec2>,
    pub(crate) angular_velocities: Vec<f32>,

    pub(crate) masses: Vec<f32>,
    pub(crate) inv_masses: Vec<f32>,
    pub(crate) inv_inertias: Vec<f32>,
    pub(crate) materials: Vec<Material>,

    /// Net force integrated during the last step (read only)
    pub(crate) forces: Vec<Vec2>,
    /// Net impulse of the last step: applied plus contact impulses (read only)
    pub(crate) impulses: Vec<Vec2>,
    /// Caller forces waiting for the next step
    pub(crate) pending_forces: Vec<Vec2>,
    /// Caller impulses waiting for the next step
    pub(crate) pending_impulses: Vec<Vec2>,

    pub(crate) aabbs: Vec<Aabb>,
    pub(crate) flags: Vec<CollisionFlags>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut store = Self::default();
        store.reserve(capacity);
        store
    }

    pub fn reserve(&mut self, additional: usize) {
        self.index_of.reserve(additional);
        self.ids.reserve(additional);
        self.kinds.reserve(additional);
        self.shapes.reserve(additional);
        self.positions.reserve(additional);
        self.rotations.reserve(additional);
        self.velocities.reserve(additional);
        self.angular_velocities.reserve(additional);
        self.masses.reserve(additional);
        self.inv_masses.reserve(additional);
        self.inv_inertias.reserve(additional);
        self.materials.reserve(additional);
        self.forces.reserve(additional);
        self.impulses.reserve(additional);
        self.pending_forces.reserve(additional);
        self.pending_impulses.reserve(additional);
        self.aabbs.reserve(additional);
        self.flags.reserve(additional);
    }

    /// Appends a body and returns its dense index.
    pub fn create(&mut self, id: BodyId, config: &BodyConfig) -> Result<usize> {
        if self.index_of.contains_key(&id) {
            return Err(PhysicsError::DuplicateId(id));
        }
        config.validate()?;

        let index = self.ids.len();
        let fixed = config.kind == BodyKind::Fixed;
        self.index_of.insert(id, index);
        self.ids.push(id);
        self.kinds.push(config.kind);
        self.shapes.push(config.shape);
        self.positions.push(config.position);
        self.rotations.push(config.rotation);
        // fixed bodies never move on their own
        self.velocities.push(if fixed { Vec2::ZERO } else { config.velocity });
        self.angular_velocities.push(if fixed { 0. } else { config.angular_velocity });
        self.masses.push(config.mass);
        self.inv_masses.push(inverse_mass(config.kind, config.mass));
        self.inv_inertias.push(inverse_inertia(config.kind, &config.shape, config.mass));
        self.materials.push(config.material);
        self.forces.push(Vec2::ZERO);
        self.impulses.push(Vec2::ZERO);
        self.pending_forces.push(Vec2::ZERO);
        self.pending_impulses.push(Vec2::ZERO);
        self.aabbs.push(config.shape.aabb(config.position, config.rotation));
        self.flags.push(CollisionFlags::NONE);

        debug!(
            "created body {} at index {} ({:?} {:?})",
            id,
            index,
            config.kind,
            config.shape.kind()
        );
        Ok(index)
    }

    /// Removes a body by swapping the last live slot into its place.
    pub fn remove(&mut self, id: BodyId) -> Result<()> {
        let index = self.index_of.remove(&id).ok_or(PhysicsError::NotFound(id))?;
        let last = self.ids.len() - 1;

        self.ids.swap_remove(index);
        self.kinds.swap_remove(index);
        self.shapes.swap_remove(index);
        self.positions.swap_remove(index);
        self.rotations.swap_remove(index);
        self.velocities.swap_remove(index);
        self.angular_velocities.swap_remove(index);
        self.masses.swap_remove(index);
        self.inv_masses.swap_remove(index);
        self.inv_inertias.swap_remove(index);
        self.materials.swap_remove(index);
        self.forces.swap_remove(index);
        self.impulses.swap_remove(index);
        self.pending_forces.swap_remove(index);
        self.pending_impulses.swap_remove(index);
        self.aabbs.swap_remove(index);
        self.flags.swap_remove(index);

        if index != last {
            let moved = self.ids[index];
            self.index_of.insert(moved, index);
            trace!("body {} moved from index {} to {}", moved, last, index);
        }
        debug!("removed body {} from index {}", id, index);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.index_of.clear();
        self.ids.clear();
        self.kinds.clear();
        self.shapes.clear();
        self.positions.clear();
        self.rotations.clear();
        self.velocities.clear();
        self.angular_velocities.clear();
        self.masses.clear();
        self.inv_masses.clear();
        self.inv_inertias.clear();
        self.materials.clear();
        self.forces.clear();
        self.impulses.clear();
        self.pending_forces.clear();
        self.pending_impulses.clear();
        self.aabbs.clear();
        self.flags.clear();
    }

    pub fn index_of(&self, id: BodyId) -> Result<usize> {
        self.index_of.get(&id).copied().ok_or(PhysicsError::NotFound(id))
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.index_of.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, id: BodyId) -> Result<BodyRef<'_>> {
        let index = self.index_of(id)?;
        Ok(BodyRef { store: self, index })
    }

    pub fn get_mut(&mut self, id: BodyId) -> Result<BodyMut<'_>> {
        let index = self.index_of(id)?;
        Ok(BodyMut { store: self, index })
    }

    /// Read-only view of the body at a dense index.
    pub fn at(&self, index: usize) -> Option<BodyRef<'_>> {
        (index < self.len()).then(|| BodyRef { store: self, index })
    }

    pub fn iter(&self) -> impl Iterator<Item = BodyRef<'_>> + '_ {
        (0..self.len()).map(move |index| BodyRef { store: self, index })
    }

    /// Visits every live body once. The view is read only, so the population
    /// cannot change mid-visit.
    pub fn for_each(&self, mut f: impl FnMut(BodyRef<'_>)) {
        for index in 0..self.len() {
            f(BodyRef { store: self, index });
        }
    }

    /// Visits every live body once with write access to its fields. The
    /// handle cannot create or remove bodies.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(BodyMut<'_>)) {
        for index in 0..self.len() {
            f(BodyMut { store: &mut *self, index });
        }
    }

    /// Removes every body matching the predicate, after the traversal.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(BodyRef<'_>) -> bool) -> Vec<BodyId> {
        let mut doomed = Vec::new();
        self.for_each(|body| {
            if predicate(body) {
                doomed.push(body.id());
            }
        });
        for id in &doomed {
            // ids were collected from live bodies just above
            let _ = self.remove(*id);
        }
        doomed
    }
}

/// Read-only view of one live body.
#[derive(Clone, Copy)]
pub struct BodyRef<'a> {
    store: &'a ObjectStore,
    index: usize,
}

impl<'a> BodyRef<'a> {
    pub fn id(&self) -> BodyId {
        self.store.ids[self.index]
    }

    /// Dense index; changes when other bodies are removed.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> BodyKind {
        self.store.kinds[self.index]
    }

    pub fn shape(&self) -> Shape {
        self.store.shapes[self.index]
    }

    pub fn position(&self) -> Vec2 {
        self.store.positions[self.index]
    }

    pub fn rotation(&self) -> f32 {
        self.store.rotations[self.index]
    }

    pub fn velocity(&self) -> Vec2 {
        self.store.velocities[self.index]
    }

    pub fn angular_velocity(&self) -> f32 {
        self.store.angular_velocities[self.index]
    }

    pub fn mass(&self) -> f32 {
        self.store.masses[self.index]
    }

    pub fn inv_mass(&self) -> f32 {
        self.store.inv_masses[self.index]
    }

    pub fn inv_inertia(&self) -> f32 {
        self.store.inv_inertias[self.index]
    }

    pub fn material(&self) -> Material {
        self.store.materials[self.index]
    }

    /// Net force integrated by the last step.
    pub fn force(&self) -> Vec2 {
        self.store.forces[self.index]
    }

    /// Net impulse of the last step, caller impulses and contact impulses.
    pub fn impulse(&self) -> Vec2 {
        self.store.impulses[self.index]
    }

    pub fn aabb(&self) -> Aabb {
        self.store.aabbs[self.index]
    }

    pub fn flags(&self) -> CollisionFlags {
        self.store.flags[self.index]
    }

    pub fn is_fixed(&self) -> bool {
        self.kind() == BodyKind::Fixed
    }

    pub fn is_sensor(&self) -> bool {
        self.kind() == BodyKind::Sensor
    }
}

/// Write access to one live body's fields.
pub struct BodyMut<'a> {
    store: &'a mut ObjectStore,
    index: usize,
}

impl<'a> BodyMut<'a> {
    pub fn view(&self) -> BodyRef<'_> {
        BodyRef {
            store: &*self.store,
            index: self.index,
        }
    }

    pub fn id(&self) -> BodyId {
        self.store.ids[self.index]
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.store.positions[self.index] = position;
        self.refresh_aabb();
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.store.rotations[self.index] = rotation;
        self.refresh_aabb();
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.store.velocities[self.index] = velocity;
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: f32) {
        self.store.angular_velocities[self.index] = angular_velocity;
    }

    /// Writes are ignored for fixed bodies, whose inverse mass stays 0.
    pub fn set_mass(&mut self, mass: f32) -> Result<()> {
        validate_mass(mass)?;
        let kind = self.store.kinds[self.index];
        if kind == BodyKind::Fixed {
            trace!("ignoring mass write on fixed body {}", self.id());
            return Ok(());
        }
        self.store.masses[self.index] = mass;
        self.refresh_mass_properties();
        Ok(())
    }

    pub fn set_shape(&mut self, shape: Shape) -> Result<()> {
        shape.validate()?;
        self.store.shapes[self.index] = shape;
        self.refresh_mass_properties();
        self.refresh_aabb();
        Ok(())
    }

    /// Becoming fixed stops the body and makes it immovable; leaving fixed
    /// restores 1/mass.
    pub fn set_kind(&mut self, kind: BodyKind) {
        self.store.kinds[self.index] = kind;
        if kind == BodyKind::Fixed {
            self.store.velocities[self.index] = Vec2::ZERO;
            self.store.angular_velocities[self.index] = 0.;
        }
        self.refresh_mass_properties();
    }

    pub fn set_material(&mut self, material: Material) -> Result<()> {
        material.validate()?;
        self.store.materials[self.index] = material;
        Ok(())
    }

    /// Continuous force for the next step only; reapply every step to sustain.
    pub fn apply_force(&mut self, force: Vec2) {
        self.store.pending_forces[self.index] += force;
    }

    /// Instantaneous impulse folded into velocity by the next step.
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.store.pending_impulses[self.index] += impulse;
    }

    fn refresh_mass_properties(&mut self) {
        let i = self.index;
        let (kind, mass) = (self.store.kinds[i], self.store.masses[i]);
        self.store.inv_masses[i] = inverse_mass(kind, mass);
        self.store.inv_inertias[i] = inverse_inertia(kind, &self.store.shapes[i], mass);
    }

    fn refresh_aabb(&mut self) {
        let i = self.index;
        let (position, rotation) = (self.store.positions[i], self.store.rotations[i]);
        self.store.aabbs[i] = self.store.shapes[i].aabb(position, rotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> BodyId {
        BodyId(n)
    }

    #[test]
    fn create_and_get() {
        let mut store = ObjectStore::new();
        let index = store
            .create(id(3), &BodyConfig::circle(2.).with_position(Vec2::new(1., 2.)))
            .unwrap();
        assert_eq!(index, 0);
        let body = store.get(id(3)).unwrap();
        assert_eq!(body.id(), id(3));
        assert_eq!(body.position(), Vec2::new(1., 2.));
        assert_eq!(body.shape(), Shape::Circle { radius: 2. });
        assert_eq!(body.inv_mass(), 1.);
        assert_eq!(body.aabb().min, Vec2::new(-1., 0.));
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut store = ObjectStore::new();
        store.create(id(7), &BodyConfig::point()).unwrap();
        assert_eq!(
            store.create(id(7), &BodyConfig::circle(1.)),
            Err(PhysicsError::DuplicateId(id(7)))
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id(7)).unwrap().shape(), Shape::Point);
    }

    #[test]
    fn invalid_config_leaves_store_untouched() {
        let mut store = ObjectStore::new();
        let result = store.create(id(1), &BodyConfig::circle(1.).with_mass(-1.));
        assert!(matches!(result, Err(PhysicsError::InvalidConfiguration(_))));
        assert!(store.is_empty());
        assert!(!store.contains(id(1)));
    }

    #[test]
    fn swap_remove_repoints_moved_id() {
        let mut store = ObjectStore::new();
        store.create(id(7), &BodyConfig::point()).unwrap();
        store
            .create(id(8), &BodyConfig::circle(0.5).with_velocity(Vec2::new(1., -1.)))
            .unwrap();
        store.remove(id(7)).unwrap();

        assert_eq!(store.len(), 1);
        let body = store.get(id(8)).unwrap();
        assert_eq!(body.index(), 0);
        assert_eq!(body.velocity(), Vec2::new(1., -1.));
        assert_eq!(body.shape(), Shape::Circle { radius: 0.5 });
        assert_eq!(store.get(id(7)).err(), Some(PhysicsError::NotFound(id(7))));
    }

    #[test]
    fn remove_missing_is_error() {
        let mut store = ObjectStore::new();
        store.create(id(1), &BodyConfig::point()).unwrap();
        assert_eq!(store.remove(id(2)), Err(PhysicsError::NotFound(id(2))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn index_map_stays_bijective() {
        let mut store = ObjectStore::with_capacity(64);
        for n in 0..50 {
            store.create(id(n), &BodyConfig::point()).unwrap();
        }
        for n in (0..50).step_by(3) {
            store.remove(id(n)).unwrap();
        }
        for index in 0..store.len() {
            let body = store.at(index).unwrap();
            assert_eq!(store.index_of(body.id()).unwrap(), index);
        }
        assert_eq!(store.len(), 50 - 17);
    }

    #[test]
    fn mass_writes() {
        let mut store = ObjectStore::new();
        store.create(id(1), &BodyConfig::circle(1.)).unwrap();
        store.create(id(2), &BodyConfig::circle(1.).fixed()).unwrap();

        store.get_mut(id(1)).unwrap().set_mass(5.).unwrap();
        assert_eq!(store.get(id(1)).unwrap().inv_mass(), 0.2);

        store.get_mut(id(2)).unwrap().set_mass(5.).unwrap();
        assert_eq!(store.get(id(2)).unwrap().inv_mass(), 0.);
        assert_eq!(store.get(id(2)).unwrap().inv_inertia(), 0.);

        assert!(store.get_mut(id(1)).unwrap().set_mass(-1.).is_err());
        assert_eq!(store.get(id(1)).unwrap().mass(), 5.);
    }

    #[test]
    fn kind_change_rederives_mass() {
        let mut store = ObjectStore::new();
        store
            .create(id(1), &BodyConfig::circle(1.).with_mass(4.).with_velocity(Vec2::X))
            .unwrap();
        let mut body = store.get_mut(id(1)).unwrap();
        body.set_kind(BodyKind::Fixed);
        assert_eq!(body.view().inv_mass(), 0.);
        assert_eq!(body.view().velocity(), Vec2::ZERO);
        body.set_kind(BodyKind::RigidBody);
        assert_eq!(body.view().inv_mass(), 0.25);
    }

    #[test]
    fn shape_change_updates_bounds() {
        let mut store = ObjectStore::new();
        store.create(id(1), &BodyConfig::point()).unwrap();
        let mut body = store.get_mut(id(1)).unwrap();
        body.set_shape(Shape::Aabb { width: 2., height: 4. }).unwrap();
        assert_eq!(body.view().aabb().max, Vec2::new(1., 2.));
        assert!(body.set_shape(Shape::Circle { radius: 0. }).is_err());
        assert_eq!(body.view().shape(), Shape::Aabb { width: 2., height: 4. });
    }

    #[test]
    fn for_each_visits_each_once() {
        let mut store = ObjectStore::new();
        for n in 0..10 {
            store.create(id(n), &BodyConfig::point()).unwrap();
        }
        let mut seen = Vec::new();
        store.for_each(|body| seen.push(body.id().0));
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn remove_where_collects_then_applies() {
        let mut store = ObjectStore::new();
        for n in 0..10 {
            store
                .create(id(n), &BodyConfig::point().with_position(Vec2::new(n as f32, 0.)))
                .unwrap();
        }
        let mut removed = store.remove_where(|body| body.position().x >= 5.);
        removed.sort();
        assert_eq!(removed, (5..10).map(id).collect::<Vec<_>>());
        assert_eq!(store.len(), 5);
        store.for_each(|body| assert!(body.position().x < 5.));
    }

    #[test]
    fn for_each_mut_writes_fields() {
        let mut store = ObjectStore::new();
        for n in 0..3 {
            store.create(id(n), &BodyConfig::point()).unwrap();
        }
        store.for_each_mut(|mut body| body.set_velocity(Vec2::Y));
        store.for_each(|body| assert_eq!(body.velocity(), Vec2::Y));
    }
}
