use bevy::log::trace;
use bevy::math::Vec2;

use crate::components::BodyKind;
use crate::config::WorldConfig;
use crate::contact::Manifold;
use crate::store::ObjectStore;

/// Effective masses at or below this are treated as immovable.
const MIN_EFFECTIVE_MASS: f32 = 1e-9;
/// Tangential speeds below this have no usable direction.
const MIN_TANGENT_SPEED: f32 = 1e-6;

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// `w × r` for a scalar angular velocity.
fn cross_scalar(w: f32, r: Vec2) -> Vec2 {
    Vec2::new(-w * r.y, w * r.x)
}

struct ContactBodies {
    a: usize,
    b: usize,
    r_a: Vec2,
    r_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_inertia_a: f32,
    inv_inertia_b: f32,
}

impl ContactBodies {
    /// Velocity of B's contact point relative to A's.
    fn relative_velocity(&self, store: &ObjectStore) -> Vec2 {
        let spin_a = cross_scalar(store.angular_velocities[self.a], self.r_a);
        let spin_b = cross_scalar(store.angular_velocities[self.b], self.r_b);
        (store.velocities[self.b] + spin_b) - (store.velocities[self.a] + spin_a)
    }

    /// Inverse of the effective mass along `dir`.
    fn inv_effective_mass(&self, dir: Vec2) -> f32 {
        let ra_n = cross(self.r_a, dir);
        let rb_n = cross(self.r_b, dir);
        self.inv_mass_a
            + self.inv_mass_b
            + ra_n * ra_n * self.inv_inertia_a
            + rb_n * rb_n * self.inv_inertia_b
    }

    /// Applies `impulse` to B and its opposite to A.
    fn apply(&self, store: &mut ObjectStore, impulse: Vec2) {
        store.velocities[self.a] -= impulse * self.inv_mass_a;
        store.angular_velocities[self.a] -= self.inv_inertia_a * cross(self.r_a, impulse);
        store.velocities[self.b] += impulse * self.inv_mass_b;
        store.angular_velocities[self.b] += self.inv_inertia_b * cross(self.r_b, impulse);
        store.impulses[self.a] -= impulse;
        store.impulses[self.b] += impulse;
    }
}

/// Resolves every manifold in order. Returns how many received an impulse.
pub fn resolve(store: &mut ObjectStore, manifolds: &[Manifold], config: &WorldConfig) -> usize {
    manifolds
        .iter()
        .filter(|m| resolve_contact(store, m, config))
        .count()
}

/// Impulse along the normal with restitution, clamped Coulomb friction along
/// the tangent, then positional correction. Returns whether an impulse was
/// applied.
pub fn resolve_contact(store: &mut ObjectStore, manifold: &Manifold, config: &WorldConfig) -> bool {
    let (a, b) = (manifold.index_a, manifold.index_b);
    if store.kinds[a] == BodyKind::Sensor || store.kinds[b] == BodyKind::Sensor {
        return false;
    }
    let bodies = ContactBodies {
        a,
        b,
        r_a: manifold.point - store.positions[a],
        r_b: manifold.point - store.positions[b],
        inv_mass_a: store.inv_masses[a],
        inv_mass_b: store.inv_masses[b],
        inv_inertia_a: store.inv_inertias[a],
        inv_inertia_b: store.inv_inertias[b],
    };
    if bodies.inv_mass_a + bodies.inv_mass_b <= 0. {
        return false;
    }

    let normal = manifold.normal;
    let applied = apply_normal_impulse(store, &bodies, manifold, config);
    correct_position(store, &bodies, normal, manifold.penetration, config);
    applied
}

fn apply_normal_impulse(
    store: &mut ObjectStore,
    bodies: &ContactBodies,
    manifold: &Manifold,
    config: &WorldConfig,
) -> bool {
    let normal = manifold.normal;
    let normal_speed = bodies.relative_velocity(store).dot(normal);
    if normal_speed >= 0. {
        // already separating
        return false;
    }

    let k_normal = bodies.inv_effective_mass(normal);
    if k_normal <= MIN_EFFECTIVE_MASS {
        trace!(
            "degenerate effective mass between {} and {}, skipping",
            manifold.body_a,
            manifold.body_b
        );
        return false;
    }

    let (mat_a, mat_b) = (store.materials[bodies.a], store.materials[bodies.b]);
    let rule = config.combine_rule;
    let restitution = if config.restitution_enabled {
        rule.combine(mat_a.restitution, mat_b.restitution)
    } else {
        0.
    };

    let j = -(1. + restitution) * normal_speed / k_normal;
    bodies.apply(store, normal * j);

    if !config.friction_enabled {
        return true;
    }

    let rv = bodies.relative_velocity(store);
    let tangent_velocity = rv - normal * rv.dot(normal);
    let tangent_speed = tangent_velocity.length();
    if tangent_speed < MIN_TANGENT_SPEED {
        return true;
    }
    let tangent = tangent_velocity / tangent_speed;
    let k_tangent = bodies.inv_effective_mass(tangent);
    if k_tangent <= MIN_EFFECTIVE_MASS {
        return true;
    }

    let mu = if tangent_speed < config.static_friction_threshold {
        rule.combine(mat_a.static_friction, mat_b.static_friction)
    } else {
        rule.combine(mat_a.kinetic_friction, mat_b.kinetic_friction)
    };
    let max_friction = mu * j;
    let jt = (-tangent_speed / k_tangent).clamp(-max_friction, max_friction);
    if jt != 0. {
        bodies.apply(store, tangent * jt);
    }
    true
}

/// Moves the pair apart along the normal, shared by inverse mass. Only
/// positions change.
fn correct_position(
    store: &mut ObjectStore,
    bodies: &ContactBodies,
    normal: Vec2,
    penetration: f32,
    config: &WorldConfig,
) {
    let excess = (penetration - config.penetration_slop).max(0.);
    if excess == 0. {
        return;
    }
    let total = bodies.inv_mass_a + bodies.inv_mass_b;
    let correction = normal * (excess / total * config.position_correction);
    store.positions[bodies.a] -= correction * bodies.inv_mass_a;
    store.positions[bodies.b] += correction * bodies.inv_mass_b;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BodyConfig, BodyId};
    use approx::assert_abs_diff_eq;

    fn manifold(
        store: &ObjectStore,
        a: u32,
        b: u32,
        normal: Vec2,
        penetration: f32,
        point: Vec2,
    ) -> Manifold {
        Manifold {
            body_a: BodyId(a),
            body_b: BodyId(b),
            index_a: store.index_of(BodyId(a)).unwrap(),
            index_b: store.index_of(BodyId(b)).unwrap(),
            normal,
            penetration,
            point,
        }
    }

    fn momentum(store: &ObjectStore) -> Vec2 {
        store
            .iter()
            .fold(Vec2::ZERO, |acc, b| acc + b.velocity() * b.mass())
    }

    fn head_on(restitution: f32) -> ObjectStore {
        let mut store = ObjectStore::new();
        store
            .create(
                BodyId(1),
                &BodyConfig::circle(1.)
                    .with_position(Vec2::new(-0.9, 0.))
                    .with_velocity(Vec2::new(2., 0.))
                    .with_restitution(restitution),
            )
            .unwrap();
        store
            .create(
                BodyId(2),
                &BodyConfig::circle(1.)
                    .with_position(Vec2::new(0.9, 0.))
                    .with_restitution(restitution),
            )
            .unwrap();
        store
    }

    #[test]
    fn elastic_equal_masses_exchange_velocity() {
        let mut store = head_on(1.);
        let m = manifold(&store, 1, 2, Vec2::X, 0.2, Vec2::ZERO);
        assert!(resolve_contact(&mut store, &m, &WorldConfig::default()));
        assert_abs_diff_eq!(store.get(BodyId(1)).unwrap().velocity().x, 0., epsilon = 1e-5);
        assert_abs_diff_eq!(store.get(BodyId(2)).unwrap().velocity().x, 2., epsilon = 1e-5);
    }

    #[test]
    fn restitution_toggle_makes_contacts_inelastic() {
        let mut store = head_on(1.);
        let config = WorldConfig {
            restitution_enabled: false,
            ..Default::default()
        };
        let m = manifold(&store, 1, 2, Vec2::X, 0.2, Vec2::ZERO);
        resolve_contact(&mut store, &m, &config);
        let (va, vb) = (
            store.get(BodyId(1)).unwrap().velocity(),
            store.get(BodyId(2)).unwrap().velocity(),
        );
        assert_abs_diff_eq!(va.x, 1., epsilon = 1e-5);
        assert_abs_diff_eq!(vb.x, 1., epsilon = 1e-5);
    }

    #[test]
    fn momentum_is_conserved_and_impulses_recorded() {
        let mut store = head_on(0.5);
        store.get_mut(BodyId(2)).unwrap().set_mass(3.).unwrap();
        let before = momentum(&store);
        let m = manifold(&store, 1, 2, Vec2::X, 0.2, Vec2::ZERO);
        resolve_contact(&mut store, &m, &WorldConfig::default());
        let after = momentum(&store);
        assert_abs_diff_eq!(before.x, after.x, epsilon = 1e-5);
        assert_abs_diff_eq!(before.y, after.y, epsilon = 1e-5);

        let (ja, jb) = (
            store.get(BodyId(1)).unwrap().impulse(),
            store.get(BodyId(2)).unwrap().impulse(),
        );
        assert_abs_diff_eq!(ja.x, -jb.x, epsilon = 1e-6);
        assert!(jb.x > 0.);
    }

    #[test]
    fn separating_pair_gets_no_impulse_but_is_pushed_apart() {
        let mut store = head_on(1.);
        store.get_mut(BodyId(1)).unwrap().set_velocity(Vec2::new(-1., 0.));
        let m = manifold(&store, 1, 2, Vec2::X, 0.2, Vec2::ZERO);
        assert!(!resolve_contact(&mut store, &m, &WorldConfig::default()));
        let (a, b) = (store.get(BodyId(1)).unwrap(), store.get(BodyId(2)).unwrap());
        assert_eq!(a.velocity(), Vec2::new(-1., 0.));
        assert_eq!(b.velocity(), Vec2::ZERO);
        assert!(a.position().x < -0.9);
        assert!(b.position().x > 0.9);
    }

    #[test]
    fn correction_respects_slop_and_fraction() {
        let mut store = head_on(0.);
        let config = WorldConfig::default().with_position_correction(0.5, 0.1);
        let m = manifold(&store, 1, 2, Vec2::X, 0.5, Vec2::ZERO);
        resolve_contact(&mut store, &m, &config);
        // (0.5 - 0.1) * 0.5 split evenly between equal masses
        assert_abs_diff_eq!(store.get(BodyId(1)).unwrap().position().x, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(store.get(BodyId(2)).unwrap().position().x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn fixed_body_takes_everything() {
        let mut store = ObjectStore::new();
        store
            .create(
                BodyId(1),
                &BodyConfig::circle(1.).with_velocity(Vec2::new(0., -3.)).with_restitution(1.),
            )
            .unwrap();
        store
            .create(
                BodyId(2),
                &BodyConfig::aabb(10., 1.).with_position(Vec2::new(0., -1.4)).fixed(),
            )
            .unwrap();
        let m = manifold(&store, 1, 2, Vec2::new(0., -1.), 0.1, Vec2::new(0., -0.9));
        resolve_contact(&mut store, &m, &WorldConfig::default().with_position_correction(1., 0.));
        let ball = store.get(BodyId(1)).unwrap();
        assert_abs_diff_eq!(ball.velocity().y, 3., epsilon = 1e-5);
        assert_abs_diff_eq!(ball.position().y, 0.1, epsilon = 1e-5);
        let ground = store.get(BodyId(2)).unwrap();
        assert_eq!(ground.velocity(), Vec2::ZERO);
        assert_eq!(ground.position(), Vec2::new(0., -1.4));
    }

    #[test]
    fn immovable_pair_is_skipped() {
        let mut store = ObjectStore::new();
        store.create(BodyId(1), &BodyConfig::circle(1.).fixed()).unwrap();
        store.create(BodyId(2), &BodyConfig::circle(1.).with_mass(0.)).unwrap();
        let m = manifold(&store, 1, 2, Vec2::X, 2., Vec2::ZERO);
        assert!(!resolve_contact(&mut store, &m, &WorldConfig::default()));
        assert_eq!(store.get(BodyId(2)).unwrap().position(), Vec2::ZERO);
    }

    #[test]
    fn sensors_receive_nothing() {
        let mut store = head_on(1.);
        store.get_mut(BodyId(2)).unwrap().set_kind(BodyKind::Sensor);
        let m = manifold(&store, 1, 2, Vec2::X, 0.2, Vec2::ZERO);
        assert!(!resolve_contact(&mut store, &m, &WorldConfig::default()));
        assert_eq!(store.get(BodyId(1)).unwrap().velocity(), Vec2::new(2., 0.));
        assert_eq!(store.get(BodyId(1)).unwrap().position(), Vec2::new(-0.9, 0.));
    }

    fn sliding_block(vx: f32, friction: (f32, f32)) -> ObjectStore {
        let mut store = ObjectStore::new();
        store
            .create(
                BodyId(1),
                &BodyConfig::aabb(1., 1.)
                    .with_velocity(Vec2::new(vx, -1.))
                    .with_friction(friction.0, friction.1),
            )
            .unwrap();
        store
            .create(
                BodyId(2),
                &BodyConfig::aabb(10., 1.).with_position(Vec2::new(0., -1.)).fixed(),
            )
            .unwrap();
        store
    }

    #[test]
    fn kinetic_friction_is_clamped_by_normal_impulse() {
        let mut store = sliding_block(5., (0.8, 0.2));
        let m = manifold(&store, 1, 2, Vec2::new(0., -1.), 0., Vec2::new(0., -0.5));
        resolve_contact(&mut store, &m, &WorldConfig::default());
        let v = store.get(BodyId(1)).unwrap().velocity();
        // normal impulse 1 (no bounce), so friction removes at most 0.2
        assert_abs_diff_eq!(v.y, 0., epsilon = 1e-5);
        assert_abs_diff_eq!(v.x, 4.8, epsilon = 1e-5);
    }

    #[test]
    fn slow_contacts_use_static_friction() {
        let mut store = sliding_block(0.005, (0.8, 0.));
        let m = manifold(&store, 1, 2, Vec2::new(0., -1.), 0., Vec2::new(0., -0.5));
        resolve_contact(&mut store, &m, &WorldConfig::default());
        assert_abs_diff_eq!(store.get(BodyId(1)).unwrap().velocity().x, 0., epsilon = 1e-6);
    }

    #[test]
    fn friction_toggle() {
        let mut store = sliding_block(5., (0.8, 0.8));
        let config = WorldConfig {
            friction_enabled: false,
            ..Default::default()
        };
        let m = manifold(&store, 1, 2, Vec2::new(0., -1.), 0., Vec2::new(0., -0.5));
        resolve_contact(&mut store, &m, &config);
        assert_eq!(store.get(BodyId(1)).unwrap().velocity().x, 5.);
    }

    #[test]
    fn off_center_hit_spins_a_box() {
        let mut store = ObjectStore::new();
        store.create(BodyId(1), &BodyConfig::rect(2., 2.)).unwrap();
        store
            .create(
                BodyId(2),
                &BodyConfig::circle(0.5)
                    .with_position(Vec2::new(0.5, 1.4))
                    .with_velocity(Vec2::new(0., -2.)),
            )
            .unwrap();
        let m = manifold(&store, 1, 2, Vec2::Y, 0.1, Vec2::new(0.5, 1.));
        resolve_contact(&mut store, &m, &WorldConfig::default());
        let block = store.get(BodyId(1)).unwrap();
        assert!(block.velocity().y < 0.);
        assert!(block.angular_velocity() < 0.);
    }
}
