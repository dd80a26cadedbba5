use bevy::math::Vec2;

use crate::store::ObjectStore;

/// Continuous exponential decay: `exp(-rate * dt)`. A zero rate is exactly 1.
pub fn damping_factor(rate: f32, dt: f32) -> f32 {
    (-rate * dt).exp()
}

/// Advances every movable body by `dt` and consumes the pending forces and
/// impulses. Immovable bodies keep their pose; their pending effects are
/// dropped.
pub fn integrate(store: &mut ObjectStore, gravity: Vec2, dt: f32) {
    for i in 0..store.len() {
        let pending_force = std::mem::take(&mut store.pending_forces[i]);
        let pending_impulse = std::mem::take(&mut store.pending_impulses[i]);

        let inv_mass = store.inv_masses[i];
        if inv_mass == 0. {
            store.forces[i] = Vec2::ZERO;
            store.impulses[i] = Vec2::ZERO;
            continue;
        }

        let material = &store.materials[i];
        let gravitation_force = gravity * store.masses[i] * material.gravity_scale;
        let net_force = pending_force + gravitation_force;

        let vel = &mut store.velocities[i];
        *vel += net_force * inv_mass * dt;
        *vel += pending_impulse * inv_mass;
        *vel *= damping_factor(material.linear_damping, dt);
        store.positions[i] += *vel * dt;

        let ang_vel = &mut store.angular_velocities[i];
        *ang_vel *= damping_factor(material.angular_damping, dt);
        store.rotations[i] += *ang_vel * dt;

        store.forces[i] = net_force;
        store.impulses[i] = pending_impulse;
    }
}

/// Recomputes every body's bounds from its current pose.
pub fn update_aabbs(store: &mut ObjectStore) {
    for i in 0..store.len() {
        store.aabbs[i] = store.shapes[i].aabb(store.positions[i], store.rotations[i]);
    }
}
