use std::fmt;

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;
use crate::error::{invalid, Result};
use crate::rotation::Rot;

/// Caller-assigned identifier, unique among live bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

impl From<u32> for BodyId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Dynamic, fully participates in collision response
    RigidBody,
    /// Reports overlaps, never receives impulses or positional correction
    Sensor,
    /// Immovable, infinitely massive
    Fixed,
}

impl Default for BodyKind {
    fn default() -> Self {
        Self::RigidBody
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Point,
    Circle,
    Aabb,
    Box,
    Ellipse,
    Capsule,
    Polygon,
}

/// Collision geometry. Sizes are full widths and heights, not half extents.
///
/// `Aabb` never rotates with its body; `Box` does. Ellipse and capsule bodies
/// get correct bounds and broad-phase candidacy but no narrow-phase contacts.
/// `Polygon` is reserved and rejected at creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Point,
    Circle { radius: f32 },
    Aabb { width: f32, height: f32 },
    Box { width: f32, height: f32 },
    Ellipse { width: f32, height: f32 },
    /// Capsule along its local x axis; `height` is the cap diameter.
    Capsule { width: f32, height: f32 },
    Polygon,
}

impl Default for Shape {
    fn default() -> Self {
        Self::Point
    }
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Point => ShapeKind::Point,
            Shape::Circle { .. } => ShapeKind::Circle,
            Shape::Aabb { .. } => ShapeKind::Aabb,
            Shape::Box { .. } => ShapeKind::Box,
            Shape::Ellipse { .. } => ShapeKind::Ellipse,
            Shape::Capsule { .. } => ShapeKind::Capsule,
            Shape::Polygon => ShapeKind::Polygon,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f32| {
            if v > 0. && v.is_finite() {
                Ok(())
            } else {
                let kind = self.kind();
                Err(invalid(format!("{:?} {} must be finite and > 0, got {}", kind, name, v)))
            }
        };
        match *self {
            Shape::Point => Ok(()),
            Shape::Circle { radius } => positive("radius", radius),
            Shape::Aabb { width, height }
            | Shape::Box { width, height }
            | Shape::Ellipse { width, height }
            | Shape::Capsule { width, height } => {
                positive("width", width)?;
                positive("height", height)
            }
            Shape::Polygon => Err(invalid("polygon shapes are not supported yet")),
        }
    }

    /// Half of width and height for the rectangular kinds, the radius on both
    /// axes for circles, zero for points.
    pub fn half_extents(&self) -> Vec2 {
        match *self {
            Shape::Point | Shape::Polygon => Vec2::ZERO,
            Shape::Circle { radius } => Vec2::splat(radius),
            Shape::Aabb { width, height }
            | Shape::Box { width, height }
            | Shape::Ellipse { width, height }
            | Shape::Capsule { width, height } => Vec2::new(width, height) * 0.5,
        }
    }

    /// Points have no extent and never collide with each other.
    pub fn has_extent(&self) -> bool {
        !matches!(self, Shape::Point | Shape::Polygon)
    }

    pub fn moment_of_inertia(&self, mass: f32) -> f32 {
        match *self {
            Shape::Point | Shape::Aabb { .. } | Shape::Polygon => 0.,
            Shape::Circle { radius } => 0.5 * mass * radius * radius,
            Shape::Box { width, height } | Shape::Capsule { width, height } => {
                mass * (width * width + height * height) / 12.
            }
            Shape::Ellipse { width, height } => {
                let (a, b) = (width * 0.5, height * 0.5);
                0.25 * mass * (a * a + b * b)
            }
        }
    }

    /// World-space bounds at the given pose. Rotated shapes are enclosed
    /// including all of their rotated extent.
    pub fn aabb(&self, position: Vec2, rotation: f32) -> Aabb {
        match *self {
            Shape::Point | Shape::Polygon => Aabb::new(position, position),
            Shape::Circle { radius } => Aabb::from_center(position, Vec2::splat(radius)),
            Shape::Aabb { .. } => Aabb::from_center(position, self.half_extents()),
            Shape::Box { .. } => {
                let half = self.half_extents();
                let rot = Rot::from_radians(rotation);
                let (c, s) = (rot.cos().abs(), rot.sin().abs());
                let extent = Vec2::new(c * half.x + s * half.y, s * half.x + c * half.y);
                Aabb::from_center(position, extent)
            }
            Shape::Ellipse { .. } => {
                let half = self.half_extents();
                let (a, b) = (half.x, half.y);
                let rot = Rot::from_radians(rotation);
                let (c, s) = (rot.cos(), rot.sin());
                let extent = Vec2::new(
                    (a * a * c * c + b * b * s * s).sqrt(),
                    (a * a * s * s + b * b * c * c).sqrt(),
                );
                Aabb::from_center(position, extent)
            }
            Shape::Capsule { width, height } => {
                let radius = height * 0.5;
                let half_len = (width * 0.5 - radius).max(0.);
                let tip = Rot::from_radians(rotation).rotate(Vec2::new(half_len, 0.));
                Aabb::from_center(position, tip.abs() + Vec2::splat(radius))
            }
        }
    }
}

/// Surface and motion coefficients of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Multiplies the world gravity acting on this body
    pub gravity_scale: f32,
    /// Bounciness, nominally in [0, 1]
    pub restitution: f32,
    pub static_friction: f32,
    pub kinetic_friction: f32,
    /// Fraction-per-second style decay rate of linear velocity, >= 0
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            gravity_scale: 1.,
            restitution: 0.,
            static_friction: 0.,
            kinetic_friction: 0.,
            linear_damping: 0.,
            angular_damping: 0.,
        }
    }
}

impl Material {
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, static_friction: f32, kinetic_friction: f32) -> Self {
        self.static_friction = static_friction;
        self.kinetic_friction = kinetic_friction;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gravity_scale.is_finite() {
            let scale = self.gravity_scale;
            return Err(invalid(format!("gravity_scale must be finite, got {}", scale)));
        }
        let fields = [
            ("restitution", self.restitution),
            ("static_friction", self.static_friction),
            ("kinetic_friction", self.kinetic_friction),
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
        ];
        for (name, value) in fields {
            if !(value >= 0. && value.is_finite()) {
                return Err(invalid(format!("{} must be finite and >= 0, got {}", name, value)));
            }
        }
        Ok(())
    }
}

/// Bits describing what the last step found for a body. Debug tooling only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CollisionFlags(u8);

impl CollisionFlags {
    pub const NONE: Self = Self(0);
    /// Bounds overlapped another body's bounds
    pub const BROAD_PHASE: Self = Self(0b01);
    /// Exact shapes touched
    pub const CONTACT: Self = Self(0b10);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// Everything needed to create a body. Unset fields keep their defaults:
/// a rigid point of mass 1 at rest at the origin, zero damping and zero
/// restitution and friction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyConfig {
    pub kind: BodyKind,
    pub shape: Shape,
    pub position: Vec2,
    pub rotation: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub mass: f32,
    pub material: Material,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            kind: BodyKind::RigidBody,
            shape: Shape::Point,
            position: Vec2::ZERO,
            rotation: 0.,
            velocity: Vec2::ZERO,
            angular_velocity: 0.,
            mass: 1.,
            material: Material::default(),
        }
    }
}

impl BodyConfig {
    pub fn point() -> Self {
        Self::default()
    }

    pub fn circle(radius: f32) -> Self {
        Self::default().with_shape(Shape::Circle { radius })
    }

    /// A rotatable box.
    pub fn rect(width: f32, height: f32) -> Self {
        Self::default().with_shape(Shape::Box { width, height })
    }

    pub fn aabb(width: f32, height: f32) -> Self {
        Self::default().with_shape(Shape::Aabb { width, height })
    }

    pub fn fixed(mut self) -> Self {
        self.kind = BodyKind::Fixed;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.kind = BodyKind::Sensor;
        self
    }

    pub fn with_kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: f32) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.material.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, static_friction: f32, kinetic_friction: f32) -> Self {
        self.material = self.material.with_friction(static_friction, kinetic_friction);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.shape.validate()?;
        validate_mass(self.mass)?;
        self.material.validate()?;
        let finite = self.position.is_finite()
            && self.velocity.is_finite()
            && self.rotation.is_finite()
            && self.angular_velocity.is_finite();
        if !finite {
            return Err(invalid("kinematic state must be finite"));
        }
        Ok(())
    }
}

pub(crate) fn validate_mass(mass: f32) -> Result<()> {
    if mass >= 0. && mass.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("mass must be finite and >= 0, got {}", mass)))
    }
}

/// 1/mass, or 0 for immovable bodies.
pub(crate) fn inverse_mass(kind: BodyKind, mass: f32) -> f32 {
    if kind == BodyKind::Fixed || mass == 0. {
        0.
    } else {
        1. / mass
    }
}

pub(crate) fn inverse_inertia(kind: BodyKind, shape: &Shape, mass: f32) -> f32 {
    let inertia = shape.moment_of_inertia(mass);
    if kind == BodyKind::Fixed || inertia == 0. {
        0.
    } else {
        1. / inertia
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn defaults_follow_contract() {
        let config = BodyConfig::default();
        assert_eq!(config.kind, BodyKind::RigidBody);
        assert_eq!(config.shape, Shape::Point);
        assert_eq!(config.mass, 1.);
        assert_eq!(config.material.linear_damping, 0.);
        assert_eq!(config.material.restitution, 0.);
        assert_eq!(config.material.static_friction, 0.);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_nonsense() {
        assert!(BodyConfig::circle(-1.).validate().is_err());
        assert!(BodyConfig::rect(1., 0.).validate().is_err());
        assert!(BodyConfig::circle(1.).with_mass(-2.).validate().is_err());
        assert!(BodyConfig::point().with_shape(Shape::Polygon).validate().is_err());
        assert!(BodyConfig::point()
            .with_material(Material::default().with_damping(-0.1, 0.))
            .validate()
            .is_err());
        assert!(BodyConfig::point()
            .with_velocity(Vec2::new(f32::INFINITY, 0.))
            .validate()
            .is_err());
    }

    #[test]
    fn inverse_mass_rules() {
        assert_eq!(inverse_mass(BodyKind::RigidBody, 5.), 0.2);
        assert_eq!(inverse_mass(BodyKind::RigidBody, 0.), 0.);
        assert_eq!(inverse_mass(BodyKind::Fixed, 5.), 0.);
        assert_eq!(inverse_mass(BodyKind::Sensor, 2.), 0.5);
    }

    #[test]
    fn rotated_box_bounds_enclose_corners() {
        let mut rng = StdRng::seed_from_u64(11);
        let shape = Shape::Box { width: 3., height: 1. };
        for _ in 0..64 {
            let rot: Rot = rng.gen();
            let center = Vec2::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0));
            let aabb = shape.aabb(center, rot.as_radians());
            for corner in [
                Vec2::new(1.5, 0.5),
                Vec2::new(-1.5, 0.5),
                Vec2::new(1.5, -0.5),
                Vec2::new(-1.5, -0.5),
            ] {
                let p = center + rot.rotate(corner);
                assert!(aabb.expanded(1e-4).contains_point(p));
            }
        }
    }

    #[test]
    fn quarter_turn_box_swaps_extents() {
        let aabb = Shape::Box { width: 4., height: 2. }
            .aabb(Vec2::ZERO, std::f32::consts::FRAC_PI_2);
        assert_abs_diff_eq!(aabb.max.x, 1., epsilon = 1e-5);
        assert_abs_diff_eq!(aabb.max.y, 2., epsilon = 1e-5);
    }

    #[test]
    fn ellipse_bounds_follow_rotation() {
        let shape = Shape::Ellipse { width: 4., height: 2. };
        let flat = shape.aabb(Vec2::ZERO, 0.);
        assert_abs_diff_eq!(flat.max.x, 2., epsilon = 1e-5);
        assert_abs_diff_eq!(flat.max.y, 1., epsilon = 1e-5);
        let upright = shape.aabb(Vec2::new(1., 1.), std::f32::consts::FRAC_PI_2);
        assert_abs_diff_eq!(upright.max.x, 2., epsilon = 1e-5);
        assert_abs_diff_eq!(upright.max.y, 3., epsilon = 1e-5);
    }

    #[test]
    fn aabb_shape_ignores_rotation() {
        let shape = Shape::Aabb { width: 2., height: 2. };
        assert_eq!(shape.aabb(Vec2::ZERO, 0.7), shape.aabb(Vec2::ZERO, 0.));
    }

    #[test]
    fn inertia_by_shape() {
        assert_eq!(Shape::Circle { radius: 2. }.moment_of_inertia(1.), 2.);
        assert_abs_diff_eq!(
            Shape::Box { width: 1., height: 1. }.moment_of_inertia(6.),
            1.,
            epsilon = 1e-6
        );
        assert_eq!(Shape::Aabb { width: 1., height: 1. }.moment_of_inertia(6.), 0.);
        assert_eq!(inverse_inertia(BodyKind::Fixed, &Shape::Circle { radius: 1. }, 1.), 0.);
    }

    #[test]
    fn flags() {
        let mut flags = CollisionFlags::NONE;
        flags.insert(CollisionFlags::BROAD_PHASE);
        assert!(flags.contains(CollisionFlags::BROAD_PHASE));
        assert!(!flags.contains(CollisionFlags::CONTACT));
        flags.insert(CollisionFlags::CONTACT);
        assert_eq!(flags.bits(), 0b11);
        flags.clear();
        assert_eq!(flags, CollisionFlags::NONE);
    }
}
