use std::f32::consts::PI;
use std::ops::Mul;

use bevy::math::{Quat, Vec2};
use rand::distributions::Standard;
use rand::prelude::Distribution;

/// A planar rotation stored as its cosine and sine, so rotating a vector never
/// calls into trigonometry again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot {
    cos: f32,
    sin: f32,
}

impl Default for Rot {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Rot {
    pub const ZERO: Self = Self { cos: 1., sin: 0. };

    pub fn from_radians(radians: f32) -> Self {
        Self {
            cos: radians.cos(),
            sin: radians.sin(),
        }
    }

    pub fn from_degrees(degrees: f32) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    pub fn as_radians(&self) -> f32 {
        f32::atan2(self.sin, self.cos)
    }

    /// Local frame to world frame.
    pub fn rotate(&self, vec: Vec2) -> Vec2 {
        Vec2::new(
            vec.x * self.cos - vec.y * self.sin,
            vec.x * self.sin + vec.y * self.cos,
        )
    }

    /// World frame to local frame.
    pub fn unrotate(&self, vec: Vec2) -> Vec2 {
        self.inv().rotate(vec)
    }

    pub fn inv(self) -> Self {
        Self {
            cos: self.cos,
            sin: -self.sin,
        }
    }

    /// The rotated x and y axes of this frame.
    pub fn axes(self) -> [Vec2; 2] {
        [
            Vec2::new(self.cos, self.sin),
            Vec2::new(-self.sin, self.cos),
        ]
    }

    pub fn sin(self) -> f32 {
        self.sin
    }

    pub fn cos(self) -> f32 {
        self.cos
    }
}

impl Mul<Rot> for Rot {
    type Output = Self;
    fn mul(self, rhs: Rot) -> Self::Output {
        Self {
            cos: self.cos * rhs.cos - self.sin * rhs.sin,
            sin: self.sin * rhs.cos + self.cos * rhs.sin,
        }
    }
}

impl From<f32> for Rot {
    fn from(radians: f32) -> Self {
        Self::from_radians(radians)
    }
}

impl From<Rot> for f32 {
    fn from(rot: Rot) -> Self {
        rot.as_radians()
    }
}

impl From<Rot> for Quat {
    fn from(rot: Rot) -> Self {
        Quat::from_rotation_z(rot.as_radians())
    }
}

impl Distribution<Rot> for Standard {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Rot {
        let radians = rng.gen_range::<f32, _>(-PI..PI);
        Rot::from_radians(radians)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn quarter_turn_maps_x_to_y() {
        let v = Rot::from_degrees(90.).rotate(Vec2::X);
        assert_abs_diff_eq!(v.x, 0., epsilon = 1e-6);
        assert_abs_diff_eq!(v.y, 1., epsilon = 1e-6);
    }

    #[test]
    fn unrotate_inverts_rotate() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let rot: Rot = rng.gen();
            let v = Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
            let back = rot.unrotate(rot.rotate(v));
            assert_abs_diff_eq!(back.x, v.x, epsilon = 1e-4);
            assert_abs_diff_eq!(back.y, v.y, epsilon = 1e-4);
        }
    }

    #[test]
    fn composition_adds_angles() {
        let r = Rot::from_radians(0.3) * Rot::from_radians(0.4);
        assert_abs_diff_eq!(r.as_radians(), 0.7, epsilon = 1e-6);
    }

    #[test]
    fn quat_matches_angle() {
        let q: Quat = Rot::from_radians(1.2).into();
        let v = q * bevy::math::Vec3::X;
        assert_abs_diff_eq!(v.x, 1.2f32.cos(), epsilon = 1e-5);
        assert_abs_diff_eq!(v.y, 1.2f32.sin(), epsilon = 1e-5);
    }
}
