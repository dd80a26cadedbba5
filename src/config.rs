use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{invalid, PhysicsError, Result};

pub const DELTA_TIME: f32 = 1. / 60.;

/// How two bodies' material coefficients combine into one contact coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineRule {
    Max,
    Min,
    Average,
    Multiply,
}

impl Default for CombineRule {
    fn default() -> Self {
        Self::Max
    }
}

impl CombineRule {
    pub fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Max => a.max(b),
            Self::Min => a.min(b),
            Self::Average => (a + b) * 0.5,
            Self::Multiply => a * b,
        }
    }
}

/// Candidate pair generation strategy.
///
/// Brute force tests every pair and is O(n²); only reasonable for small
/// populations. Sweep-and-prune sorts bounds along x and is near-linear when
/// bodies are spread out, degrading when many bodies share an x range. The
/// tree is rebuilt every step and wins for dense, two-dimensional clutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadPhaseKind {
    BruteForce,
    SweepAndPrune,
    Tree,
}

impl Default for BroadPhaseKind {
    fn default() -> Self {
        Self::SweepAndPrune
    }
}

/// Box–box contact generation.
///
/// `SeparatingAxis` produces a single contact point from the minimum-overlap
/// axis, clipped to the reference face. It is known to give wrong impulses in
/// some edge-on configurations since it never builds a two-point manifold.
/// `Parry` delegates to parry2d's contact query for the closest features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxContactModel {
    SeparatingAxis,
    Parry,
}

impl Default for BoxContactModel {
    fn default() -> Self {
        Self::SeparatingAxis
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Gravity acceleration (default: -9.81 in Y)
    pub gravity: [f32; 2],

    /// Fixed timestep used by `step`
    pub time_step: f32,

    /// Coulomb friction at contacts
    pub friction_enabled: bool,

    /// Restitution at contacts; when off every contact is perfectly inelastic
    pub restitution_enabled: bool,

    /// Rule for restitution and both friction coefficients
    pub combine_rule: CombineRule,

    /// Fraction of the penetration (beyond the slop) removed per step
    pub position_correction: f32,

    /// Penetration tolerated without positional correction
    pub penetration_slop: f32,

    /// Tangential speed below which a contact counts as sticking
    pub static_friction_threshold: f32,

    pub broad_phase: BroadPhaseKind,

    pub box_contact: BoxContactModel,

    /// When false, broad and narrow phase are skipped entirely
    pub detect_collisions: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: [0., -9.81],
            time_step: DELTA_TIME,
            friction_enabled: true,
            restitution_enabled: true,
            combine_rule: CombineRule::Max,
            position_correction: 0.8,
            penetration_slop: 0.01,
            static_friction_threshold: 0.01,
            broad_phase: BroadPhaseKind::SweepAndPrune,
            box_contact: BoxContactModel::SeparatingAxis,
            detect_collisions: true,
        }
    }
}

impl WorldConfig {
    /// Free motion only: no collision detection at all.
    pub fn free_motion() -> Self {
        Self {
            detect_collisions: false,
            ..Default::default()
        }
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity.into();
        self
    }

    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_combine_rule(mut self, rule: CombineRule) -> Self {
        self.combine_rule = rule;
        self
    }

    pub fn with_broad_phase(mut self, kind: BroadPhaseKind) -> Self {
        self.broad_phase = kind;
        self
    }

    pub fn with_box_contact(mut self, model: BoxContactModel) -> Self {
        self.box_contact = model;
        self
    }

    pub fn with_position_correction(mut self, fraction: f32, slop: f32) -> Self {
        self.position_correction = fraction;
        self.penetration_slop = slop;
        self
    }

    pub fn gravity(&self) -> Vec2 {
        Vec2::from(self.gravity)
    }

    pub fn validate(&self) -> Result<()> {
        validate_time_step(self.time_step)?;
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(invalid(format!("gravity must be finite, got {:?}", self.gravity)));
        }
        if !(self.position_correction > 0. && self.position_correction <= 1.) {
            return Err(invalid(format!(
                "position_correction must be in (0, 1], got {}",
                self.position_correction
            )));
        }
        if !(self.penetration_slop >= 0. && self.penetration_slop.is_finite()) {
            return Err(invalid(format!(
                "penetration_slop must be finite and >= 0, got {}",
                self.penetration_slop
            )));
        }
        if !(self.static_friction_threshold >= 0. && self.static_friction_threshold.is_finite()) {
            return Err(invalid(format!(
                "static_friction_threshold must be finite and >= 0, got {}",
                self.static_friction_threshold
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_time_step(dt: f32) -> Result<()> {
    if dt > 0. && dt.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidTimeStep(dt))
    }
}
