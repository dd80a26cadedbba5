use bevy::log::{trace, warn};
use bevy::math::Vec2;
use nalgebra::Vector2;
use parry2d::math::Isometry;
use parry2d::shape::Cuboid;

use crate::components::{BodyId, Shape, ShapeKind};
use crate::config::BoxContactModel;
use crate::rotation::Rot;

/// Below this center distance a normal cannot be derived.
const DEGENERATE_DISTANCE: f32 = 1e-6;
/// Incident vertices this close to the deepest one share the contact.
const VERTEX_TOLERANCE: f32 = 1e-3;

/// Normal points from the first shape towards the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub penetration: f32,
    pub normal: Vec2,
    pub point: Vec2,
}

impl Contact {
    fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

/// One contact between two live bodies found during a step. The indices are
/// only meaningful until the population next changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manifold {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub index_a: usize,
    pub index_b: usize,
    /// Unit normal from A towards B
    pub normal: Vec2,
    pub penetration: f32,
    pub point: Vec2,
}

/// A shape at a pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: Shape,
    pub position: Vec2,
    pub rotation: f32,
}

impl Collider {
    pub fn new(shape: Shape, position: Vec2, rotation: f32) -> Self {
        Self {
            shape,
            position,
            rotation,
        }
    }

    /// Frame of a rectangular shape. AABBs never rotate.
    fn frame(&self) -> Rot {
        match self.shape {
            Shape::Aabb { .. } => Rot::ZERO,
            _ => Rot::from_radians(self.rotation),
        }
    }
}

fn is_rect(kind: ShapeKind) -> bool {
    matches!(kind, ShapeKind::Aabb | ShapeKind::Box)
}

/// Whether the narrow phase has a test for this shape pair.
pub fn is_supported(a: ShapeKind, b: ShapeKind) -> bool {
    use ShapeKind::*;
    match (a, b) {
        (Point, Point) => false,
        (Point | Circle, Point | Circle) => true,
        (Point | Circle, _) => is_rect(b),
        (_, Point | Circle) => is_rect(a),
        _ => is_rect(a) && is_rect(b),
    }
}

/// Dispatches on the shape pair. Unsupported pairs never collide.
pub fn collide(a: &Collider, b: &Collider, model: BoxContactModel) -> Option<Contact> {
    let (kind_a, kind_b) = (a.shape.kind(), b.shape.kind());
    match (a.shape, b.shape) {
        (Shape::Point, Shape::Point) => None,
        (Shape::Point | Shape::Circle { .. }, Shape::Point | Shape::Circle { .. }) => {
            ball_ball(a.position, radius(&a.shape), b.position, radius(&b.shape))
        }
        (Shape::Point | Shape::Circle { .. }, _) if is_rect(kind_b) => ball_box(
            a.position,
            radius(&a.shape),
            b.position,
            b.frame(),
            b.shape.half_extents(),
        ),
        (_, Shape::Point | Shape::Circle { .. }) if is_rect(kind_a) => ball_box(
            b.position,
            radius(&b.shape),
            a.position,
            a.frame(),
            a.shape.half_extents(),
        )
        .map(Contact::flipped),
        _ if is_rect(kind_a) && is_rect(kind_b) => {
            let (rot_a, rot_b) = (a.frame(), b.frame());
            let (half_a, half_b) = (a.shape.half_extents(), b.shape.half_extents());
            match model {
                BoxContactModel::SeparatingAxis => {
                    box_box(a.position, rot_a, half_a, b.position, rot_b, half_b)
                }
                BoxContactModel::Parry => {
                    box_box_parry(a.position, rot_a, half_a, b.position, rot_b, half_b)
                }
            }
        }
        _ => None,
    }
}

fn radius(shape: &Shape) -> f32 {
    match *shape {
        Shape::Circle { radius } => radius,
        _ => 0.,
    }
}

/// Circles (or zero-radius points) overlap when their centers are closer than
/// the sum of the radii. The contact point sits halfway through the overlap.
pub fn ball_ball(pos_a: Vec2, radius_a: f32, pos_b: Vec2, radius_b: f32) -> Option<Contact> {
    let ab = pos_b - pos_a;
    let combined_radius = radius_a + radius_b;
    let ab_sqr_len = ab.length_squared();
    if ab_sqr_len >= combined_radius * combined_radius {
        return None;
    }
    let ab_length = ab_sqr_len.sqrt();
    if ab_length < DEGENERATE_DISTANCE {
        trace!("coincident circle centers at {:?}, skipping contact", pos_a);
        return None;
    }
    let normal = ab / ab_length;
    let penetration = combined_radius - ab_length;
    Some(Contact {
        penetration,
        normal,
        point: pos_a + normal * (radius_a - penetration * 0.5),
    })
}

/// Circle against an oriented box, tested in the box's local frame.
pub fn ball_box(
    pos_a: Vec2,
    radius_a: f32,
    pos_b: Vec2,
    rot_b: Rot,
    half_b: Vec2,
) -> Option<Contact> {
    let local = rot_b.unrotate(pos_a - pos_b);
    let clamped = local.max(-half_b).min(half_b);
    let r = radius_a;

    // n points from the box out towards the circle, in box space
    let (n, penetration, surface) = if local == clamped {
        // Center inside the box: push out through the nearest face
        let to_face = half_b - local.abs();
        let s = local.signum();
        if to_face.x < to_face.y {
            (Vec2::X * s.x, to_face.x + r, Vec2::new(half_b.x * s.x, local.y))
        } else {
            (Vec2::Y * s.y, to_face.y + r, Vec2::new(local.x, half_b.y * s.y))
        }
    } else {
        let diff = local - clamped;
        let dist_sqr = diff.length_squared();
        if dist_sqr >= r * r {
            return None;
        }
        let dist = dist_sqr.sqrt();
        (diff / dist, r - dist, clamped)
    };

    Some(Contact {
        penetration,
        normal: -rot_b.rotate(n),
        point: pos_b + rot_b.rotate(surface),
    })
}

fn corners(pos: Vec2, rot: Rot, half: Vec2) -> [Vec2; 4] {
    [
        pos + rot.rotate(Vec2::new(half.x, half.y)),
        pos + rot.rotate(Vec2::new(-half.x, half.y)),
        pos + rot.rotate(Vec2::new(-half.x, -half.y)),
        pos + rot.rotate(Vec2::new(half.x, -half.y)),
    ]
}

/// Separating-axis test over both boxes' local axes. The axis of least
/// overlap gives the normal and penetration.
///
/// The single contact point is the incident box's deepest vertex (or the
/// mean of an incident edge) clamped to the reference face. Without a full
/// two-point clipped manifold this point misplaces the impulse when boxes
/// meet edge to edge at an angle; that is a known limitation of this model.
pub fn box_box(
    pos_a: Vec2,
    rot_a: Rot,
    half_a: Vec2,
    pos_b: Vec2,
    rot_b: Rot,
    half_b: Vec2,
) -> Option<Contact> {
    let axes_a = rot_a.axes();
    let axes_b = rot_b.axes();
    let ab = pos_b - pos_a;

    let mut min_penetration = f32::MAX;
    let mut normal = Vec2::ZERO;
    let mut reference_axis = 0;

    for (k, axis) in axes_a.iter().chain(axes_b.iter()).enumerate() {
        let extent_a = half_a.x * axis.dot(axes_a[0]).abs() + half_a.y * axis.dot(axes_a[1]).abs();
        let extent_b = half_b.x * axis.dot(axes_b[0]).abs() + half_b.y * axis.dot(axes_b[1]).abs();
        let distance = ab.dot(*axis);
        let penetration = extent_a + extent_b - distance.abs();
        if penetration <= 0. {
            return None;
        }
        if penetration < min_penetration {
            min_penetration = penetration;
            normal = if distance < 0. { -*axis } else { *axis };
            reference_axis = k;
        }
    }

    // The reference face belongs to the box that owns the chosen axis; the
    // other box's vertices are the ones pushing into it.
    let (incident, face_center, tangent, face_half, depth_sign) = if reference_axis < 2 {
        let t = 1 - reference_axis;
        (corners(pos_b, rot_b, half_b), pos_a, axes_a[t], half_a[t], -1.)
    } else {
        let t = 1 - (reference_axis - 2);
        (corners(pos_a, rot_a, half_a), pos_b, axes_b[t], half_b[t], 1.)
    };

    let depth = |v: &Vec2| depth_sign * v.dot(normal);
    let deepest = incident.iter().map(depth).fold(f32::MIN, f32::max);
    let (sum, count) = incident
        .iter()
        .filter(|v| deepest - depth(*v) <= VERTEX_TOLERANCE)
        .map(|v| {
            let s = (*v - face_center).dot(tangent);
            *v + tangent * (s.max(-face_half).min(face_half) - s)
        })
        .fold((Vec2::ZERO, 0.), |(sum, count), p| (sum + p, count + 1.));

    Some(Contact {
        penetration: min_penetration,
        normal,
        point: sum / count,
    })
}

fn make_isometry(rotation: Rot, translation: Vec2) -> Isometry<f32> {
    Isometry::new(translation.into(), rotation.as_radians())
}

/// Box–box contact from parry2d's closest-feature query.
pub fn box_box_parry(
    pos_a: Vec2,
    rot_a: Rot,
    half_a: Vec2,
    pos_b: Vec2,
    rot_b: Rot,
    half_b: Vec2,
) -> Option<Contact> {
    let pos1 = make_isometry(rot_a, pos_a);
    let pos2 = make_isometry(rot_b, pos_b);
    let cuboid1 = Cuboid::new(Vector2::new(half_a.x, half_a.y));
    let cuboid2 = Cuboid::new(Vector2::new(half_b.x, half_b.y));
    match parry2d::query::contact(&pos1, &cuboid1, &pos2, &cuboid2, 0.0) {
        Ok(Some(c)) if c.dist < 0. => {
            let point1: Vec2 = c.point1.coords.into();
            let point2: Vec2 = c.point2.coords.into();
            Some(Contact {
                penetration: -c.dist,
                normal: (*c.normal1).into(),
                point: (point1 + point2) * 0.5,
            })
        }
        Ok(_) => None,
        Err(err) => {
            warn!("parry contact query failed: {:?}", err);
            None
        }
    }
}
