//! A 2D rigid-body physics engine: structure-of-arrays body storage, a
//! swappable broad phase, exact circle and box contacts, and sequential
//! impulse resolution with restitution and Coulomb friction.

mod aabb;
mod broad_phase;
mod components;
mod config;
mod contact;
mod error;
mod integrator;
mod plugin;
mod resolver;
mod rotation;
mod store;
mod world;

pub use aabb::*;
pub use broad_phase::*;
pub use components::*;
pub use config::*;
pub use contact::*;
pub use error::*;
pub use integrator::*;
pub use plugin::*;
pub use resolver::*;
pub use rotation::*;
pub use store::*;
pub use world::*;
