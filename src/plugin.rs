use bevy::log::warn;
use bevy::prelude::*;

use crate::components::BodyId;
use crate::config::WorldConfig;
use crate::rotation::Rot;
use crate::world::PhysicsWorld;

/// Upper bound on fixed steps run in a single frame.
pub const MAX_STEPS_PER_FRAME: u32 = 8;

#[derive(SystemLabel, Debug, Hash, PartialEq, Eq, Clone)]
pub enum PhysicsSystem {
    Step,
    SyncTransforms,
}

/// Ties an entity to a body; its `Transform` follows the body every frame.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicsBody(pub BodyId);

#[derive(Default, Debug)]
pub struct LoopState {
    pub(crate) accumulator: f32,
    pub(crate) queued_steps: u32,
    pub paused: bool,
}

impl LoopState {
    /// Queues one step, run on the next frame even while paused.
    pub fn step(&mut self) {
        self.queued_steps += 1;
    }
    pub fn pause(&mut self) {
        self.paused = true;
    }
    pub fn resume(&mut self) {
        self.paused = false;
    }
}

pub fn pause(mut physics_loop: ResMut<LoopState>) {
    physics_loop.pause();
}

pub fn resume(mut physics_loop: ResMut<LoopState>) {
    physics_loop.resume();
}

/// Runs queued steps, then as many whole steps as the accumulated frame time
/// allows. A backlog beyond [`MAX_STEPS_PER_FRAME`] is dropped.
fn advance(state: &mut LoopState, world: &mut PhysicsWorld, delta: f32) -> u32 {
    let mut steps = 0;
    while state.queued_steps > 0 {
        world.step();
        state.queued_steps -= 1;
        steps += 1;
    }
    if state.paused {
        return steps;
    }

    state.accumulator += delta;
    let dt = world.time_step();
    let mut timed = 0;
    while state.accumulator >= dt && timed < MAX_STEPS_PER_FRAME {
        world.step();
        state.accumulator -= dt;
        timed += 1;
    }
    if state.accumulator >= dt {
        warn!(
            "physics fell {:.3}s behind, dropping the backlog",
            state.accumulator
        );
        state.accumulator = 0.;
    }
    steps + timed
}

fn run_fixed_steps(time: Res<Time>, mut state: ResMut<LoopState>, mut world: ResMut<PhysicsWorld>) {
    advance(&mut state, &mut world, time.delta_seconds());
}

/// Copies body poses onto bevy Transforms
fn sync_transforms(world: Res<PhysicsWorld>, mut query: Query<(&PhysicsBody, &mut Transform)>) {
    for (body, mut transform) in query.iter_mut() {
        if let Ok(view) = world.body(body.0) {
            transform.translation = view.position().extend(transform.translation.z);
            transform.rotation = Rot::from_radians(view.rotation()).into();
        }
    }
}

/// Drives a [`PhysicsWorld`] resource with fixed steps and mirrors body poses
/// onto entity transforms. Panics at `build` if `config` is invalid.
#[derive(Debug, Default, Clone)]
pub struct PhysicsPlugin {
    pub config: WorldConfig,
}

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        let world = match PhysicsWorld::new(self.config.clone()) {
            Ok(world) => world,
            Err(err) => panic!("invalid physics configuration: {}", err),
        };
        app.insert_resource(world)
            .init_resource::<LoopState>()
            .add_system_to_stage(CoreStage::PreUpdate, run_fixed_steps.label(PhysicsSystem::Step))
            .add_system_to_stage(
                CoreStage::PreUpdate,
                sync_transforms
                    .label(PhysicsSystem::SyncTransforms)
                    .after(PhysicsSystem::Step),
            );
    }
}
