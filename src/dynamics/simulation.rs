//! One collision step: broad phase, scheduler, narrow phase and events.

use std::sync::Arc;
use std::time::Instant;

use crate::collision::broadphase::BroadPhase;
use crate::collision::narrowphase::{NarrowPhase, NarrowPhaseOutput};
use crate::config::{StepConfig, DEFAULT_BROADPHASE_CELL_SIZE, STEP_BUDGET_MS};
use crate::dynamics::events::SimulationEvents;
use crate::dynamics::scheduler::{DispatchPair, Scheduler, SolverSchedulerInfo};
use crate::utils::job::JobHandle;
use crate::utils::logging::{warn_if_step_budget_exceeded, ScopedTimer};
use crate::utils::profiling::StepProfiler;
use crate::world::PhysicsWorld;

/// Everything a step hands to the external solver and to gameplay code.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub narrow_phase: NarrowPhaseOutput,
    pub events: SimulationEvents,
}

/// Completion token of [`Simulation::schedule_step`].
pub type StepHandle = JobHandle<StepOutput>;

pub struct Simulation {
    config: StepConfig,
    broad_phase: BroadPhase,
    profiler: StepProfiler,
    output: StepOutput,
    step_started: Option<Instant>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(StepConfig::default())
    }
}

impl Simulation {
    pub fn new(config: StepConfig) -> Self {
        Self {
            config,
            broad_phase: BroadPhase::new(DEFAULT_BROADPHASE_CELL_SIZE),
            profiler: StepProfiler::default(),
            output: StepOutput::default(),
            step_started: None,
        }
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: StepConfig) {
        self.config = config;
    }

    pub fn profiler(&self) -> &StepProfiler {
        &self.profiler
    }

    /// Output of the last completed step.
    pub fn output(&self) -> &StepOutput {
        &self.output
    }

    pub fn events(&self) -> &SimulationEvents {
        &self.output.events
    }

    /// Runs a full step on the calling thread (the narrow phase still fans
    /// out over rayon when `config.parallel` is set).
    pub fn step(&mut self, world: &PhysicsWorld) -> &StepOutput {
        self.step_started = Some(Instant::now());
        let (pairs, info) = self.build_dispatch_pairs(world);

        let narrow_phase = {
            let _timer = ScopedTimer::recording("narrow phase", &mut self.profiler.narrow_phase_time);
            NarrowPhase::process_body_pairs(world, &pairs, &info, self.config.time_step, self.config.parallel)
        };
        drop(pairs);

        let events = {
            let _timer = ScopedTimer::recording("events", &mut self.profiler.events_time);
            SimulationEvents::from_manifolds(narrow_phase.contacts.iter())
        };

        self.finish(StepOutput {
            narrow_phase,
            events,
        })
    }

    /// Runs the broad phase and scheduler now, then spawns the narrow phase
    /// and event collection. Pass the handle to [`Simulation::complete_step`].
    pub fn schedule_step(&mut self, world: Arc<PhysicsWorld>) -> StepHandle {
        self.step_started = Some(Instant::now());
        let (pairs, info) = self.build_dispatch_pairs(&world);
        let time_step = self.config.time_step;
        let parallel = self.config.parallel;

        JobHandle::spawn("simulation step", move || {
            let narrow_phase = NarrowPhase::process_body_pairs(&world, &pairs, &info, time_step, parallel);
            drop(pairs);
            let events = SimulationEvents::from_manifolds(narrow_phase.contacts.iter());
            StepOutput {
                narrow_phase,
                events,
            }
        })
    }

    /// Waits for a scheduled step and makes its output current.
    pub fn complete_step(&mut self, handle: StepHandle) -> &StepOutput {
        let output = {
            let _timer = ScopedTimer::recording("narrow phase", &mut self.profiler.narrow_phase_time);
            handle.complete()
        };
        self.finish(output)
    }

    fn build_dispatch_pairs(&mut self, world: &PhysicsWorld) -> (Vec<DispatchPair>, SolverSchedulerInfo) {
        self.profiler.reset();
        self.profiler.body_count = world.num_bodies();

        let contact_pairs = {
            let _timer = ScopedTimer::recording("broad phase", &mut self.profiler.broad_phase_time);
            self.broad_phase.find_pairs(
                &world.bodies,
                &world.motion_velocities,
                world.num_dynamic_bodies(),
                self.config.time_step,
                self.config.collision_tolerance,
            )
        };

        let (pairs, info) = {
            let _timer = ScopedTimer::recording("scheduler", &mut self.profiler.scheduler_time);
            Scheduler::build(
                &contact_pairs,
                &world.joints,
                world.num_dynamic_bodies(),
                self.config.thread_count_hint,
            )
        };
        self.profiler.dispatch_pair_count = pairs.len();
        self.profiler.work_item_count = info.num_work_items();
        (pairs, info)
    }

    fn finish(&mut self, output: StepOutput) -> &StepOutput {
        self.profiler.manifold_count = output.narrow_phase.contacts.len();
        self.profiler.jacobian_count = output.narrow_phase.jacobians.len();
        if let Some(started) = self.step_started.take() {
            self.profiler.total_step_time = started.elapsed();
            warn_if_step_budget_exceeded(self.profiler.total_step_time, STEP_BUDGET_MS);
        }
        self.profiler.report();
        self.output = output;
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::Collider;
    use crate::core::filter::CollisionFilter;
    use crate::core::geometry::BoxGeometry;
    use crate::core::rigidbody::{MotionVelocity, RigidBody};
    use crate::core::types::{Material, MaterialFlags, Transform};
    use glam::Vec3;

    fn stack(height: usize) -> PhysicsWorld {
        let material = Material::default().with_flags(MaterialFlags::ENABLE_COLLISION_EVENTS);
        let cube = Collider::create_box(BoxGeometry::default(), CollisionFilter::DEFAULT, material)
            .unwrap()
            .into_shared();
        let mut world = PhysicsWorld::new();
        world.add_static_body(RigidBody::new(Transform::IDENTITY, cube.clone()));
        for level in 1..=height {
            let position = Vec3::new(0.0, level as f32 * 0.98, 0.0);
            world.add_dynamic_body(RigidBody::new(Transform::from_position(position), cube.clone()), MotionVelocity::ZERO);
        }
        world
    }

    #[test]
    fn stack_produces_one_manifold_per_neighbour() {
        let world = stack(3);
        let mut simulation = Simulation::default();
        let output = simulation.step(&world);
        assert_eq!(output.narrow_phase.contacts.len(), 3);
        assert_eq!(output.events.collision_events().len(), 3);
        assert_eq!(simulation.profiler().dispatch_pair_count, 3);
    }

    #[test]
    fn scheduled_step_matches_synchronous_step() {
        let world = Arc::new(stack(4));
        let mut simulation = Simulation::default();
        let expected: Vec<_> = simulation.step(&world).narrow_phase.contacts.iter().cloned().collect();

        let handle = simulation.schedule_step(Arc::clone(&world));
        let scheduled: Vec<_> = simulation.complete_step(handle).narrow_phase.contacts.iter().cloned().collect();
        assert_eq!(expected, scheduled);
    }
}
