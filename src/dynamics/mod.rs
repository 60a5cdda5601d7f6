//! Solver-facing stages: pair scheduling, joint jacobians, events and the step driver.

pub mod events;
pub mod jacobian;
pub mod scheduler;
pub mod simulation;

pub use events::{BodyCollision, BodyEvents, CollisionEvent, SimulationEvents, TriggerEvent};
pub use jacobian::{JacobianRow, JointJacobian};
pub use scheduler::{DispatchPair, Scheduler, SolverPhaseInfo, SolverSchedulerInfo};
pub use simulation::{Simulation, StepHandle, StepOutput};
