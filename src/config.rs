//! Global configuration constants and the per-step configuration record.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Number of constraint solver iterations performed per step.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 4;

/// Distance below which a pair of colliders produces contact points.
pub const DEFAULT_COLLISION_TOLERANCE: f32 = 0.1;

/// Default cell size for the broad-phase uniform grid.
pub const DEFAULT_BROADPHASE_CELL_SIZE: f32 = 5.0;

/// Bodies spanning more grid cells than this are tested against everything.
pub const MAX_BROADPHASE_CELLS_PER_BODY: usize = 4096;

/// Upper bound on scheduler phases; the last phase may repeat bodies.
pub const MAX_SOLVER_PHASES: usize = 16;

/// Smallest number of dispatch pairs handed to one work item.
pub const MIN_PAIRS_PER_WORK_ITEM: usize = 4;

/// Stabilization factor used for joint jacobians.
pub const DEFAULT_JOINT_BIAS_FACTOR: f32 = 0.2;

/// Time budget used to flag slow steps.
pub const STEP_BUDGET_MS: f32 = 16.0;

/// Settings for a single simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub gravity: Vec3,
    pub solver_iterations: u32,
    pub thread_count_hint: usize,
    pub collision_tolerance: f32,
    pub time_step: f32,
    pub parallel: bool,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::from_array(DEFAULT_GRAVITY),
            solver_iterations: DEFAULT_SOLVER_ITERATIONS,
            thread_count_hint: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            collision_tolerance: DEFAULT_COLLISION_TOLERANCE,
            time_step: DEFAULT_TIME_STEP,
            parallel: cfg!(feature = "parallel"),
        }
    }
}
