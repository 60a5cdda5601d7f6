use std::time::Duration;

/// Timing and counters gathered over a single simulation step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfiler {
    pub broad_phase_time: Duration,
    pub scheduler_time: Duration,
    pub narrow_phase_time: Duration,
    pub events_time: Duration,
    pub total_step_time: Duration,

    pub body_count: usize,
    pub dispatch_pair_count: usize,
    pub work_item_count: usize,
    pub manifold_count: usize,
    pub jacobian_count: usize,
}

impl StepProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn share(&self, part: Duration) -> f32 {
        let total_us = self.total_step_time.as_micros() as f32;
        if total_us < 1.0 {
            0.0
        } else {
            part.as_micros() as f32 / total_us * 100.0
        }
    }

    /// Emits the profile at `debug` level.
    pub fn report(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        log::debug!(
            "step: {} bodies, {} pairs in {} work items, {} manifolds, {} jacobians",
            self.body_count,
            self.dispatch_pair_count,
            self.work_item_count,
            self.manifold_count,
            self.jacobian_count
        );
        log::debug!(
            "step: total {:.3} ms | broad {:.1}% | schedule {:.1}% | narrow {:.1}% | events {:.1}%",
            self.total_step_time.as_secs_f32() * 1000.0,
            self.share(self.broad_phase_time),
            self.share(self.scheduler_time),
            self.share(self.narrow_phase_time),
            self.share(self.events_time)
        );
    }
}
