use log::{log_enabled, warn, Level};
use std::time::{Duration, Instant};

/// Scoped timer that traces a labelled section and optionally accumulates
/// the elapsed time into a profiler slot.
pub struct ScopedTimer<'a> {
    label: &'static str,
    start: Instant,
    sink: Option<&'a mut Duration>,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'static str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
            sink: None,
        }
    }

    /// Like [`ScopedTimer::new`] but adds the elapsed time to `sink` on drop.
    pub fn recording(label: &'static str, sink: &'a mut Duration) -> Self {
        let mut timer = Self::new(label);
        timer.sink = Some(sink);
        timer
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        if let Some(sink) = self.sink.as_deref_mut() {
            *sink += elapsed;
        }
        if log_enabled!(Level::Trace) {
            log::trace!("end {} ({} µs)", self.label, elapsed.as_micros());
        }
    }
}

/// Logs a warning when a simulation step took longer than its budget.
pub fn warn_if_step_budget_exceeded(duration: Duration, budget_ms: f32) -> bool {
    let elapsed_ms = duration.as_secs_f32() * 1000.0;
    if elapsed_ms > budget_ms {
        warn!("Step exceeded budget: {elapsed_ms:.2} ms > {budget_ms:.2} ms");
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_timer_accumulates() {
        let mut slot = Duration::ZERO;
        {
            let _timer = ScopedTimer::recording("test", &mut slot);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(slot >= Duration::from_millis(1));
    }

    #[test]
    fn budget_check() {
        assert!(!warn_if_step_budget_exceeded(Duration::from_millis(1), 16.0));
        assert!(warn_if_step_budget_exceeded(Duration::from_millis(20), 16.0));
    }
}
