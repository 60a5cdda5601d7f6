//! Utility helpers: math extensions, logging timers, profiling and SIMD loops.

pub mod job;
pub mod logging;
pub mod math;
pub mod profiling;
pub mod simd;
pub mod stream;

pub use job::JobHandle;
pub use math::*;
pub use stream::{StreamWriter, WorkItemStream};
