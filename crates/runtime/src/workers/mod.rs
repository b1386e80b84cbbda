//! Worker tasks that back the runtime orchestration.
//!
//! The simulation worker owns the tick loop and every mutation that may run
//! an ability callback; metrics are shared with handles and the event bridge.

mod metrics;
mod simulation;

pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use simulation::{Command, SimulationWorker};
