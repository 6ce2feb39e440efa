// sparklet-core/src/engine/mod.rs

pub mod scheduler;
pub mod session;
pub mod timers;

pub use scheduler::{PendingSchedule, Scheduler};
pub use session::{DispatchOutcome, SparkletSession};
pub use timers::{TimerBackend, TimerId, VirtualTimers};
