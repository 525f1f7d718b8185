pub mod contests;
pub mod curve;
pub mod lifecycle;
pub mod tally;
pub mod visibility;
pub mod voting;

pub use lifecycle::{LifecycleScheduler, SchedulerSettings, TickReport};
pub use tally::{GroupTally, Tally, TallyAggregator};
