mod controller;
mod cursor;
mod limiter;
mod progress;
mod retry;

pub use controller::{BulkRunController, RunSettings, RunSummary};
pub use progress::{Phase, RunState, RunStatus};
