//! Async runtime layer: the connection controller, the poll scheduler and
//! the long-running tasks that observe extraction jobs, extraction status and
//! token expiry.

pub mod controller;
pub mod error;
pub mod expiry;
pub mod handle;
pub mod jobs;
pub mod poller;
pub mod sources;
pub mod status;

pub use controller::{ConnectionController, Extraction, Outcome};
pub use error::OperationError;
pub use expiry::ExpiryMonitor;
pub use handle::MonitorHandle;
pub use jobs::{pump_events, run_job_tracker, JobsSnapshot};
pub use poller::{PollSchedule, Poller, SequenceGate};
pub use sources::{NotificationSource, PlatformConnector, StatusSource};
pub use status::run_status_board;
