mod poller;
mod state;

pub use poller::{DEFAULT_POLL_INTERVAL, JobTracker, Subscription};
pub use state::{TrackerState, TrackerView, Transition};
