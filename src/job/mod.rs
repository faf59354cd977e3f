mod poller;
mod status;

pub use poller::{JobPoller, poll_until_final};
pub use status::JobStatus;
