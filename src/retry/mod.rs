mod backoff;
mod classify;
mod driver;
mod engine;
mod policy;

pub use backoff::{Backoff, jittered_step};
pub use classify::{
    DEFAULT_SUCCESS_STATUS_CODES, RETRYABLE_STATUS_CODES, StatusClass, classify,
    is_retryable_status,
};
pub use driver::{Attempt, RetryLoop, retry_context};
pub use engine::{Operation, OperationResult, Refresh, RetryConfig, RetryState};
pub use policy::RetryPolicy;
