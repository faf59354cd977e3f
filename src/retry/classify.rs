/// Status codes that mean "try again later", whatever the caller counts as
/// success: 409 (resource in use by running jobs), 408, 429 and the
/// transient 5xx family.
pub const RETRYABLE_STATUS_CODES: [u16; 7] = [409, 408, 429, 500, 502, 503, 504];

/// Success codes used when a caller does not name any.
pub const DEFAULT_SUCCESS_STATUS_CODES: [u16; 2] = [202, 204];

/// How one observed HTTP status code steers the retry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Retryable,
    Success,
    Fatal,
}

/// Classify `status` against the fixed retryable set and the caller's
/// success codes. The retryable set is checked first.
pub fn classify(status: u16, success_codes: &[u16]) -> StatusClass {
    if is_retryable_status(status) {
        StatusClass::Retryable
    } else if success_codes.contains(&status) {
        StatusClass::Success
    } else {
        StatusClass::Fatal
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}
