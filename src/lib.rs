//! Bounded retries and job polling for the Ansible Automation Platform API.
//!
//! The [`retry`] module holds the engine: a timeout calculator, a retry state
//! machine for HTTP operations and a generic driving loop. [`job`] builds the
//! job completion poller on top of it, and [`actions`] wires both to the
//! [`client`] for the operations the command line exposes.

pub mod actions;
pub mod client;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod job;
pub mod retry;

pub use context::Context;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{ClientError, RetryError};
