//! Card Kernel — Errors
//!
//! Only data-integrity faults are errors here. Findings such as invalid
//! flags or missing siblings are reported, never raised.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    /// The project number is not one of `PROJECT_IDS`.
    #[error("Invalid project number {0}")]
    InvalidProject(i32),
}
