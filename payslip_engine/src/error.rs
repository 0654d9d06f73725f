//! Error types for the Payslip Engine.
//!
//! Structure edits and payroll run transitions report failures through
//! the enums below.  A failed structure edit never leaves a partially
//! applied change behind, so callers that ignore the error simply see
//! a no-op.

use thiserror::Error;

use crate::payroll::RunStatus;

/// Rejected edits to a [`PayslipStructure`](crate::models::PayslipStructure).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("no earning component at index {0}")]
    EarningIndexOutOfRange(usize),
    #[error("no deduction component at index {0}")]
    DeductionIndexOutOfRange(usize),
    /// Professional Tax and Provident Fund lines are computed by the
    /// engine and cannot be removed or reconfigured.
    #[error("`{0}` is system managed and cannot be changed")]
    SystemManaged(String),
    #[error("`{0}` is reserved for a system-managed deduction")]
    ReservedName(String),
}

/// Failures while computing or moving a payroll run between states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("cannot {action} a payroll run that is {from:?}")]
    InvalidTransition { from: RunStatus, action: &'static str },
    #[error("employee {0} is paid per day but no days worked were supplied")]
    MissingDaysWorked(String),
    #[error("payroll run {0} not found")]
    RunNotFound(String),
}
