use thiserror::Error;

use crate::models::Channel;

/// Failure taxonomy for an allocation run.
///
/// Configuration errors and input-shape errors are detected before any
/// partial allocation is produced and abort the whole run. A student
/// matching no department is not an error; it is recorded as unassigned.
#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("no departments found in any preference list")]
    NoDepartments,

    #[error("equal split yields zero total capacity for channel '{channel}'")]
    ZeroEqualCapacity { channel: Channel },

    #[error("manual capacities sum to zero")]
    ZeroManualCapacity,

    #[error("required column missing: {0}")]
    MissingColumn(String),

    #[error("no preference columns found (expected preference_1 .. preference_N)")]
    NoPreferenceColumns,
}

impl AllocationError {
    /// Configuration errors come from the allocation setup; the remaining
    /// variants report a defect in the normalized input shape.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AllocationError::NoDepartments
                | AllocationError::ZeroEqualCapacity { .. }
                | AllocationError::ZeroManualCapacity
        )
    }
}
