use thiserror::Error;
use crate::storage::models::GovernorId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Governor with ID {0} does not exist")]
    UnknownAccount(GovernorId),

    #[error("Governor with ID {0} already exists")]
    DuplicateId(GovernorId),

    #[error("Farm governor {farm} is already linked to main governor {main}")]
    FarmAlreadyLinked { farm: GovernorId, main: GovernorId },

    #[error("Governor {0} is already a main account and cannot be used as a farm account. Unlink its farm accounts first")]
    CannotFarmAMain(GovernorId),

    #[error("Governor {0} is already a farm account and cannot be used as a main account")]
    CannotMainAFarm(GovernorId),

    #[error("Governor {0} cannot be linked to itself")]
    SelfLink(GovernorId),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("{0}")]
    Validation(String),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl TrackerError {
    /// Link invariant violations are reported back to the caller, not logged as failures.
    pub fn is_link_violation(&self) -> bool {
        matches!(
            self,
            TrackerError::FarmAlreadyLinked { .. }
                | TrackerError::CannotFarmAMain(_)
                | TrackerError::CannotMainAFarm(_)
                | TrackerError::SelfLink(_)
        )
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::StorageUnavailable(err.to_string())
    }
}

impl From<csv::Error> for TrackerError {
    fn from(err: csv::Error) -> Self {
        TrackerError::Validation(format!("Could not read CSV: {}", err))
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub type TrackerResult<T> = Result<T, TrackerError>;
