use thiserror::Error;
use uuid::Uuid;

pub type TierResult<T> = Result<T, TierError>;

#[derive(Debug, Error)]
pub enum TierError {
    #[error("failed to fetch {what}: {message}")]
    Fetch { what: &'static str, message: String },

    #[error("failed to write {what}: {message}")]
    Write { what: &'static str, message: String },

    #[error("cohort {0} has no active members")]
    EmptyCohort(Uuid),

    #[error("no member of cohort {0} could be evaluated")]
    NoEvaluatedMembers(Uuid),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TierError {
    pub fn fetch(what: &'static str, err: impl std::fmt::Display) -> Self {
        TierError::Fetch {
            what,
            message: err.to_string(),
        }
    }

    pub fn write(what: &'static str, err: impl std::fmt::Display) -> Self {
        TierError::Write {
            what,
            message: err.to_string(),
        }
    }
}
