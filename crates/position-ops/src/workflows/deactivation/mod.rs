//! Position deactivation with reportee reassignment and compensation.

pub mod payload;
mod prompt;
mod saga;

pub use prompt::{ConfirmationPrompt, Prompt, PromptAction, PromptKind};
pub use saga::{
    DeactivationSaga, ItemResult, LogAction, LogEntry, SagaOutcome, SagaPhase, SagaReport,
    SagaState,
};

use crate::directory::{DataIntegrityError, DirectoryError, TransportError};
use crate::domain::PositionCode;

/// Preconditions checked before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select the position code")]
    NoPositionSelected,
    #[error("Please select only one position code ({0} selected)")]
    MultiplePositionsSelected(usize),
    #[error("Manager of position {0} should not be empty")]
    ManagerUnresolved(PositionCode),
}

#[derive(Debug, thiserror::Error)]
pub enum DeactivationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("data integrity violation: {0}")]
    DataIntegrity(#[from] DataIntegrityError),
}

impl From<DirectoryError> for DeactivationError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Transport(err) => Self::Transport(err),
            DirectoryError::DataIntegrity(err) => Self::DataIntegrity(err),
        }
    }
}
