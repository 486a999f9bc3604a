//! Vacancy classification pipeline: position discovery, batched employment
//! history checks and business-unit incumbent counts.

mod business_units;
mod classifier;
mod scan;

pub use business_units::{
    business_unit_filter, incumbent_count_filter, BusinessUnitAggregator, UnitCount,
    DEFAULT_EXCLUDED_UNITS,
};
pub use classifier::{
    employment_history_request, employment_history_start, is_vacant, Classification,
    UnresolvedPosition, VacancyClassifier,
};
pub use scan::{positions_filter, VacancyScanner, VacancySummary};

use crate::directory::{DataIntegrityError, DirectoryError, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum VacancyError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("data integrity violation: {0}")]
    DataIntegrity(#[from] DataIntegrityError),
}

impl From<DirectoryError> for VacancyError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Transport(err) => Self::Transport(err),
            DirectoryError::DataIntegrity(err) => Self::DataIntegrity(err),
        }
    }
}
