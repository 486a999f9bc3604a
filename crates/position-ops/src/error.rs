use crate::config::ConfigError;
use crate::directory::SnapshotError;
use crate::telemetry::TelemetryError;
use crate::workflows::deactivation::DeactivationError;
use crate::workflows::vacancy::VacancyError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Snapshot(SnapshotError),
    Vacancy(VacancyError),
    Deactivation(DeactivationError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Deactivation(DeactivationError::Validation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Vacancy(VacancyError::Transport(_))
            | AppError::Deactivation(DeactivationError::Transport(_)) => StatusCode::BAD_GATEWAY,
            AppError::Vacancy(VacancyError::DataIntegrity(_))
            | AppError::Deactivation(DeactivationError::DataIntegrity(_))
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Snapshot(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Snapshot(err) => write!(f, "snapshot error: {}", err),
            AppError::Vacancy(err) => write!(f, "vacancy pipeline error: {}", err),
            AppError::Deactivation(err) => write!(f, "deactivation error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Snapshot(err) => Some(err),
            AppError::Vacancy(err) => Some(err),
            AppError::Deactivation(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<SnapshotError> for AppError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

impl From<VacancyError> for AppError {
    fn from(value: VacancyError) -> Self {
        Self::Vacancy(value)
    }
}

impl From<DeactivationError> for AppError {
    fn from(value: DeactivationError) -> Self {
        Self::Deactivation(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DataIntegrityError, TransportError};
    use crate::workflows::deactivation::ValidationError;

    #[test]
    fn statuses_follow_error_class() {
        let validation = AppError::from(DeactivationError::from(
            ValidationError::NoPositionSelected,
        ));
        let transport = AppError::from(VacancyError::from(TransportError::Unavailable(
            "timeout".to_string(),
        )));
        let integrity = AppError::from(VacancyError::from(
            DataIntegrityError::MalformedEntityKey("Position()".to_string()),
        ));

        assert_eq!(validation.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(transport.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(integrity.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            validation.to_string(),
            "deactivation error: Please select the position code"
        );
    }
}
