use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::VacancyError;
use crate::directory::{
    BatchGrouper, Collection, Filter, QueryService, QueuedRead, ReadRequest, SortKey,
};
use crate::domain::{EmploymentRecord, Position, PositionCode};

/// Start of the employment history window requested per position.
pub fn employment_history_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Employment history read for one position, newest first.
pub fn employment_history_request(position: &Position) -> QueuedRead {
    QueuedRead {
        collection: Collection::EmploymentRecords,
        request: ReadRequest::filtered(Filter::eq("position", position.code.as_str()))
            .from_date(employment_history_start())
            .order_by(SortKey::descending("startDate")),
    }
}

/// A position is vacant when it has no employment record, or when its most
/// recent one carries a status other than active incumbent or on leave.
pub fn is_vacant(history: &[EmploymentRecord]) -> bool {
    let latest = history.iter().reduce(|latest, record| {
        if record.start_date > latest.start_date {
            record
        } else {
            latest
        }
    });

    match latest {
        Some(record) => !record.employee_status.occupies_position(),
        None => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedPosition {
    pub code: PositionCode,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    pub vacant: Vec<Position>,
    pub occupied: usize,
    pub unresolved: Vec<UnresolvedPosition>,
}

/// Decides which positions are vacant from their employment history.
///
/// Every call re-reads the directory; vacancy changes over time and nothing is cached.
pub struct VacancyClassifier<S: ?Sized> {
    service: Arc<S>,
    grouper: BatchGrouper,
}

impl<S> VacancyClassifier<S>
where
    S: QueryService + ?Sized,
{
    pub fn new(service: Arc<S>, grouper: BatchGrouper) -> Self {
        Self { service, grouper }
    }

    pub async fn classify(&self, positions: Vec<Position>) -> Result<Vec<Position>, VacancyError> {
        Ok(self.classify_detailed(positions).await?.vacant)
    }

    /// Like [`classify`](Self::classify), also reporting positions whose history
    /// could not be read (item failures, skipped chunks, malformed records).
    pub async fn classify_detailed(
        &self,
        positions: Vec<Position>,
    ) -> Result<Classification, VacancyError> {
        let total = positions.len();
        let grouped = self
            .grouper
            .run_grouped(self.service.as_ref(), positions, employment_history_request)
            .await?;

        let mut classification = Classification::default();

        for response in grouped.responses {
            let position = response.item;
            let history = response
                .response
                .map_err(|failure| failure.to_string())
                .and_then(|page| {
                    page.decode::<EmploymentRecord>(Collection::EmploymentRecords)
                        .map_err(|err| err.to_string())
                });

            match history {
                Ok(history) if is_vacant(&history) => {
                    debug!(position = %position.code, records = history.len(), "position is vacant");
                    classification.vacant.push(position);
                }
                Ok(_) => classification.occupied += 1,
                Err(reason) => {
                    warn!(position = %position.code, %reason, "employment history unavailable");
                    classification.unresolved.push(UnresolvedPosition {
                        code: position.code,
                        reason,
                    });
                }
            }
        }

        for chunk in grouped.skipped {
            let reason = format!("batch chunk {} failed: {}", chunk.index, chunk.error);
            classification
                .unresolved
                .extend(chunk.items.into_iter().map(|position| UnresolvedPosition {
                    code: position.code,
                    reason: reason.clone(),
                }));
        }

        info!(
            positions = total,
            vacant = classification.vacant.len(),
            occupied = classification.occupied,
            unresolved = classification.unresolved.len(),
            "vacancy classification complete"
        );
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EmployeeStatus;

    fn record(status: &str, start: (i32, u32, u32)) -> EmploymentRecord {
        EmploymentRecord {
            position: PositionCode::from("50000010"),
            employee_status: EmployeeStatus::new(status),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).expect("valid"),
            business_unit: None,
            user_id: None,
        }
    }

    #[test]
    fn no_history_means_vacant() {
        assert!(is_vacant(&[]));
    }

    #[test]
    fn most_recent_record_decides() {
        let terminated_last = [
            record("6022", (2024, 3, 1)),
            record("6021", (2019, 1, 1)),
        ];
        assert!(is_vacant(&terminated_last));

        let rehired = [
            record("6021", (2024, 3, 1)),
            record("6022", (2022, 1, 1)),
        ];
        assert!(!is_vacant(&rehired));

        let on_leave = [record("6025", (2023, 1, 1))];
        assert!(!is_vacant(&on_leave));
    }

    #[test]
    fn unordered_history_still_uses_latest_start_date() {
        let history = [
            record("6021", (2018, 1, 1)),
            record("6022", (2024, 6, 1)),
            record("6021", (2020, 1, 1)),
        ];
        assert!(is_vacant(&history));
    }

    #[test]
    fn history_request_targets_full_window_newest_first() {
        let position: Position = serde_json::from_value(serde_json::json!({
            "code": "50000010",
            "effectiveStartDate": "2024-01-01",
            "effectiveStatus": "A"
        }))
        .expect("position decodes");

        let read = employment_history_request(&position);
        assert_eq!(read.collection, Collection::EmploymentRecords);
        assert_eq!(
            read.request.query_pairs(),
            vec![
                ("$filter", "position eq '50000010'".to_string()),
                ("$orderby", "startDate desc".to_string()),
                ("fromDate", "1900-01-01".to_string()),
            ]
        );
    }
}
