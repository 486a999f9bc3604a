use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::classifier::{Classification, UnresolvedPosition, VacancyClassifier};
use super::VacancyError;
use crate::directory::{BatchGrouper, Collection, Filter, PaginatedReader, QueryService, ReadRequest};
use crate::domain::{EffectiveStatus, Position};

/// Active positions belonging to any of the given employee groups.
pub fn positions_filter<G: AsRef<str>>(employee_groups: &[G]) -> Filter {
    Filter::and([
        Filter::eq("effectiveStatus", EffectiveStatus::Active.code()),
        Filter::or(
            employee_groups
                .iter()
                .map(|group| Filter::eq("cust_EmployeeGroup", group.as_ref())),
        ),
    ])
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VacancySummary {
    pub positions_scanned: usize,
    pub vacant: Vec<Position>,
    pub occupied: usize,
    pub unresolved: Vec<UnresolvedPosition>,
}

impl VacancySummary {
    fn from_classification(positions_scanned: usize, classification: Classification) -> Self {
        Self {
            positions_scanned,
            vacant: classification.vacant,
            occupied: classification.occupied,
            unresolved: classification.unresolved,
        }
    }

    pub fn positions_title(&self) -> String {
        format!("Positions ({})", self.positions_scanned)
    }

    pub fn vacancy_title(&self) -> String {
        format!("Vacant Positions ({})", self.vacant.len())
    }
}

/// Position discovery followed by vacancy classification.
pub struct VacancyScanner<S: ?Sized> {
    service: Arc<S>,
    reader: PaginatedReader,
    classifier: VacancyClassifier<S>,
}

impl<S> VacancyScanner<S>
where
    S: QueryService + ?Sized,
{
    pub fn new(service: Arc<S>, reader: PaginatedReader, grouper: BatchGrouper) -> Self {
        let classifier = VacancyClassifier::new(Arc::clone(&service), grouper);
        Self {
            service,
            reader,
            classifier,
        }
    }

    pub async fn fetch_positions<G: AsRef<str>>(
        &self,
        employee_groups: &[G],
    ) -> Result<Vec<Position>, VacancyError> {
        if employee_groups.is_empty() {
            return Ok(Vec::new());
        }

        let request = ReadRequest::filtered(positions_filter(employee_groups));
        let positions: Vec<Position> = self
            .reader
            .read_all_as(self.service.as_ref(), Collection::Position, &request)
            .await?;

        info!(positions = positions.len(), "active positions fetched");
        Ok(positions)
    }

    pub async fn scan<G: AsRef<str>>(
        &self,
        employee_groups: &[G],
    ) -> Result<VacancySummary, VacancyError> {
        let positions = self.fetch_positions(employee_groups).await?;
        if positions.is_empty() {
            warn!("no positions to classify");
            return Ok(VacancySummary::default());
        }

        let scanned = positions.len();
        let classification = self.classifier.classify_detailed(positions).await?;
        Ok(VacancySummary::from_classification(scanned, classification))
    }
}
