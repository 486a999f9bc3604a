use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::VacancyError;
use crate::directory::{Collection, Filter, PaginatedReader, QueryService, ReadRequest};
use crate::domain::{BusinessUnit, EffectiveStatus, OccupancyStatus};

/// Administrative placeholder codes that are not real business units.
pub const DEFAULT_EXCLUDED_UNITS: [&str; 4] = ["NOT", "LTSCTDM", "LTFS", "LTCG"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitCount {
    pub unit_code: String,
    pub unit_label: String,
    /// `None` when counting this unit failed; see `failure`.
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Active business units minus the exclusion set.
pub fn business_unit_filter(excluded: &BTreeSet<String>) -> Filter {
    let exclusions = excluded
        .iter()
        .map(|code| Filter::ne("externalCode", code.as_str()));
    Filter::and(
        std::iter::once(Filter::eq("status", EffectiveStatus::Active.code())).chain(exclusions),
    )
}

pub fn incumbent_count_filter(unit_code: &str) -> Filter {
    Filter::and([
        Filter::eq("businessUnit", unit_code),
        Filter::eq("emplStatus", OccupancyStatus::ActiveIncumbent.code()),
    ])
}

/// Per business unit, the number of employment records held by an active incumbent.
pub struct BusinessUnitAggregator<S: ?Sized> {
    service: Arc<S>,
    reader: PaginatedReader,
    excluded: BTreeSet<String>,
}

impl<S> BusinessUnitAggregator<S>
where
    S: QueryService + ?Sized,
{
    pub fn new(service: Arc<S>, reader: PaginatedReader) -> Self {
        Self::with_exclusions(service, reader, DEFAULT_EXCLUDED_UNITS)
    }

    pub fn with_exclusions<I, C>(service: Arc<S>, reader: PaginatedReader, excluded: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            service,
            reader,
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    /// Reading the unit list is all-or-nothing; a failed count only degrades its own unit.
    pub async fn aggregate_counts(&self) -> Result<Vec<UnitCount>, VacancyError> {
        let request = ReadRequest::filtered(business_unit_filter(&self.excluded));
        let units: Vec<BusinessUnit> = self
            .reader
            .read_all_as(self.service.as_ref(), Collection::BusinessUnits, &request)
            .await?;

        let units: Vec<BusinessUnit> = units
            .into_iter()
            .filter(|unit| !self.excluded.contains(&unit.code))
            .collect();

        let counts = join_all(units.iter().map(|unit| {
            self.service
                .count(Collection::EmploymentRecords, incumbent_count_filter(&unit.code))
        }))
        .await;

        let tallies: Vec<UnitCount> = units
            .into_iter()
            .zip(counts)
            .map(|(unit, count)| match count {
                Ok(count) => UnitCount {
                    unit_code: unit.code,
                    unit_label: unit.description,
                    count: Some(count),
                    failure: None,
                },
                Err(error) => {
                    warn!(unit = %unit.code, %error, "unable to count unit");
                    UnitCount {
                        unit_code: unit.code,
                        unit_label: unit.description,
                        count: None,
                        failure: Some(error.to_string()),
                    }
                }
            })
            .collect();

        info!(
            units = tallies.len(),
            failed = tallies.iter().filter(|tally| tally.count.is_none()).count(),
            "business unit counts complete"
        );
        Ok(tallies)
    }
}
