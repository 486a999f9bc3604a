use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use super::filter::lookup;
use super::{
    BatchResponse, Collection, DirectorySnapshot, EntityKey, Filter, ItemFailure, Page, QueryService,
    QueuedRead, ReadRequest, SortKey, TransportError, UpsertOutcome, UpsertRequest,
};
use crate::domain::{BusinessUnit, EffectiveStatus, EmploymentRecord, Position, PositionCode};

/// Directory held in process, backed by a [`DirectorySnapshot`].
///
/// Positions keep every effective-dated version; plain reads see the latest
/// version of each code, reads with a `fromDate` see the full history from that
/// date on.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    positions: BTreeMap<PositionCode, Vec<Position>>,
    employment_records: Vec<EmploymentRecord>,
    business_units: Vec<BusinessUnit>,
    rejected_upserts: HashMap<PositionCode, String>,
    upserts: Vec<UpsertRequest>,
}

impl InMemoryDirectory {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        let mut positions: BTreeMap<PositionCode, Vec<Position>> = BTreeMap::new();
        for position in snapshot.positions {
            positions
                .entry(position.code.clone())
                .or_default()
                .push(position);
        }
        for versions in positions.values_mut() {
            versions.sort_by_key(|version| version.effective_start_date);
        }

        Self {
            state: RwLock::new(DirectoryState {
                positions,
                employment_records: snapshot.employment_records,
                business_units: snapshot.business_units,
                rejected_upserts: HashMap::new(),
                upserts: Vec::new(),
            }),
        }
    }

    /// Every upsert for `code` answers with `ERROR` and the given message.
    pub fn reject_upserts_for(mut self, code: PositionCode, message: impl Into<String>) -> Self {
        self.state
            .get_mut()
            .rejected_upserts
            .insert(code, message.into());
        self
    }

    pub async fn current_position(&self, code: &PositionCode) -> Option<Position> {
        let state = self.state.read().await;
        state
            .positions
            .get(code)
            .and_then(|versions| versions.last().cloned())
    }

    pub async fn position_history(&self, code: &PositionCode) -> Vec<Position> {
        let state = self.state.read().await;
        state.positions.get(code).cloned().unwrap_or_default()
    }

    /// Upserts received so far, accepted or not, in arrival order.
    pub async fn upserts(&self) -> Vec<UpsertRequest> {
        self.state.read().await.upserts.clone()
    }
}

impl DirectoryState {
    fn records(
        &self,
        collection: Collection,
        from_date: Option<NaiveDate>,
    ) -> Result<Vec<Value>, serde_json::Error> {
        match collection {
            Collection::Position => match from_date {
                None => encode(self.positions.values().filter_map(|versions| versions.last())),
                Some(from) => encode(
                    self.positions
                        .values()
                        .flatten()
                        .filter(|version| version.effective_start_date >= from),
                ),
            },
            Collection::EmploymentRecords => encode(
                self.employment_records
                    .iter()
                    .filter(|record| from_date.map_or(true, |from| record.start_date >= from)),
            ),
            Collection::BusinessUnits => encode(self.business_units.iter()),
        }
    }

    fn select(&self, collection: Collection, request: &ReadRequest) -> Result<Page, String> {
        let mut records = self
            .records(collection, request.from_date)
            .map_err(|err| format!("unable to encode {collection} records: {err}"))?;

        if let Some(filter) = &request.filter {
            records.retain(|record| filter.matches(record));
        }
        if !request.order_by.is_empty() {
            records.sort_by(|left, right| compare_records(left, right, &request.order_by));
        }

        let results = records
            .into_iter()
            .skip(request.skip.unwrap_or(0))
            .take(request.top.unwrap_or(usize::MAX))
            .collect();
        Ok(Page::new(results))
    }

    /// Applies the wire body of an upsert; the target version comes from the
    /// `__metadata.uri` envelope, as on the remote endpoint.
    fn apply_upsert(&mut self, request: &UpsertRequest) -> UpsertOutcome {
        let body = request.body();
        let entity = match body
            .pointer("/__metadata/uri")
            .and_then(Value::as_str)
            .map(str::parse::<EntityKey>)
        {
            Some(Ok(entity)) => entity,
            Some(Err(error)) => return UpsertOutcome::error(error.to_string()),
            None => return UpsertOutcome::error("Upsert body carries no entity uri"),
        };
        let code = &entity.code;
        let effective = entity.effective_start_date;

        if let Some(message) = self.rejected_upserts.get(code) {
            return UpsertOutcome::error(message.clone());
        }
        let Some(current) = self
            .positions
            .get(code)
            .and_then(|versions| versions.last())
            .cloned()
        else {
            return UpsertOutcome::error(format!("Position {code} does not exist"));
        };

        let mut next = current.clone();
        next.effective_start_date = effective;

        if let Some(raw) = body.get("effectiveStatus") {
            let Some(status) = raw.as_str().and_then(EffectiveStatus::from_code) else {
                return UpsertOutcome::error(format!("Invalid effectiveStatus {raw}"));
            };
            if status == EffectiveStatus::Inactive && !current.is_active() {
                return UpsertOutcome::error(format!("Position {code} is already inactive"));
            }
            next.effective_status = status;
        }

        if let Some(parent) = body.get("parentPosition") {
            let target = parent
                .get("results")
                .and_then(Value::as_array)
                .and_then(|results| results.first())
                .and_then(|entry| entry.get("code"))
                .and_then(Value::as_str)
                .map(PositionCode::from);
            if let Some(target) = &target {
                if !self.positions.contains_key(target) {
                    return UpsertOutcome::error(format!(
                        "Parent position {target} does not exist"
                    ));
                }
            }
            next.parent_position = target;
        }

        let versions = self.positions.entry(code.clone()).or_default();
        match versions
            .iter_mut()
            .find(|version| version.effective_start_date == effective)
        {
            Some(version) => *version = next,
            None => {
                versions.push(next);
                versions.sort_by_key(|version| version.effective_start_date);
            }
        }

        UpsertOutcome::ok(format!("Position {code} saved effective {effective}"))
    }
}

fn encode<'a, T, I>(items: I) -> Result<Vec<Value>, serde_json::Error>
where
    T: Serialize + 'a,
    I: Iterator<Item = &'a T>,
{
    items.map(serde_json::to_value).collect()
}

fn compare_records(left: &Value, right: &Value, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| {
            let ordering = compare_values(lookup(left, &key.field), lookup(right, &key.field));
            if key.descending {
                ordering.reverse()
            } else {
                ordering
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl QueryService for InMemoryDirectory {
    async fn read(
        &self,
        collection: Collection,
        request: ReadRequest,
    ) -> Result<Page, TransportError> {
        let state = self.state.read().await;
        debug!(%collection, query = ?request.query_pairs(), "answering read");
        state
            .select(collection, &request)
            .map_err(|message| TransportError::Rejected {
                status: 500,
                message,
            })
    }

    async fn count(&self, collection: Collection, filter: Filter) -> Result<u64, TransportError> {
        let state = self.state.read().await;
        let page = state
            .select(collection, &ReadRequest::filtered(filter))
            .map_err(|message| TransportError::Rejected {
                status: 500,
                message,
            })?;
        Ok(page.len() as u64)
    }

    async fn submit_batch(
        &self,
        group_id: &str,
        reads: Vec<QueuedRead>,
    ) -> Result<BatchResponse, TransportError> {
        let state = self.state.read().await;
        debug!(group = group_id, size = reads.len(), "answering batch");
        let responses = reads
            .iter()
            .map(|read| {
                state
                    .select(read.collection, &read.request)
                    .map_err(|message| ItemFailure {
                        status: 500,
                        message,
                    })
            })
            .collect();
        Ok(BatchResponse { responses })
    }

    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertOutcome, TransportError> {
        let mut state = self.state.write().await;
        let outcome = state.apply_upsert(&request);
        debug!(entity = %request.entity, status = ?outcome.status, "upsert applied");
        state.upserts.push(request);
        Ok(outcome)
    }
}
