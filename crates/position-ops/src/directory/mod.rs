//! Read/write seam over the HR directory service.
//!
//! Workflows only talk to the directory through [`QueryService`]; the concrete
//! transport (OData over HTTP, an in-process snapshot, a test fake) is chosen by
//! the caller.

mod batch;
mod entity;
mod error;
mod filter;
pub mod memory;
mod paging;
mod snapshot;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub use batch::{BatchGrouper, ChunkFailurePolicy, GroupedOutcome, GroupedResponse, SkippedChunk};
pub use entity::{json_date, EntityKey};
pub use error::{DataIntegrityError, DirectoryError, TransportError};
pub use filter::Filter;
pub use memory::InMemoryDirectory;
pub use paging::PaginatedReader;
pub use snapshot::{DirectorySnapshot, SnapshotError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Position,
    EmploymentRecords,
    BusinessUnits,
}

impl Collection {
    pub const fn path(self) -> &'static str {
        match self {
            Self::Position => "/Position",
            Self::EmploymentRecords => "/EmpJob",
            Self::BusinessUnits => "/FOBusinessUnit",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.descending { "desc" } else { "asc" };
        write!(f, "{} {direction}", self.field)
    }
}

/// One page request against a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRequest {
    pub filter: Option<Filter>,
    pub order_by: Vec<SortKey>,
    pub expand: Vec<String>,
    pub skip: Option<usize>,
    pub top: Option<usize>,
    pub from_date: Option<NaiveDate>,
}

impl ReadRequest {
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    pub fn order_by(mut self, key: SortKey) -> Self {
        self.order_by.push(key);
        self
    }

    pub fn expand(mut self, navigation: impl Into<String>) -> Self {
        self.expand.push(navigation.into());
        self
    }

    pub fn from_date(mut self, date: NaiveDate) -> Self {
        self.from_date = Some(date);
        self
    }

    pub fn page(&self, skip: usize, top: usize) -> Self {
        Self {
            skip: Some(skip),
            top: Some(top),
            ..self.clone()
        }
    }

    /// Query parameters as a remote transport would send them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("$filter", filter.to_string()));
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self.order_by.iter().map(SortKey::to_string).collect();
            pairs.push(("$orderby", keys.join(",")));
        }
        if !self.expand.is_empty() {
            pairs.push(("$expand", self.expand.join(",")));
        }
        if let Some(skip) = self.skip {
            pairs.push(("$skip", skip.to_string()));
        }
        if let Some(top) = self.top {
            pairs.push(("$top", top.to_string()));
        }
        if let Some(from_date) = self.from_date {
            pairs.push(("fromDate", from_date.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

/// Raw records of one page; decode into domain types with [`Page::decode`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub results: Vec<Value>,
}

impl Page {
    pub fn new(results: Vec<Value>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn decode<T: DeserializeOwned>(
        self,
        collection: Collection,
    ) -> Result<Vec<T>, DataIntegrityError> {
        decode_records(self.results, collection)
    }
}

pub(crate) fn decode_records<T: DeserializeOwned>(
    records: Vec<Value>,
    collection: Collection,
) -> Result<Vec<T>, DataIntegrityError> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value(record)
                .map_err(|source| DataIntegrityError::MalformedRecord { collection, source })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRead {
    pub collection: Collection,
    pub request: ReadRequest,
}

/// Failure reported for a single request inside an otherwise successful batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({status})")]
pub struct ItemFailure {
    pub status: u16,
    pub message: String,
}

/// Combined answer to a batch; `responses[i]` answers the i-th queued read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResponse {
    pub responses: Vec<Result<Page, ItemFailure>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub status: UpsertStatus,
    pub message: String,
}

impl UpsertOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: UpsertStatus::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: UpsertStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == UpsertStatus::Ok
    }
}

/// Effective-dated patch against one position version.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRequest {
    pub entity: EntityKey,
    pub patch: Value,
}

impl UpsertRequest {
    pub fn new(entity: EntityKey, patch: Value) -> Self {
        Self { entity, patch }
    }

    /// Request body with the `__metadata` envelope the upsert endpoint expects.
    pub fn body(&self) -> Value {
        let mut body = match &self.patch {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        body.insert(
            "__metadata".to_string(),
            serde_json::json!({
                "uri": self.entity.to_string(),
                "type": "SFOData.Position",
            }),
        );
        Value::Object(body)
    }
}

/// Generic query/read service exposed by the directory.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn read(&self, collection: Collection, request: ReadRequest)
        -> Result<Page, TransportError>;

    async fn count(&self, collection: Collection, filter: Filter) -> Result<u64, TransportError>;

    /// Submits the reads as one atomic batch. Implementations must answer in submission order.
    async fn submit_batch(
        &self,
        group_id: &str,
        reads: Vec<QueuedRead>,
    ) -> Result<BatchResponse, TransportError>;

    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertOutcome, TransportError>;
}

#[async_trait]
impl<S> QueryService for Arc<S>
where
    S: QueryService + ?Sized,
{
    async fn read(
        &self,
        collection: Collection,
        request: ReadRequest,
    ) -> Result<Page, TransportError> {
        (**self).read(collection, request).await
    }

    async fn count(&self, collection: Collection, filter: Filter) -> Result<u64, TransportError> {
        (**self).count(collection, filter).await
    }

    async fn submit_batch(
        &self,
        group_id: &str,
        reads: Vec<QueuedRead>,
    ) -> Result<BatchResponse, TransportError> {
        (**self).submit_batch(group_id, reads).await
    }

    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertOutcome, TransportError> {
        (**self).upsert(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PositionCode;
    use serde_json::json;

    #[test]
    fn query_pairs_follow_odata_conventions() {
        let request = ReadRequest::filtered(Filter::eq("position", "50000010"))
            .order_by(SortKey::descending("startDate"))
            .from_date(NaiveDate::from_ymd_opt(1900, 1, 1).expect("valid"))
            .page(2000, 1000);

        assert_eq!(
            request.query_pairs(),
            vec![
                ("$filter", "position eq '50000010'".to_string()),
                ("$orderby", "startDate desc".to_string()),
                ("$skip", "2000".to_string()),
                ("$top", "1000".to_string()),
                ("fromDate", "1900-01-01".to_string()),
            ]
        );
    }

    #[test]
    fn upsert_body_wraps_patch_with_metadata() {
        let entity = EntityKey::position(
            PositionCode::from("61000230"),
            NaiveDate::from_ymd_opt(2025, 6, 20).expect("valid"),
        );
        let request = UpsertRequest::new(entity, json!({ "effectiveStatus": "I" }));

        let body = request.body();
        assert_eq!(body["effectiveStatus"], "I");
        assert_eq!(
            body["__metadata"]["uri"],
            "Position(code='61000230',effectiveStartDate=datetime'2025-06-20T00:00:00')"
        );
        assert_eq!(body["__metadata"]["type"], "SFOData.Position");
    }

    #[test]
    fn decode_reports_malformed_records() {
        let page = Page::new(vec![json!({ "code": 7 })]);
        let err = page
            .decode::<crate::domain::Position>(Collection::Position)
            .expect_err("shape mismatch");
        assert!(matches!(
            err,
            DataIntegrityError::MalformedRecord {
                collection: Collection::Position,
                ..
            }
        ));
    }
}
