use serde::de::DeserializeOwned;
use serde_json::Value;
use std::num::NonZeroUsize;
use tracing::debug;

use super::{decode_records, Collection, DirectoryError, QueryService, ReadRequest, TransportError};

/// Reads a whole collection by walking `$skip`/`$top` pages until a short page.
#[derive(Debug, Clone, Copy)]
pub struct PaginatedReader {
    page_size: NonZeroUsize,
}

impl PaginatedReader {
    pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(size) => size,
        None => unreachable!(),
    };

    pub fn new(page_size: NonZeroUsize) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size.get()
    }

    /// All records in backend order. Any failed page discards everything read so far.
    pub async fn read_all<S>(
        &self,
        service: &S,
        collection: Collection,
        request: &ReadRequest,
    ) -> Result<Vec<Value>, TransportError>
    where
        S: QueryService + ?Sized,
    {
        let top = self.page_size.get();
        let mut skip = 0;
        let mut records = Vec::new();

        loop {
            debug!(%collection, skip, top, "reading page");
            let page = service.read(collection, request.page(skip, top)).await?;
            let received = page.len();
            records.extend(page.results);

            if received < top {
                break;
            }
            skip += top;
        }

        debug!(%collection, total = records.len(), "collection read complete");
        Ok(records)
    }

    pub async fn read_all_as<S, T>(
        &self,
        service: &S,
        collection: Collection,
        request: &ReadRequest,
    ) -> Result<Vec<T>, DirectoryError>
    where
        S: QueryService + ?Sized,
        T: DeserializeOwned,
    {
        let records = self.read_all(service, collection, request).await?;
        Ok(decode_records(records, collection)?)
    }
}

impl Default for PaginatedReader {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{
        BatchResponse, Filter, Page, QueuedRead, UpsertOutcome, UpsertRequest,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct NumberedCollection {
        total: usize,
        fail_at_skip: Option<usize>,
        requests: Mutex<Vec<ReadRequest>>,
    }

    impl NumberedCollection {
        fn new(total: usize) -> Self {
            Self {
                total,
                fail_at_skip: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ReadRequest> {
            self.requests.lock().expect("request log").clone()
        }
    }

    #[async_trait]
    impl QueryService for NumberedCollection {
        async fn read(
            &self,
            _collection: Collection,
            request: ReadRequest,
        ) -> Result<Page, TransportError> {
            self.requests.lock().expect("request log").push(request.clone());
            let skip = request.skip.unwrap_or(0);
            if self.fail_at_skip == Some(skip) {
                return Err(TransportError::Unavailable("connection reset".to_string()));
            }
            let top = request.top.unwrap_or(self.total);
            let end = (skip + top).min(self.total);
            let results = (skip.min(end)..end).map(|n| json!({ "n": n })).collect();
            Ok(Page::new(results))
        }

        async fn count(&self, _: Collection, _: Filter) -> Result<u64, TransportError> {
            Ok(self.total as u64)
        }

        async fn submit_batch(
            &self,
            _: &str,
            _: Vec<QueuedRead>,
        ) -> Result<BatchResponse, TransportError> {
            Ok(BatchResponse::default())
        }

        async fn upsert(&self, _: UpsertRequest) -> Result<UpsertOutcome, TransportError> {
            Ok(UpsertOutcome::ok("noop"))
        }
    }

    fn reader(size: usize) -> PaginatedReader {
        PaginatedReader::new(NonZeroUsize::new(size).expect("non-zero"))
    }

    #[tokio::test]
    async fn reads_until_short_page_in_backend_order() {
        let service = NumberedCollection::new(2500);
        let request = ReadRequest::filtered(Filter::eq("effectiveStatus", "A"));

        let records = reader(1000)
            .read_all(&service, Collection::Position, &request)
            .await
            .expect("read succeeds");

        assert_eq!(records.len(), 2500);
        assert!(records
            .iter()
            .enumerate()
            .all(|(index, record)| record["n"] == index));

        let pages: Vec<(Option<usize>, Option<usize>)> = service
            .requests()
            .iter()
            .map(|request| (request.skip, request.top))
            .collect();
        assert_eq!(
            pages,
            vec![
                (Some(0), Some(1000)),
                (Some(1000), Some(1000)),
                (Some(2000), Some(1000)),
            ]
        );
        assert!(service
            .requests()
            .iter()
            .all(|sent| sent.filter == request.filter));
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let service = NumberedCollection::new(2000);

        let records = reader(1000)
            .read_all(&service, Collection::Position, &ReadRequest::default())
            .await
            .expect("read succeeds");

        assert_eq!(records.len(), 2000);
        assert_eq!(service.requests().len(), 3);
    }

    #[tokio::test]
    async fn failed_page_discards_partial_results() {
        let mut service = NumberedCollection::new(2500);
        service.fail_at_skip = Some(1000);

        let err = reader(1000)
            .read_all(&service, Collection::Position, &ReadRequest::default())
            .await
            .expect_err("second page fails");

        assert!(matches!(err, TransportError::Unavailable(_)));
        assert_eq!(service.requests().len(), 2);
    }
}
