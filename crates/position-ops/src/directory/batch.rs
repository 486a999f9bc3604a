use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tracing::{debug, warn};

use super::{
    DataIntegrityError, DirectoryError, ItemFailure, Page, QueryService, QueuedRead,
    TransportError,
};

/// What to do when a whole chunk fails at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkFailurePolicy {
    /// Abort the run with the transport error.
    #[default]
    FailFast,
    /// Record the chunk as skipped and continue with the next one.
    SkipChunk,
}

impl ChunkFailurePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "abort" => Some(Self::FailFast),
            "skip-chunk" | "skip_chunk" | "continue" => Some(Self::SkipChunk),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct GroupedResponse<T> {
    pub item: T,
    pub response: Result<Page, ItemFailure>,
}

#[derive(Debug)]
pub struct SkippedChunk<T> {
    pub index: usize,
    pub items: Vec<T>,
    pub error: TransportError,
}

#[derive(Debug)]
pub struct GroupedOutcome<T> {
    pub responses: Vec<GroupedResponse<T>>,
    pub skipped: Vec<SkippedChunk<T>>,
}

/// Splits work into bounded chunks and submits each chunk as one batch.
///
/// Chunks go out strictly one after another: chunk `n + 1` is built only after
/// chunk `n`'s combined response has been received.
#[derive(Debug, Clone)]
pub struct BatchGrouper {
    chunk_size: NonZeroUsize,
    policy: ChunkFailurePolicy,
    group_id: String,
}

impl BatchGrouper {
    pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(180) {
        Some(size) => size,
        None => unreachable!(),
    };

    pub fn new(chunk_size: NonZeroUsize, policy: ChunkFailurePolicy) -> Self {
        Self {
            chunk_size,
            policy,
            group_id: "positionBatch".to_string(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.get()
    }

    pub fn policy(&self) -> ChunkFailurePolicy {
        self.policy
    }

    pub async fn run_grouped<S, T, F>(
        &self,
        service: &S,
        items: Vec<T>,
        make_request: F,
    ) -> Result<GroupedOutcome<T>, DirectoryError>
    where
        S: QueryService + ?Sized,
        F: Fn(&T) -> QueuedRead,
    {
        let mut outcome = GroupedOutcome {
            responses: Vec::with_capacity(items.len()),
            skipped: Vec::new(),
        };
        let mut remaining = items.into_iter().peekable();
        let mut index = 0;

        while remaining.peek().is_some() {
            let chunk: Vec<T> = remaining.by_ref().take(self.chunk_size.get()).collect();
            let reads: Vec<QueuedRead> = chunk.iter().map(&make_request).collect();
            let submitted = reads.len();

            debug!(group = %self.group_id, chunk = index, size = submitted, "submitting batch");
            let batch = match service.submit_batch(&self.group_id, reads).await {
                Ok(batch) => batch,
                Err(error) => match self.policy {
                    ChunkFailurePolicy::FailFast => {
                        warn!(group = %self.group_id, chunk = index, %error, "batch failed; aborting run");
                        return Err(error.into());
                    }
                    ChunkFailurePolicy::SkipChunk => {
                        warn!(group = %self.group_id, chunk = index, %error, "batch failed; skipping chunk");
                        outcome.skipped.push(SkippedChunk {
                            index,
                            items: chunk,
                            error,
                        });
                        index += 1;
                        continue;
                    }
                },
            };

            let received = batch.responses.len();
            if received != submitted {
                return Err(DataIntegrityError::BatchSizeMismatch {
                    group: self.group_id.clone(),
                    submitted,
                    received,
                }
                .into());
            }

            outcome.responses.extend(
                chunk
                    .into_iter()
                    .zip(batch.responses)
                    .map(|(item, response)| GroupedResponse { item, response }),
            );
            index += 1;
        }

        Ok(outcome)
    }
}

impl Default for BatchGrouper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHUNK_SIZE, ChunkFailurePolicy::default())
    }
}
