use super::Collection;

/// Network or backend failure while talking to the directory service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("directory service unavailable: {0}")]
    Unavailable(String),
    #[error("directory service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// The directory answered, but not in a shape the pipeline can trust.
#[derive(Debug, thiserror::Error)]
pub enum DataIntegrityError {
    #[error("batch '{group}' returned {received} responses for {submitted} requests")]
    BatchSizeMismatch {
        group: String,
        submitted: usize,
        received: usize,
    },
    #[error("malformed {collection} record: {source}")]
    MalformedRecord {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed entity key '{0}'")]
    MalformedEntityKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),
}
