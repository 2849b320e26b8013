use thiserror::Error;

/// Failure retrieving one page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {url} (HTTP 429)")]
    RateLimited { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
}

/// Why a data row was dropped. Non-data rows (ads, separators) are not errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RowError {
    #[error("row {rank} has no profile link")]
    MissingProfileLink { rank: u32 },

    #[error("row {rank} has an unusable profile link {href:?}")]
    InvalidProfileLink { rank: u32, href: String },

    #[error("row {rank} has an empty name")]
    EmptyName { rank: u32 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {reason}")]
    Connection { reason: String },

    #[error("collection {collection} is corrupt: {source}")]
    Corrupt {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record did not serialize to a JSON object")]
    NotADocument,

    #[error("could not serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on collection {collection}: {source}")]
    Io {
        collection: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection { .. })
    }
}
