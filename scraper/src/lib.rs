pub mod collector;
pub mod error;
pub mod fetch;
mod html;
pub mod listing;
pub mod numbers;
pub mod pipeline;
pub mod profile;
pub mod store;

#[cfg(test)]
pub mod tests;

// Re-export key types and functions for easier access
pub use crate::collector::{collect, CollectionRun, CollectorConfig};
pub use crate::error::{FetchError, RowError, StoreError};
pub use crate::fetch::{Fetcher, HttpFetcher, Sleeper, ThreadSleeper};
pub use crate::listing::{extract_row, parse_listing, Region, RowContext, StreamerRecord};
pub use crate::numbers::{parse_count, parse_number, StatValue};
pub use crate::pipeline::{ListingReport, Pipeline, ProfileReport, Settings};
pub use crate::profile::{collect_profiles, extract_profile, ProfileRecord, ProfileTarget};
pub use crate::store::{
    persist, DocumentStore, JsonDirStore, MemoryStore, PersistMode, PersistSummary,
};
