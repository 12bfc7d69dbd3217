//! Entity queries, statistics and metadata export

pub mod export;
pub mod filter;
pub mod stats;

pub use export::{export_metadata, ExportDocument, EntityMetadata, EXPORT_FORMAT_VERSION};
pub use filter::{execute, NameMatch, QueryFilter, SortField, SortKey, TagMatch, TimeRange};
pub use stats::{compute_stats, Stats};
