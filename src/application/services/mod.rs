//! Service layer orchestrating domain operations and infrastructure adapters.

mod endee_service;
mod import_service;
pub mod sparse;

pub use endee_service::{EmbeddingProvider, EndeeService, ProviderSource, VectorDatabase};
pub use import_service::{
    read_csv_records, read_json_records, BatchImporter, FieldMapping, SourceRecord, VectorSource,
    MAX_BATCH_SIZE,
};
