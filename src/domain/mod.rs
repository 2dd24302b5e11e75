//! Domain layer: entities and value objects mirrored from the Endee API.

pub mod errors;
pub mod models;

pub use errors::DomainError;
pub use models::{
    BackupInfo, DocumentItem, FilterCondition, FilterUpdate, IndexConfig, IndexInfo, JsonMap,
    OperationResult, Precision, SearchQuery, SearchResult, SpaceType, VectorItem,
};
