//! Quarry Core - Shared Types
//!
//! Identifiers, filter criteria, operation results, errors and configuration.
//! Every other quarry crate depends on this one; it performs no I/O beyond
//! reading configuration.

pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod results;

pub use config::{ApiKey, QuarryConfig, TtlPolicy};
pub use error::{
    ConfigError, QuarryError, QuarryResult, TimeoutError, TransportError, ValidationError,
};
pub use filter::{FieldMap, FilterCriteria, QueryExpression};
pub use identity::{AssociationId, ItemId, ProjectId, TrackerId};
pub use results::{
    AssociationOutcome, BulkUpdateOutcome, HierarchyNode, HierarchyTree, ItemBatch, ItemContext,
    MutationAck, MutationKind, OperationResult, ProjectBundle, ProjectList, QueryResult,
    TrackerBundle, WikiRendering,
};
