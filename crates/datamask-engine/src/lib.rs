//! Matching and execution engine for datamask.
//!
//! Resolved entity descriptors are matched record by record, substitute
//! values come from a registry of generators (or a whole-record override
//! executor), and updates are written back through a `RecordSource` in
//! batches. The `Orchestrator` runs pre-flight and then every source,
//! collecting per-entity statistics along the way.

pub mod convert;
pub mod engine;
pub mod errors;
pub mod generators;
pub mod metadata;
pub mod model;
pub mod orchestrator;
pub mod overrides;
pub mod params;
pub mod preflight;
pub mod source;

pub use engine::AnonymizationEngine;
pub use errors::{EngineError, GenerationError, Result, StorageError};
pub use generators::{Generator, GeneratorContext, GeneratorRegistry};
pub use metadata::{DescriptorRegistry, MetadataProvider};
pub use model::{
    EngineOptions, EntityFailure, ExecutionResult, ResolutionWarning, RunOutcome, RunStatus,
};
pub use orchestrator::{Orchestrator, SourceHandle};
pub use overrides::{OverrideExecutor, OverrideRegistry};
pub use params::{ParamKind, ParamMap, ParamSpec};
pub use preflight::preflight;
pub use source::{ColumnValues, MemoryRecordSource, RecordSource, RowUpdate, TruncatedView};
