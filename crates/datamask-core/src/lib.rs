//! Core contracts and helpers for datamask.
//!
//! This crate defines the resolved entity/property descriptors, the record
//! representation, the inclusion/exclusion pattern matcher, and the
//! deterministic ordering rules shared by the engine and the CLI.

pub mod descriptor;
pub mod error;
pub mod loose;
pub mod ordering;
pub mod pattern;
pub mod record;

pub use descriptor::{
    Discriminator, EntityDescriptor, PropertyDescriptor, StorageType, TruncateDirective,
};
pub use error::{Error, Result};
pub use ordering::{TruncateTarget, Weighted, order_properties, order_truncates, weighted_order};
pub use pattern::{PatternConfig, PatternMatcher, PatternSet, RuleSpec, matches};
pub use record::Record;

/// Current contract version for descriptor registry files.
pub const CONFIG_VERSION: &str = "0.1";
