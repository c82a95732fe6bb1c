//! Deterministic processing orders.
//!
//! Properties and truncate targets share one rule: items with an explicit
//! weight/order come first, ascending, ties broken by name; items without one
//! follow, sorted by name.

use std::cmp::Ordering;

use crate::descriptor::{Discriminator, EntityDescriptor, PropertyDescriptor};

/// Item that can be placed by weight then name.
pub trait Weighted {
    fn weight(&self) -> Option<i64>;
    fn sort_name(&self) -> &str;
}

impl Weighted for PropertyDescriptor {
    fn weight(&self) -> Option<i64> {
        self.weight
    }

    fn sort_name(&self) -> &str {
        &self.field
    }
}

/// Table scheduled for clearing before anonymization.
#[derive(Debug, Clone, PartialEq)]
pub struct TruncateTarget {
    pub entity: String,
    pub table: String,
    pub order: Option<i64>,
    /// Restricts clearing to one subtype's rows in a shared table.
    pub discriminator: Option<Discriminator>,
}

impl TruncateTarget {
    /// Target for an entity with an enabled truncate directive.
    pub fn from_entity(entity: &EntityDescriptor) -> Option<Self> {
        let directive = entity.active_truncate()?;
        Some(Self {
            entity: entity.id.clone(),
            table: entity.table.clone(),
            order: directive.order,
            discriminator: entity.discriminator.clone(),
        })
    }
}

impl Weighted for TruncateTarget {
    fn weight(&self) -> Option<i64> {
        self.order
    }

    fn sort_name(&self) -> &str {
        &self.table
    }
}

fn compare<T: Weighted>(left: &T, right: &T) -> Ordering {
    match (left.weight(), right.weight()) {
        (Some(a), Some(b)) => a
            .cmp(&b)
            .then_with(|| left.sort_name().cmp(right.sort_name())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.sort_name().cmp(right.sort_name()),
    }
}

/// Sort weighted items first (by weight, then name), then unweighted by name.
///
/// The sort is stable, so items equal in both weight and name keep their
/// input order.
pub fn weighted_order<T: Weighted>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by(compare);
    items
}

/// Processing order for an entity's properties.
pub fn order_properties(properties: Vec<PropertyDescriptor>) -> Vec<PropertyDescriptor> {
    weighted_order(properties)
}

/// Clearing order for truncate targets.
pub fn order_truncates(targets: Vec<TruncateTarget>) -> Vec<TruncateTarget> {
    weighted_order(targets)
}
