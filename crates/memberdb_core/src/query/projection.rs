//! Projection contracts.
//!
//! A projection type picks exactly one policy by the trait it implements:
//! closed projections are built eagerly from the selected columns, open
//! projections wrap the loaded entity.

use crate::model::entity::Entity;
use crate::query::MappingError;
use rusqlite::types::Value;

/// Owned projection constructed positionally from entity columns.
pub trait ClosedProjection: Sized {
    /// Source entity properties, in constructor order.
    const PROPERTIES: &'static [&'static str];

    /// Receives exactly one value per entry of `PROPERTIES`.
    fn from_values(values: Vec<Value>) -> Result<Self, MappingError>;
}

/// Read-through view over a fully loaded entity.
pub trait OpenProjection: Sized {
    type Source: Entity;

    fn from_entity(source: Self::Source) -> Self;
}
