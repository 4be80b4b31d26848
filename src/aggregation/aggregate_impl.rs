use crate::{
    aggregation::{AggregationDefinition, AggregationError},
    types::TypeManager,
};

/// Source of one built-in aggregation.
/// Implementations are stateless; the definition they build is what gets shared.
pub trait AggregateImpl: Send + Sync {
    /// Canonical lowercase function name ("count", "sum", ...).
    fn name(&self) -> &'static str;

    /// Declare and validate the aggregation against the given type catalog.
    fn definition(&self, types: &dyn TypeManager) -> Result<AggregationDefinition, AggregationError>;
}
