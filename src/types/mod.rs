pub mod type_signature;
pub use type_signature::*;

pub mod sql_type;
pub use sql_type::*;

pub mod type_registry;
pub use type_registry::*;

use crate::aggregation::AggregationError;

/// Resolves declared type names to semantic type descriptors.
pub trait TypeManager {
    /// Return the type for a parsed signature if the catalog knows it.
    fn get_type(&self, signature: &TypeSignature) -> Option<SqlType>;

    /// Parse `name` and look it up, failing with `UnknownType` when either step fails.
    fn resolve(&self, name: &str) -> Result<SqlType, AggregationError> {
        let signature = TypeSignature::parse(name)?;
        self.get_type(&signature)
            .ok_or_else(|| AggregationError::UnknownType(name.to_string()))
    }
}
