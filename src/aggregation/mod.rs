pub mod aggregation_error;
pub use aggregation_error::*;

pub mod state;
pub use state::*;

pub mod function_handle;
pub use function_handle::*;

pub mod parameter_metadata;
pub use parameter_metadata::*;

pub mod signature_validator;
pub use signature_validator::*;

pub mod aggregation_definition;
pub use aggregation_definition::*;

pub mod accumulator;
pub use accumulator::*;

pub mod aggregate_impl;
pub use aggregate_impl::*;

pub mod aggregation_registry;
pub use aggregation_registry::*;

pub mod functions;
pub use functions::*;
