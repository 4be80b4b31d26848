pub mod aggregation;
pub use aggregation::{
    AggregationDefinition, AggregationDefinitionBuilder, AggregationError, AggregationRegistry,
    Confidence, GroupAccumulator,
};

pub mod block;
pub use block::{Block, BlockBuilder, Page};

pub mod types;
pub use types::{SqlType, TypeManager, TypeRegistry};

pub mod config;
pub use config::RegistryConfig;
