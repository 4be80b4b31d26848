pub mod block;
pub use block::*;

pub mod page;
pub use page::*;

pub mod block_builder;
pub use block_builder::*;
