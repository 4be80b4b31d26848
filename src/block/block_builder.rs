use serde_json::Value;

use crate::block::Block;

/// Append-only output sink. Output functions write exactly one value per call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockBuilder {
    values: Vec<Value>,
}

impl BlockBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { values: Vec::with_capacity(capacity) }
    }

    pub fn append(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    pub fn append_null(&mut self) {
        self.values.push(Value::Null);
    }

    pub fn position_count(&self) -> usize {
        self.values.len()
    }

    /// Drop every value appended after the first `len` positions.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub fn build(self) -> Block {
        Block::new(self.values)
    }
}
