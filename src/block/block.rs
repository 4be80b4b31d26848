use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregation::AggregationError;

/// An immutable column of nullable values, one per row position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    values: Vec<Value>,
}

impl Block {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn position_count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw access; `None` when the position is out of range.
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    pub fn is_null(&self, position: usize) -> Result<bool, AggregationError> {
        Ok(self.value_at(position)?.is_null())
    }

    pub fn get_long(&self, position: usize) -> Result<i64, AggregationError> {
        self.value_at(position)?.as_i64()
            .ok_or_else(|| self.wrong_kind(position, "bigint"))
    }

    pub fn get_int(&self, position: usize) -> Result<i32, AggregationError> {
        self.value_at(position)?.as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| self.wrong_kind(position, "integer"))
    }

    pub fn get_double(&self, position: usize) -> Result<f64, AggregationError> {
        self.value_at(position)?.as_f64()
            .ok_or_else(|| self.wrong_kind(position, "double"))
    }

    pub fn get_boolean(&self, position: usize) -> Result<bool, AggregationError> {
        self.value_at(position)?.as_bool()
            .ok_or_else(|| self.wrong_kind(position, "boolean"))
    }

    /// Byte view of a string value.
    pub fn get_slice(&self, position: usize) -> Result<&[u8], AggregationError> {
        self.value_at(position)?.as_str()
            .map(str::as_bytes)
            .ok_or_else(|| self.wrong_kind(position, "varbinary"))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn value_at(&self, position: usize) -> Result<&Value, AggregationError> {
        self.values.get(position).ok_or_else(|| AggregationError::Execution(
            format!("position {} out of range for block of {} values", position, self.values.len())
        ))
    }

    fn wrong_kind(&self, position: usize, expected: &str) -> AggregationError {
        AggregationError::Execution(format!(
            "value at position {} is not {}: {:?}", position, expected, self.values.get(position)
        ))
    }
}

impl From<Vec<Value>> for Block {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_readers() {
        let block = Block::new(vec![json!(7), json!(1.5), json!(true), json!("ab"), Value::Null]);
        assert_eq!(block.get_long(0).unwrap(), 7);
        assert_eq!(block.get_int(0).unwrap(), 7);
        assert_eq!(block.get_double(1).unwrap(), 1.5);
        assert!(block.get_boolean(2).unwrap());
        assert_eq!(block.get_slice(3).unwrap(), b"ab");
        assert!(block.is_null(4).unwrap());
        assert!(!block.is_null(0).unwrap());
    }

    #[test]
    fn wrong_kind_and_out_of_range_fail() {
        let block = Block::new(vec![json!("x"), json!(5_000_000_000i64)]);
        assert!(matches!(block.get_long(0), Err(AggregationError::Execution(_))));
        assert!(matches!(block.get_int(1), Err(AggregationError::Execution(_))));
        assert!(matches!(block.is_null(9), Err(AggregationError::Execution(_))));
    }
}
