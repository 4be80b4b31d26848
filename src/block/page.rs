use crate::{aggregation::AggregationError, block::Block};

/// A batch of rows laid out as one block per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    blocks: Vec<Block>,
    position_count: usize,
}

impl Page {
    /// All blocks must hold the same number of positions.
    pub fn new(blocks: Vec<Block>) -> Result<Self, AggregationError> {
        let position_count = blocks.first().map(Block::position_count).unwrap_or(0);
        if let Some((channel, block)) = blocks.iter().enumerate()
            .find(|(_, b)| b.position_count() != position_count)
        {
            return Err(AggregationError::Execution(format!(
                "channel {} has {} positions, expected {}", channel, block.position_count(), position_count
            )));
        }
        Ok(Self { blocks, position_count })
    }

    pub fn position_count(&self) -> usize { self.position_count }

    pub fn channel_count(&self) -> usize { self.blocks.len() }

    pub fn block(&self, channel: usize) -> Result<&Block, AggregationError> {
        self.blocks.get(channel).ok_or_else(|| AggregationError::Execution(
            format!("channel {} out of range for page of {} channels", channel, self.blocks.len())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_ragged_blocks() {
        let err = Page::new(vec![
            Block::new(vec![json!(1), json!(2)]),
            Block::new(vec![json!(1)]),
        ]).unwrap_err();
        assert_eq!(err, AggregationError::Execution("channel 1 has 1 positions, expected 2".into()));
    }

    #[test]
    fn channel_lookup() {
        let page = Page::new(vec![Block::new(vec![json!(1)])]).unwrap();
        assert_eq!(page.position_count(), 1);
        assert!(page.block(0).is_ok());
        assert!(page.block(1).is_err());
    }
}
