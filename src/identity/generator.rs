//! Sources of identifier blocks

use super::xml_id::Block;
use crate::errors::{ConversionError, ConversionResult};

/// Produces the 7-digit blocks identifiers are built from
pub trait IdGenerator {
    fn next_block(&mut self) -> ConversionResult<Block>;
}

/// Uniformly random blocks from the platform entropy source
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBlocks;

impl RandomBlocks {
    pub fn new() -> Self {
        Self
    }
}

const BLOCK_SPAN: u32 = Block::MAX - Block::MIN + 1;

impl IdGenerator for RandomBlocks {
    fn next_block(&mut self) -> ConversionResult<Block> {
        // Reject the tail of the u32 range so every block is equally likely
        let zone = u32::MAX - (u32::MAX % BLOCK_SPAN);
        loop {
            let mut bytes = [0u8; 4];
            getrandom::getrandom(&mut bytes)
                .map_err(|e| ConversionError::Random(e.to_string()))?;
            let value = u32::from_le_bytes(bytes);
            if value < zone {
                if let Some(block) = Block::new(Block::MIN + value % BLOCK_SPAN) {
                    return Ok(block);
                }
            }
        }
    }
}

/// Deterministic ascending blocks, wrapping back to the lowest block
#[derive(Debug, Clone)]
pub struct SequentialBlocks {
    next: u32,
}

impl SequentialBlocks {
    pub fn new() -> Self {
        Self { next: Block::MIN }
    }

    /// Start at `first`, clamped into the block range
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: first.clamp(Block::MIN, Block::MAX),
        }
    }
}

impl Default for SequentialBlocks {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialBlocks {
    fn next_block(&mut self) -> ConversionResult<Block> {
        let block = Block::new(self.next)
            .ok_or_else(|| ConversionError::InvalidIdentifier(self.next.to_string()))?;
        self.next = if self.next >= Block::MAX {
            Block::MIN
        } else {
            self.next + 1
        };
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_blocks_stay_in_range() {
        let mut generator = RandomBlocks::new();
        for _ in 0..200 {
            let block = generator.next_block().unwrap();
            assert!((Block::MIN..=Block::MAX).contains(&block.value()));
            assert_eq!(block.to_string().len(), 7);
        }
    }

    #[test]
    fn test_sequential_blocks_wrap() {
        let mut generator = SequentialBlocks::starting_at(Block::MAX);
        assert_eq!(generator.next_block().unwrap().value(), Block::MAX);
        assert_eq!(generator.next_block().unwrap().value(), Block::MIN);
        assert_eq!(generator.next_block().unwrap().value(), Block::MIN + 1);
    }
}
