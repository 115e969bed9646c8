//! 128-bit block value type and buffer/block conversion at API boundaries.

use std::fmt;
use std::ops::{BitXor, BitXorAssign};

use zeroize::{Zeroize, Zeroizing};

use crate::error::{SectorError, SectorResult};

/// Size of a cipher block in bytes (128-bit)
pub const BLOCK_SIZE: usize = 16;

/// A single 128-bit block.
///
/// Numeric values (tweaks, sector numbers, counters) are laid out
/// little-endian starting at byte 0 and zero-extended to the full width.
#[derive(Clone, Copy, Default, PartialEq, Eq, Zeroize)]
pub struct Block(pub [u8; BLOCK_SIZE]);

impl Block {
    pub const ZERO: Block = Block([0u8; BLOCK_SIZE]);

    pub const fn new(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Zero-extend a 64-bit value: bytes 0..8 little-endian, bytes 8..16 zero.
    pub fn from_u64(value: u64) -> Self {
        Self::from_u64_pair(value, 0)
    }

    /// Two little-endian lanes: `low` fills bytes 0..8, `high` bytes 8..16.
    pub fn from_u64_pair(low: u64, high: u64) -> Self {
        let mut bytes = [0u8; BLOCK_SIZE];
        bytes[..8].copy_from_slice(&low.to_le_bytes());
        bytes[8..].copy_from_slice(&high.to_le_bytes());
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SectorResult<Self> {
        let array: [u8; BLOCK_SIZE] =
            bytes
                .try_into()
                .map_err(|_| SectorError::InvalidBufferLength {
                    length: bytes.len(),
                    block_size: BLOCK_SIZE,
                })?;
        Ok(Self(array))
    }

    pub fn from_u128_le(value: u128) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn to_u128_le(self) -> u128 {
        u128::from_le_bytes(self.0)
    }

    pub fn from_u128_be(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn to_u128_be(self) -> u128 {
        u128::from_be_bytes(self.0)
    }
}

impl BitXor for Block {
    type Output = Block;

    fn bitxor(mut self, rhs: Block) -> Block {
        self ^= rhs;
        self
    }
}

impl BitXorAssign for Block {
    fn bitxor_assign(&mut self, rhs: Block) {
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a ^= b;
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", hex::encode(self.0))
    }
}

/// Validate a sector buffer and return its block count.
///
/// `mode` names the caller in the error; `minimum` is the smallest block
/// count the mode accepts.
pub fn block_count(length: usize, mode: &'static str, minimum: usize) -> SectorResult<usize> {
    if length % BLOCK_SIZE != 0 {
        tracing::debug!(mode, length, "rejected buffer: partial block");
        return Err(SectorError::InvalidBufferLength {
            length,
            block_size: BLOCK_SIZE,
        });
    }
    let blocks = length / BLOCK_SIZE;
    if blocks < minimum {
        tracing::debug!(mode, blocks, minimum, "rejected buffer: too few blocks");
        return Err(SectorError::InvalidBlockCount {
            mode,
            minimum,
            actual: blocks,
        });
    }
    tracing::trace!(mode, blocks, "mode entry");
    Ok(blocks)
}

/// [`block_count`] plus an equal-length check for a separate output buffer.
pub fn check_buffers(
    input: usize,
    output: usize,
    mode: &'static str,
    minimum: usize,
) -> SectorResult<usize> {
    let blocks = block_count(input, mode, minimum)?;
    if input != output {
        tracing::debug!(mode, input, output, "rejected buffer: length mismatch");
        return Err(SectorError::LengthMismatch { input, output });
    }
    Ok(blocks)
}

/// Split a validated buffer into blocks. Trailing bytes short of a block are ignored.
pub fn load_blocks(bytes: &[u8]) -> Zeroizing<Vec<Block>> {
    let mut blocks = Vec::with_capacity(bytes.len() / BLOCK_SIZE);
    for chunk in bytes.chunks_exact(BLOCK_SIZE) {
        let mut block = Block::ZERO;
        block.0.copy_from_slice(chunk);
        blocks.push(block);
    }
    Zeroizing::new(blocks)
}

pub fn store_blocks(blocks: &[Block], out: &mut [u8]) {
    for (chunk, block) in out.chunks_exact_mut(BLOCK_SIZE).zip(blocks) {
        chunk.copy_from_slice(&block.0);
    }
}
