//! CMAC over whole blocks with 64- or 128-bit tags.
//!
//! Messages are always a whole number of blocks, so only the first subkey
//! enters the computation. The second is derived for completeness.

use sector_core::block::{block_count, load_blocks};
use sector_core::{Block, BlockCipher, SectorError, SectorResult};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

const MODE: &str = "cmac";

/// Constant for the subkey doubling step, XORed into the last byte.
const SUBKEY_REDUCTION: u128 = 0x87;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSize {
    Bits64,
    Bits128,
}

impl TagSize {
    pub fn bits(self) -> u32 {
        match self {
            TagSize::Bits64 => 64,
            TagSize::Bits128 => 128,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Keep the most significant `bits` of the tag, zero the rest.
    fn truncate(self, tag: Block) -> Block {
        let mut out = tag;
        for b in &mut out.0[self.bytes()..] {
            *b = 0;
        }
        out
    }
}

impl TryFrom<u32> for TagSize {
    type Error = SectorError;

    fn try_from(bits: u32) -> SectorResult<Self> {
        match bits {
            64 => Ok(TagSize::Bits64),
            128 => Ok(TagSize::Bits128),
            other => Err(SectorError::InvalidTagSize(other)),
        }
    }
}

/// Outcome of tag verification. A mismatch is a value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid,
}

/// Shift the block left by one bit, reading it as a big-endian integer
/// (carry moves from byte 15 toward byte 0), and reduce on overflow.
fn shift_subkey(block: Block) -> Block {
    let value = block.to_u128_be();
    let carry = value >> 127;
    Block::from_u128_be((value << 1) ^ (carry.wrapping_neg() & SUBKEY_REDUCTION))
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Subkeys {
    first: Block,
    second: Block,
}

impl Subkeys {
    pub fn derive<C: BlockCipher>(key: &C::EncryptKey) -> Self {
        let mut r = C::encrypt_block(key, Block::ZERO);
        let first = shift_subkey(r);
        let second = shift_subkey(first);
        r.zeroize();
        Self { first, second }
    }

    pub fn first(&self) -> &Block {
        &self.first
    }

    pub fn second(&self) -> &Block {
        &self.second
    }
}

impl std::fmt::Debug for Subkeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subkeys")
            .field("first", &"[REDACTED]")
            .field("second", &"[REDACTED]")
            .finish()
    }
}

/// A CMAC instance with its key schedule and subkeys computed once.
pub struct Cmac<C: BlockCipher> {
    key: C::EncryptKey,
    subkeys: Subkeys,
}

impl<C: BlockCipher> Cmac<C> {
    pub fn new(raw_key: &[u8]) -> SectorResult<Self> {
        Ok(Self::from_key(C::derive_encrypt_key(raw_key)?))
    }

    pub fn from_key(key: C::EncryptKey) -> Self {
        let subkeys = Subkeys::derive::<C>(&key);
        Self { key, subkeys }
    }

    pub fn subkeys(&self) -> &Subkeys {
        &self.subkeys
    }

    /// Tag over a byte buffer holding at least one whole block.
    pub fn digest(&self, data: &[u8], tag_size: TagSize) -> SectorResult<Block> {
        block_count(data.len(), MODE, 1)?;
        let blocks = load_blocks(data);
        Ok(self.digest_blocks(&blocks, tag_size))
    }

    /// Tag over pre-split blocks. `blocks` must not be empty.
    pub(crate) fn digest_blocks(&self, blocks: &[Block], tag_size: TagSize) -> Block {
        let Some((last, body)) = blocks.split_last() else {
            return tag_size.truncate(C::encrypt_block(&self.key, self.subkeys.first));
        };
        let mut state = Block::ZERO;
        for block in body {
            state = C::encrypt_block(&self.key, state ^ *block);
        }
        let tag = C::encrypt_block(&self.key, state ^ *last ^ self.subkeys.first);
        state.zeroize();
        tag_size.truncate(tag)
    }

    /// Recompute the tag and compare in constant time.
    pub fn verify(&self, data: &[u8], tag: &Block, tag_size: TagSize) -> SectorResult<Verification> {
        let mut expected = self.digest(data, tag_size)?;
        let equal: bool = expected.0[..].ct_eq(&tag.0[..]).into();
        expected.zeroize();
        Ok(if equal {
            Verification::Valid
        } else {
            tracing::debug!(tag_bits = tag_size.bits(), "cmac tag mismatch");
            Verification::Invalid
        })
    }
}

/// Schedule `key` and compute a `tag_bits` tag over `data`.
pub fn digest<C: BlockCipher>(data: &[u8], key: &[u8], tag_bits: u32) -> SectorResult<Block> {
    let tag_size = TagSize::try_from(tag_bits)?;
    Cmac::<C>::new(key)?.digest(data, tag_size)
}

/// Schedule `key` and check `tag` against `data`.
pub fn verify<C: BlockCipher>(
    data: &[u8],
    key: &[u8],
    tag: &Block,
    tag_bits: u32,
) -> SectorResult<Verification> {
    let tag_size = TagSize::try_from(tag_bits)?;
    Cmac::<C>::new(key)?.verify(data, tag, tag_size)
}
