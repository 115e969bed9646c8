//! MAC-driven key derivation in feedback mode.
//!
//! ```text
//! K(0) = IV
//! K(i) = MAC(key, format(K(i-1), i, P))
//! out  = K(1) || K(2) || ...   (truncated to the requested length)
//! ```
//!
//! The MAC, the key schedule and the message layout are supplied through
//! [`KdfHooks`], so the chain itself stays independent of the cipher.

use sector_core::{Block, BlockCipher, SectorResult, BLOCK_SIZE};
use zeroize::{Zeroize, Zeroizing};

use crate::cmac::{Cmac, TagSize};

pub trait KdfHooks {
    type Key;

    fn initialize_key(&self, raw: &[u8]) -> SectorResult<Self::Key>;

    /// Lay out one MAC input from the previous chain value, the 1-based
    /// iteration counter and the caller's context block.
    fn format(&self, chain: &Block, counter: u32, context: &Block) -> Vec<Block>;

    fn mac(&self, key: &Self::Key, message: &[Block]) -> Block;

    /// Bytes of each MAC output that enter the derived key.
    fn mac_size(&self) -> usize {
        BLOCK_SIZE
    }
}

/// CMAC with 128-bit tags over the two-block message `chain || context`.
pub struct CmacKdf<C>(std::marker::PhantomData<C>);

impl<C> Default for CmacKdf<C> {
    fn default() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<C: BlockCipher> KdfHooks for CmacKdf<C> {
    type Key = Cmac<C>;

    fn initialize_key(&self, raw: &[u8]) -> SectorResult<Cmac<C>> {
        Cmac::new(raw)
    }

    fn format(&self, chain: &Block, _counter: u32, context: &Block) -> Vec<Block> {
        vec![*chain, *context]
    }

    fn mac(&self, key: &Cmac<C>, message: &[Block]) -> Block {
        key.digest_blocks(message, TagSize::Bits128)
    }
}

/// Fill `out` from an already initialized MAC key.
pub fn derive_key_with<H: KdfHooks>(
    hooks: &H,
    key: &H::Key,
    iv: &Block,
    context: &Block,
    out: &mut [u8],
) {
    let step = hooks.mac_size().clamp(1, BLOCK_SIZE);
    let mut chain = *iv;
    for (i, chunk) in out.chunks_mut(step).enumerate() {
        let message = Zeroizing::new(hooks.format(&chain, i as u32 + 1, context));
        chain = hooks.mac(key, &message);
        chunk.copy_from_slice(&chain.0[..chunk.len()]);
    }
    chain.zeroize();
}

/// Schedule `raw_key` through the hooks, then derive `len` bytes.
pub fn derive_key<H: KdfHooks>(
    hooks: &H,
    raw_key: &[u8],
    iv: &Block,
    context: &Block,
    len: usize,
) -> SectorResult<Zeroizing<Vec<u8>>> {
    let key = hooks.initialize_key(raw_key)?;
    let mut out = Zeroizing::new(vec![0u8; len]);
    derive_key_with(hooks, &key, iv, context, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_core::Kuznyechik;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn test_chain_feeds_previous_output() {
        let hooks = CmacKdf::<Kuznyechik>::default();
        let iv = Block::from_u64(7);
        let context = Block::from_u64_pair(1, 2);
        let out = derive_key(&hooks, &KEY, &iv, &context, 32).unwrap();

        let cmac = Cmac::<Kuznyechik>::new(&KEY).unwrap();
        let k1 = cmac.digest_blocks(&[iv, context], TagSize::Bits128);
        let k2 = cmac.digest_blocks(&[k1, context], TagSize::Bits128);
        assert_eq!(&out[..16], &k1.0);
        assert_eq!(&out[16..], &k2.0);
    }

    #[test]
    fn test_output_truncated_to_requested_length() {
        let hooks = CmacKdf::<Kuznyechik>::default();
        let long = derive_key(&hooks, &KEY, &Block::ZERO, &Block::ZERO, 32).unwrap();
        let short = derive_key(&hooks, &KEY, &Block::ZERO, &Block::ZERO, 20).unwrap();
        assert_eq!(short.len(), 20);
        assert_eq!(&short[..], &long[..20]);
    }

    #[test]
    fn test_context_changes_output() {
        let hooks = CmacKdf::<Kuznyechik>::default();
        let a = derive_key(&hooks, &KEY, &Block::ZERO, &Block::from_u64(1), 32).unwrap();
        let b = derive_key(&hooks, &KEY, &Block::ZERO, &Block::from_u64(2), 32).unwrap();
        assert_ne!(a, b);
    }

    /// Records the counters it is handed and MACs with a plain XOR fold.
    struct XorHooks {
        mac_size: usize,
    }

    impl KdfHooks for XorHooks {
        type Key = Block;

        fn initialize_key(&self, raw: &[u8]) -> SectorResult<Block> {
            Block::from_slice(raw)
        }

        fn format(&self, chain: &Block, counter: u32, context: &Block) -> Vec<Block> {
            vec![*chain, *context, Block::from_u64(u64::from(counter))]
        }

        fn mac(&self, key: &Block, message: &[Block]) -> Block {
            message.iter().fold(*key, |acc, b| acc ^ *b)
        }

        fn mac_size(&self) -> usize {
            self.mac_size
        }
    }

    #[test]
    fn test_custom_hooks_and_counter() {
        let hooks = XorHooks { mac_size: 8 };
        let key = Block::from_u64(0xff);
        let mut out = [0u8; 24];
        derive_key_with(&hooks, &key, &Block::ZERO, &Block::ZERO, &mut out);

        // K(i) = K(i-1) ^ key ^ i, starting from zero.
        let k1 = 0xffu8 ^ 1;
        let k2 = k1 ^ 0xff ^ 2;
        let k3 = k2 ^ 0xff ^ 3;
        assert_eq!(out[0], k1);
        assert_eq!(out[8], k2);
        assert_eq!(out[16], k3);
    }

    #[test]
    fn test_custom_hooks_key_validation() {
        let hooks = XorHooks { mac_size: 16 };
        assert!(derive_key(&hooks, &[0u8; 5], &Block::ZERO, &Block::ZERO, 16).is_err());
    }
}
