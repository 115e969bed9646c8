//! DEC: per-sector keys from a three-level hierarchy driving a counter keystream.
//!
//! ```text
//! master key
//!   └── partition key = KDF(master,    IV = 0,                P = partition || partition_counter)
//!       └── sector key = KDF(partition, IV = partition || 0,  P = sector_counter / v || sector)
//!           └── C[t] = P[t] ^ E(sector key, sector || sector_counter * n + t)
//! ```
//!
//! `A || B` places `B` in bytes 0..8 and `A` in bytes 8..16, both little-endian.
//! `v` bounds how many consecutive sector counters share one sector key.
//! Encryption and decryption are the same keystream XOR.

use sector_core::block::{check_buffers, load_blocks, store_blocks};
use sector_core::{Block, BlockCipher, SectorResult, BLOCK_SIZE};
use zeroize::{Zeroize, Zeroizing};

use crate::kdf::{derive_key, derive_key_with, CmacKdf, KdfHooks};

const MODE: &str = "dec";
const MIN_BLOCKS: usize = 1;

/// Identifies one sector write within the key hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectorAddress {
    pub partition: u64,
    pub partition_counter: u64,
    pub sector: u64,
    pub sector_counter: u64,
}

/// Rekey interval `v = floor(2^(block_bits/2 - 1) / blocks) * 2`.
///
/// Computed in 128 bits: a one-block sector gives `v = 2^64`, so every
/// sector counter lands in bucket zero.
pub fn rekey_interval(blocks: usize) -> u128 {
    let half_bits = (BLOCK_SIZE * 8 / 2) as u32;
    let blocks = blocks.max(1) as u128;
    ((1u128 << (half_bits - 1)) / blocks) * 2
}

/// The bucket `sector_counter / v` that selects a sector key.
pub fn normalized_sector_counter(sector_counter: u64, blocks: usize) -> u64 {
    let bucket = u128::from(sector_counter) / rekey_interval(blocks);
    // bucket <= sector_counter, so it always fits
    bucket as u64
}

pub struct Dec<C: BlockCipher, H: KdfHooks = CmacKdf<C>> {
    hooks: H,
    master: H::Key,
    _cipher: std::marker::PhantomData<C>,
}

impl<C: BlockCipher> Dec<C, CmacKdf<C>> {
    pub fn new(master_key: &[u8]) -> SectorResult<Self> {
        Self::with_hooks(CmacKdf::default(), master_key)
    }
}

impl<C: BlockCipher, H: KdfHooks> Dec<C, H> {
    pub fn with_hooks(hooks: H, master_key: &[u8]) -> SectorResult<Self> {
        let master = hooks.initialize_key(master_key)?;
        Ok(Self::from_key(hooks, master))
    }

    /// Reuse a master key the hooks have already scheduled.
    pub fn from_key(hooks: H, master: H::Key) -> Self {
        Self {
            hooks,
            master,
            _cipher: std::marker::PhantomData,
        }
    }

    pub fn derive_partition_key(
        &self,
        partition: u64,
        partition_counter: u64,
    ) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; C::KEY_SIZE]);
        derive_key_with(
            &self.hooks,
            &self.master,
            &Block::ZERO,
            &Block::from_u64_pair(partition_counter, partition),
            &mut key,
        );
        key
    }

    /// Raw sector key bytes for a sector of `blocks` blocks.
    pub fn derive_sector_key(
        &self,
        address: &SectorAddress,
        blocks: usize,
    ) -> SectorResult<Zeroizing<Vec<u8>>> {
        let partition_key = self.derive_partition_key(address.partition, address.partition_counter);
        let bucket = normalized_sector_counter(address.sector_counter, blocks);
        tracing::debug!(
            partition = address.partition,
            sector = address.sector,
            bucket,
            blocks,
            "deriving dec sector key"
        );
        derive_key(
            &self.hooks,
            &partition_key,
            &Block::from_u64_pair(0, address.partition),
            &Block::from_u64_pair(address.sector, bucket),
            C::KEY_SIZE,
        )
    }

    pub fn encrypt(
        &self,
        address: &SectorAddress,
        plaintext: &[u8],
        ciphertext: &mut [u8],
    ) -> SectorResult<()> {
        check_buffers(plaintext.len(), ciphertext.len(), MODE, MIN_BLOCKS)?;
        ciphertext.copy_from_slice(plaintext);
        self.apply_in_place(address, ciphertext)
    }

    /// Same keystream as [`Dec::encrypt`].
    pub fn decrypt(
        &self,
        address: &SectorAddress,
        ciphertext: &[u8],
        plaintext: &mut [u8],
    ) -> SectorResult<()> {
        self.encrypt(address, ciphertext, plaintext)
    }

    pub fn encrypt_in_place(&self, address: &SectorAddress, sector: &mut [u8]) -> SectorResult<()> {
        self.apply_in_place(address, sector)
    }

    pub fn decrypt_in_place(&self, address: &SectorAddress, sector: &mut [u8]) -> SectorResult<()> {
        self.apply_in_place(address, sector)
    }

    fn apply_in_place(&self, address: &SectorAddress, sector: &mut [u8]) -> SectorResult<()> {
        let blocks = check_buffers(sector.len(), sector.len(), MODE, MIN_BLOCKS)?;
        let sector_key = self.derive_sector_key(address, blocks)?;
        let key = C::derive_encrypt_key(&sector_key)?;

        let base = address.sector_counter.wrapping_mul(blocks as u64);
        let mut data = load_blocks(sector);
        for (t, block) in data.iter_mut().enumerate() {
            let counter = Block::from_u64_pair(base.wrapping_add(t as u64), address.sector);
            let mut gamma = C::encrypt_block(&key, counter);
            *block ^= gamma;
            gamma.zeroize();
        }
        store_blocks(&data, sector);
        Ok(())
    }
}

/// Schedule the master key and encrypt one sector.
pub fn encrypt<C: BlockCipher>(
    address: &SectorAddress,
    plaintext: &[u8],
    ciphertext: &mut [u8],
    master_key: &[u8],
) -> SectorResult<()> {
    Dec::<C>::new(master_key)?.encrypt(address, plaintext, ciphertext)
}

/// Schedule the master key and decrypt one sector.
pub fn decrypt<C: BlockCipher>(
    address: &SectorAddress,
    ciphertext: &[u8],
    plaintext: &mut [u8],
    master_key: &[u8],
) -> SectorResult<()> {
    Dec::<C>::new(master_key)?.decrypt(address, ciphertext, plaintext)
}
