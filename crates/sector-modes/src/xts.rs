//! XTS: narrow-block tweakable mode.
//!
//! Each block is masked before and after the data cipher with the sector
//! tweak `E_tk(sector)` advanced by one field doubling per block.

use sector_core::block::{check_buffers, load_blocks, store_blocks};
use sector_core::gf128::multiply_by_alpha;
use sector_core::{Block, BlockCipher, SectorResult};
use zeroize::Zeroize;

const MODE: &str = "xts";
const MIN_BLOCKS: usize = 1;

pub struct Xts<C: BlockCipher> {
    data_encrypt: C::EncryptKey,
    data_decrypt: C::DecryptKey,
    tweak: C::EncryptKey,
}

impl<C: BlockCipher> Xts<C> {
    pub fn new(data_key: &[u8], tweak_key: &[u8]) -> SectorResult<Self> {
        Ok(Self::from_keys(
            C::derive_encrypt_key(data_key)?,
            C::derive_decrypt_key(data_key)?,
            C::derive_encrypt_key(tweak_key)?,
        ))
    }

    pub fn from_keys(
        data_encrypt: C::EncryptKey,
        data_decrypt: C::DecryptKey,
        tweak: C::EncryptKey,
    ) -> Self {
        Self {
            data_encrypt,
            data_decrypt,
            tweak,
        }
    }

    pub fn encrypt(&self, sector: u64, plaintext: &[u8], ciphertext: &mut [u8]) -> SectorResult<()> {
        check_buffers(plaintext.len(), ciphertext.len(), MODE, MIN_BLOCKS)?;
        ciphertext.copy_from_slice(plaintext);
        self.encrypt_in_place(sector, ciphertext)
    }

    pub fn decrypt(&self, sector: u64, ciphertext: &[u8], plaintext: &mut [u8]) -> SectorResult<()> {
        check_buffers(ciphertext.len(), plaintext.len(), MODE, MIN_BLOCKS)?;
        plaintext.copy_from_slice(ciphertext);
        self.decrypt_in_place(sector, plaintext)
    }

    pub fn encrypt_in_place(&self, sector: u64, buf: &mut [u8]) -> SectorResult<()> {
        check_buffers(buf.len(), buf.len(), MODE, MIN_BLOCKS)?;
        let mut blocks = load_blocks(buf);
        self.apply(sector, &mut blocks, |block| {
            C::encrypt_block(&self.data_encrypt, block)
        });
        store_blocks(&blocks, buf);
        Ok(())
    }

    pub fn decrypt_in_place(&self, sector: u64, buf: &mut [u8]) -> SectorResult<()> {
        check_buffers(buf.len(), buf.len(), MODE, MIN_BLOCKS)?;
        let mut blocks = load_blocks(buf);
        self.apply(sector, &mut blocks, |block| {
            C::decrypt_block(&self.data_decrypt, block)
        });
        store_blocks(&blocks, buf);
        Ok(())
    }

    /// Both directions share the tweak schedule; only the block operation differs.
    fn apply(&self, sector: u64, blocks: &mut [Block], cipher: impl Fn(Block) -> Block) {
        let mut t = C::encrypt_block(&self.tweak, Block::from_u64(sector));
        for block in blocks.iter_mut() {
            *block = cipher(*block ^ t) ^ t;
            t = multiply_by_alpha(t);
        }
        t.zeroize();
    }
}

pub fn encrypt<C: BlockCipher>(
    sector: u64,
    plaintext: &[u8],
    ciphertext: &mut [u8],
    data_key: &[u8],
    tweak_key: &[u8],
) -> SectorResult<()> {
    Xts::<C>::new(data_key, tweak_key)?.encrypt(sector, plaintext, ciphertext)
}

pub fn decrypt<C: BlockCipher>(
    sector: u64,
    ciphertext: &[u8],
    plaintext: &mut [u8],
    data_key: &[u8],
    tweak_key: &[u8],
) -> SectorResult<()> {
    Xts::<C>::new(data_key, tweak_key)?.decrypt(sector, ciphertext, plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_core::{Aes128, Kuznyechik, SectorError};

    fn xts() -> Xts<Kuznyechik> {
        Xts::new(&[0x11; 32], &[0x22; 32]).unwrap()
    }

    #[test]
    fn test_blocks_are_independent() {
        // Changing one plaintext block leaves every other ciphertext block alone.
        let plaintext = [0x44u8; 64];
        let mut changed = plaintext;
        changed[20] ^= 0xff;

        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        xts().encrypt(3, &plaintext, &mut a).unwrap();
        xts().encrypt(3, &changed, &mut b).unwrap();

        assert_eq!(a[..16], b[..16]);
        assert_ne!(a[16..32], b[16..32]);
        assert_eq!(a[32..], b[32..]);
    }

    #[test]
    fn test_equal_blocks_encrypt_differently() {
        let mut out = [0u8; 32];
        xts().encrypt(0, &[0x44u8; 32], &mut out).unwrap();
        assert_ne!(out[..16], out[16..], "tweak must advance between blocks");
    }

    #[test]
    fn test_single_block_sector_allowed() {
        let mut out = [0u8; 16];
        xts().encrypt(1, &[7u8; 16], &mut out).unwrap();
        let mut back = [0u8; 16];
        xts().decrypt(1, &out, &mut back).unwrap();
        assert_eq!(back, [7u8; 16]);
    }

    #[test]
    fn test_empty_and_ragged_buffers_rejected() {
        let mut empty: [u8; 0] = [];
        assert!(matches!(
            xts().encrypt_in_place(0, &mut empty),
            Err(SectorError::InvalidBlockCount { actual: 0, .. })
        ));
        let mut ragged = [0u8; 24];
        assert!(matches!(
            xts().decrypt_in_place(0, &mut ragged),
            Err(SectorError::InvalidBufferLength { length: 24, .. })
        ));
    }

    #[test]
    fn test_wrong_tweak_key_size_rejected() {
        assert!(matches!(
            Xts::<Aes128>::new(&[0u8; 16], &[0u8; 32]),
            Err(SectorError::InvalidKeyLength {
                expected: 16,
                actual: 32
            })
        ));
    }
}
