//! CMC: CBC, mask, reverse CBC. A wide-block tweakable mode.
//!
//! ```text
//! T        = E_tk(tweak)
//! forward  : t = T;  X[i] = E(t ^ P[i]); t = X[i]
//! mask     : M = alpha(X[0] ^ X[n-1]);   X[i] ^= M
//! reverse  : prev = 0; for j = n-1 .. 0: C[j] = E(X[j]) ^ prev; prev = X[j]
//! finish   : C[n-1] ^= T
//! ```

use sector_core::block::{check_buffers, load_blocks, store_blocks};
use sector_core::gf128::multiply_by_alpha;
use sector_core::{Block, BlockCipher, SectorResult};
use zeroize::Zeroize;

const MODE: &str = "cmc";
const MIN_BLOCKS: usize = 2;

/// Pre-scheduled CMC keys, reusable across sectors.
pub struct Cmc<C: BlockCipher> {
    data_encrypt: C::EncryptKey,
    data_decrypt: C::DecryptKey,
    tweak: C::EncryptKey,
}

impl<C: BlockCipher> Cmc<C> {
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

    pub fn encrypt(&self, tweak: u64, plaintext: &[u8], ciphertext: &mut [u8]) -> SectorResult<()> {
        check_buffers(plaintext.len(), ciphertext.len(), MODE, MIN_BLOCKS)?;
        ciphertext.copy_from_slice(plaintext);
        self.encrypt_in_place(tweak, ciphertext)
    }

    pub fn decrypt(&self, tweak: u64, ciphertext: &[u8], plaintext: &mut [u8]) -> SectorResult<()> {
        check_buffers(ciphertext.len(), plaintext.len(), MODE, MIN_BLOCKS)?;
        plaintext.copy_from_slice(ciphertext);
        self.decrypt_in_place(tweak, plaintext)
    }

    pub fn encrypt_in_place(&self, tweak: u64, sector: &mut [u8]) -> SectorResult<()> {
        check_buffers(sector.len(), sector.len(), MODE, MIN_BLOCKS)?;
        let mut blocks = load_blocks(sector);
        self.encrypt_blocks(tweak, &mut blocks);
        store_blocks(&blocks, sector);
        Ok(())
    }

    pub fn decrypt_in_place(&self, tweak: u64, sector: &mut [u8]) -> SectorResult<()> {
        check_buffers(sector.len(), sector.len(), MODE, MIN_BLOCKS)?;
        let mut blocks = load_blocks(sector);
        self.decrypt_blocks(tweak, &mut blocks);
        store_blocks(&blocks, sector);
        Ok(())
    }

    fn encrypt_blocks(&self, tweak: u64, blocks: &mut [Block]) {
        let last = blocks.len() - 1;
        let mut t = C::encrypt_block(&self.tweak, Block::from_u64(tweak));

        let mut chain = t;
        for block in blocks.iter_mut() {
            chain = C::encrypt_block(&self.data_encrypt, chain ^ *block);
            *block = chain;
        }

        let mut mask = multiply_by_alpha(blocks[0] ^ blocks[last]);
        for block in blocks.iter_mut() {
            *block ^= mask;
        }

        let mut prev = Block::ZERO;
        for block in blocks.iter_mut().rev() {
            let masked = *block;
            *block = C::encrypt_block(&self.data_encrypt, masked) ^ prev;
            prev = masked;
        }
        blocks[last] ^= t;

        t.zeroize();
        mask.zeroize();
        prev.zeroize();
    }

    fn decrypt_blocks(&self, tweak: u64, blocks: &mut [Block]) {
        let last = blocks.len() - 1;
        let mut t = C::encrypt_block(&self.tweak, Block::from_u64(tweak));
        blocks[last] ^= t;

        let mut prev = Block::ZERO;
        for block in blocks.iter_mut().rev() {
            prev = C::decrypt_block(&self.data_decrypt, *block ^ prev);
            *block = prev;
        }

        let mut mask = multiply_by_alpha(blocks[0] ^ blocks[last]);
        for block in blocks.iter_mut() {
            *block ^= mask;
        }

        let mut chain = t;
        for block in blocks.iter_mut() {
            let intermediate = *block;
            *block = C::decrypt_block(&self.data_decrypt, intermediate) ^ chain;
            chain = intermediate;
        }

        t.zeroize();
        mask.zeroize();
        chain.zeroize();
    }
}

/// Schedule both keys and encrypt one sector.
pub fn encrypt<C: BlockCipher>(
    tweak: u64,
    plaintext: &[u8],
    ciphertext: &mut [u8],
    data_key: &[u8],
    tweak_key: &[u8],
) -> SectorResult<()> {
    Cmc::<C>::new(data_key, tweak_key)?.encrypt(tweak, plaintext, ciphertext)
}

/// Schedule both keys and decrypt one sector.
pub fn decrypt<C: BlockCipher>(
    tweak: u64,
    ciphertext: &[u8],
    plaintext: &mut [u8],
    data_key: &[u8],
    tweak_key: &[u8],
) -> SectorResult<()> {
    Cmc::<C>::new(data_key, tweak_key)?.decrypt(tweak, ciphertext, plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_core::{Kuznyechik, SectorError};

    const DATA_KEY: [u8; 32] = [
        0xff, 0xfe, 0xfd, 0xfc, 0xfb, 0xfa, 0xf9, 0xf8, 0xf7, 0xf6, 0xf5, 0xf4, 0xf3, 0xf2, 0xf1,
        0xf0, 0xff, 0xfe, 0xfd, 0xfc, 0xfb, 0xfa, 0xf9, 0xf8, 0xf7, 0xf6, 0xf5, 0xf4, 0xf3, 0xf2,
        0xf1, 0xf0,
    ];
    const TWEAK_KEY: [u8; 32] = [0x22; 32];

    fn cmc() -> Cmc<Kuznyechik> {
        Cmc::new(&DATA_KEY, &TWEAK_KEY).unwrap()
    }

    #[test]
    fn test_single_block_rejected() {
        let mut out = [0u8; 16];
        let err = cmc().encrypt(1, &[0u8; 16], &mut out).unwrap_err();
        assert_eq!(
            err,
            SectorError::InvalidBlockCount {
                mode: "cmc",
                minimum: 2,
                actual: 1
            }
        );
        assert_eq!(out, [0u8; 16], "output untouched on precondition failure");
    }

    #[test]
    fn test_output_length_mismatch() {
        let mut out = [0u8; 48];
        let err = cmc().decrypt(1, &[0u8; 32], &mut out).unwrap_err();
        assert_eq!(err, SectorError::LengthMismatch { input: 32, output: 48 });
    }

    #[test]
    fn test_in_place_matches_separate_buffers() {
        let plaintext: Vec<u8> = (0u8..96).collect();
        let mut separate = vec![0u8; 96];
        cmc().encrypt(77, &plaintext, &mut separate).unwrap();

        let mut in_place = plaintext.clone();
        cmc().encrypt_in_place(77, &mut in_place).unwrap();
        assert_eq!(separate, in_place);

        cmc().decrypt_in_place(77, &mut in_place).unwrap();
        assert_eq!(in_place, plaintext);
    }

    #[test]
    fn test_single_byte_change_diffuses_to_every_block() {
        let plaintext = [0x44u8; 64];
        let mut changed = plaintext;
        changed[63] ^= 0x01;

        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        cmc().encrypt(5, &plaintext, &mut a).unwrap();
        cmc().encrypt(5, &changed, &mut b).unwrap();

        for (i, (x, y)) in a.chunks(16).zip(b.chunks(16)).enumerate() {
            assert_ne!(x, y, "block {i} unchanged after last-byte flip");
        }
    }

    #[test]
    fn test_raw_key_functions_match_handle() {
        let plaintext = [0x5au8; 32];
        let mut via_fn = [0u8; 32];
        let mut via_handle = [0u8; 32];
        encrypt::<Kuznyechik>(9, &plaintext, &mut via_fn, &DATA_KEY, &TWEAK_KEY).unwrap();
        cmc().encrypt(9, &plaintext, &mut via_handle).unwrap();
        assert_eq!(via_fn, via_handle);

        let mut back = [0u8; 32];
        decrypt::<Kuznyechik>(9, &via_fn, &mut back, &DATA_KEY, &TWEAK_KEY).unwrap();
        assert_eq!(back, plaintext);
    }
}
