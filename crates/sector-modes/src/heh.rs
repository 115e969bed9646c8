//! HEH: hash, ECB, inverse hash.
//!
//! The hash stage ψ evaluates the sector as a polynomial in `τ = E(tweak)`
//! and folds the result into every block together with a doubling mask
//! sequence seeded from `β = α·τ`. ψ⁻¹ undoes exactly that map, so
//! encryption is `ψ⁻¹ ∘ ECB_E ∘ ψ` and decryption is `ψ⁻¹ ∘ ECB_D ∘ ψ`.

use sector_core::block::{check_buffers, load_blocks, store_blocks};
use sector_core::gf128::{multiply, multiply_by_alpha};
use sector_core::{Block, BlockCipher, SectorResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

const MODE: &str = "heh";
const MIN_BLOCKS: usize = 2;

/// Per-sector hash parameters derived from the tweak.
#[derive(Zeroize, ZeroizeOnDrop)]
struct HashKey {
    tau: Block,
    beta: Block,
}

impl HashKey {
    fn derive<C: BlockCipher>(key: &C::EncryptKey, tweak: u64) -> Self {
        let tau = C::encrypt_block(key, Block::from_u64(tweak));
        Self {
            tau,
            beta: multiply_by_alpha(tau),
        }
    }

    /// Horner evaluation of `blocks` at τ.
    fn poly(&self, blocks: &[Block]) -> Block {
        blocks
            .iter()
            .fold(Block::ZERO, |acc, block| multiply(acc ^ *block, self.tau))
    }

    fn psi(&self, blocks: &mut [Block]) {
        let (last, body) = match blocks.split_last_mut() {
            Some(split) => split,
            None => return,
        };
        let mut y = self.poly(body) ^ *last;
        let mut e = multiply_by_alpha(self.beta);
        for block in body.iter_mut() {
            *block ^= y ^ e;
            e = multiply_by_alpha(e);
        }
        *last = y ^ self.beta;
        y.zeroize();
        e.zeroize();
    }

    fn psi_inverse(&self, blocks: &mut [Block]) {
        let (last, body) = match blocks.split_last_mut() {
            Some(split) => split,
            None => return,
        };
        let mut e = multiply_by_alpha(self.beta);
        for block in body.iter_mut() {
            *block ^= e;
            e = multiply_by_alpha(e);
        }
        *last ^= self.beta;

        let y = *last;
        for block in body.iter_mut() {
            *block ^= y;
        }
        *last ^= self.poly(body);
        e.zeroize();
    }
}

/// HEH with one data key used in both directions.
///
/// The hash stage only ever needs the forward cipher, so decryption holds
/// both the encrypt- and decrypt-oriented schedules.
pub struct Heh<C: BlockCipher> {
    encrypt_key: C::EncryptKey,
    decrypt_key: C::DecryptKey,
}

impl<C: BlockCipher> Heh<C> {
    pub fn new(key: &[u8]) -> SectorResult<Self> {
        Ok(Self::from_keys(
            C::derive_encrypt_key(key)?,
            C::derive_decrypt_key(key)?,
        ))
    }

    pub fn from_keys(encrypt_key: C::EncryptKey, decrypt_key: C::DecryptKey) -> Self {
        Self {
            encrypt_key,
            decrypt_key,
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
        let hash = HashKey::derive::<C>(&self.encrypt_key, tweak);
        let mut blocks = load_blocks(sector);
        hash.psi(&mut blocks);
        for block in blocks.iter_mut() {
            *block = C::encrypt_block(&self.encrypt_key, *block);
        }
        hash.psi_inverse(&mut blocks);
        store_blocks(&blocks, sector);
        Ok(())
    }

    pub fn decrypt_in_place(&self, tweak: u64, sector: &mut [u8]) -> SectorResult<()> {
        check_buffers(sector.len(), sector.len(), MODE, MIN_BLOCKS)?;
        let hash = HashKey::derive::<C>(&self.encrypt_key, tweak);
        let mut blocks = load_blocks(sector);
        hash.psi(&mut blocks);
        for block in blocks.iter_mut() {
            *block = C::decrypt_block(&self.decrypt_key, *block);
        }
        hash.psi_inverse(&mut blocks);
        store_blocks(&blocks, sector);
        Ok(())
    }
}

pub fn encrypt<C: BlockCipher>(
    tweak: u64,
    plaintext: &[u8],
    ciphertext: &mut [u8],
    key: &[u8],
) -> SectorResult<()> {
    Heh::<C>::new(key)?.encrypt(tweak, plaintext, ciphertext)
}

pub fn decrypt<C: BlockCipher>(
    tweak: u64,
    ciphertext: &[u8],
    plaintext: &mut [u8],
    key: &[u8],
) -> SectorResult<()> {
    Heh::<C>::new(key)?.decrypt(tweak, ciphertext, plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sector_core::{Kuznyechik, SectorError};

    fn hash_key(tweak: u64) -> HashKey {
        let key = Kuznyechik::derive_encrypt_key(&[0x5c; 32]).unwrap();
        HashKey::derive::<Kuznyechik>(&key, tweak)
    }

    #[test]
    fn test_poly_is_horner_evaluation() {
        let hash = hash_key(1);
        let a = Block::from_u64(3);
        let b = Block::from_u64(5);
        let expected = multiply(multiply(a, hash.tau) ^ b, hash.tau);
        assert_eq!(hash.poly(&[a, b]), expected);
    }

    #[test]
    fn test_psi_last_block_carries_hash() {
        let hash = hash_key(9);
        let mut blocks = vec![Block::from_u64(1), Block::from_u64(2)];
        let y = multiply(Block::from_u64(1), hash.tau) ^ Block::from_u64(2);
        hash.psi(&mut blocks);
        assert_eq!(blocks[1], y ^ hash.beta);
        assert_eq!(
            blocks[0],
            Block::from_u64(1) ^ y ^ multiply_by_alpha(hash.beta)
        );
    }

    #[test]
    fn test_single_block_rejected() {
        let heh = Heh::<Kuznyechik>::new(&[0u8; 32]).unwrap();
        let mut sector = [0u8; 16];
        assert_eq!(
            heh.encrypt_in_place(0, &mut sector).unwrap_err(),
            SectorError::InvalidBlockCount {
                mode: "heh",
                minimum: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_first_byte_change_diffuses_to_every_block() {
        let heh = Heh::<Kuznyechik>::new(&[0x33; 32]).unwrap();
        let plaintext = [0x44u8; 64];
        let mut changed = plaintext;
        changed[0] ^= 0x80;

        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        heh.encrypt(11, &plaintext, &mut a).unwrap();
        heh.encrypt(11, &changed, &mut b).unwrap();
        for (i, (x, y)) in a.chunks(16).zip(b.chunks(16)).enumerate() {
            assert_ne!(x, y, "block {i} unchanged after first-byte flip");
        }
    }

    proptest! {
        #[test]
        fn psi_inverse_undoes_psi(
            tweak in any::<u64>(),
            raw in prop::collection::vec(any::<[u8; 16]>(), 2..8),
        ) {
            let hash = hash_key(tweak);
            let original: Vec<Block> = raw.into_iter().map(Block::new).collect();
            let mut blocks = original.clone();
            hash.psi(&mut blocks);
            hash.psi_inverse(&mut blocks);
            prop_assert_eq!(blocks, original);
        }
    }
}
