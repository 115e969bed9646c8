//! Block cipher capability interface.
//!
//! Modes are written once against [`BlockCipher`] and never name a concrete
//! cipher. [`RustCrypto`] adapts any RustCrypto 128-bit block cipher.

use std::marker::PhantomData;

use cipher::consts::U16;
use cipher::generic_array::GenericArray;
use cipher::typenum::Unsigned;
use cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit, KeySizeUser};

use crate::block::{Block, BLOCK_SIZE};
use crate::error::{SectorError, SectorResult};

/// The four operations every mode needs from a 128-bit block cipher.
///
/// Key scheduling is the only fallible step; block encryption and
/// decryption are total over all inputs once a key exists.
pub trait BlockCipher {
    const BLOCK_SIZE: usize = BLOCK_SIZE;
    const KEY_SIZE: usize;

    /// Expanded key for the forward direction.
    type EncryptKey;
    /// Expanded key for the inverse direction.
    type DecryptKey;

    fn derive_encrypt_key(raw: &[u8]) -> SectorResult<Self::EncryptKey>;
    fn derive_decrypt_key(raw: &[u8]) -> SectorResult<Self::DecryptKey>;

    fn encrypt_block(key: &Self::EncryptKey, block: Block) -> Block;
    fn decrypt_block(key: &Self::DecryptKey, block: Block) -> Block;
}

/// Adapter from the RustCrypto `cipher` traits.
///
/// RustCrypto ciphers carry both directions in one scheduled value, so the
/// encrypt and decrypt keys share a type.
pub struct RustCrypto<C>(PhantomData<C>);

pub type Kuznyechik = RustCrypto<kuznyechik::Kuznyechik>;
pub type Aes128 = RustCrypto<aes::Aes128>;
pub type Aes256 = RustCrypto<aes::Aes256>;

impl<C> RustCrypto<C>
where
    C: KeyInit,
{
    fn schedule(raw: &[u8]) -> SectorResult<C> {
        C::new_from_slice(raw).map_err(|_| SectorError::InvalidKeyLength {
            expected: <C as KeySizeUser>::KeySize::USIZE,
            actual: raw.len(),
        })
    }
}

impl<C> BlockCipher for RustCrypto<C>
where
    C: KeyInit + BlockEncrypt + BlockDecrypt + BlockSizeUser<BlockSize = U16>,
{
    const KEY_SIZE: usize = <C as KeySizeUser>::KeySize::USIZE;

    type EncryptKey = C;
    type DecryptKey = C;

    fn derive_encrypt_key(raw: &[u8]) -> SectorResult<C> {
        Self::schedule(raw)
    }

    fn derive_decrypt_key(raw: &[u8]) -> SectorResult<C> {
        Self::schedule(raw)
    }

    fn encrypt_block(key: &C, block: Block) -> Block {
        let mut buf = GenericArray::clone_from_slice(&block.0);
        BlockEncrypt::encrypt_block(key, &mut buf);
        let mut out = Block::ZERO;
        out.0.copy_from_slice(&buf);
        out
    }

    fn decrypt_block(key: &C, block: Block) -> Block {
        let mut buf = GenericArray::clone_from_slice(&block.0);
        BlockDecrypt::decrypt_block(key, &mut buf);
        let mut out = Block::ZERO;
        out.0.copy_from_slice(&buf);
        out
    }
}
