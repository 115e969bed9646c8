//! sector-core: shared building blocks for sectorcrypt
//!
//! Everything the disk encryption modes consume but do not define:
//!
//! ```text
//! Block (16 bytes, little-endian numeric layout)
//!   ├── gf128: multiply / multiply_by_alpha modulo x^128 + x^7 + x^2 + x + 1
//!   ├── cipher: BlockCipher capability trait + RustCrypto adapters
//!   │   (Kuznyechik, AES-128, AES-256)
//!   └── config: sectorcrypt.toml schema
//! ```

pub mod block;
pub mod cipher;
pub mod config;
pub mod error;
pub mod gf128;

pub use block::{Block, BLOCK_SIZE};
pub use self::cipher::{Aes128, Aes256, BlockCipher, Kuznyechik};
pub use error::{SectorError, SectorResult};
