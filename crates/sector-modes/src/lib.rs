//! sector-modes: disk and sector encryption modes over any 128-bit block cipher
//!
//! | Mode | Kind | Minimum blocks | Keys |
//! |------|------|----------------|------|
//! | [`cmac`] | MAC, 64/128-bit tags | 1 | MAC key |
//! | [`cmc`]  | wide-block, CBC-mask-CBC | 2 | data key + tweak key |
//! | [`xts`]  | narrow-block tweakable | 1 | data key + tweak key |
//! | [`heh`]  | wide-block, hash-ECB-hash | 2 | data key |
//! | [`dec`]  | hierarchical keys + counter keystream | 1 | master key |
//!
//! Every mode has a keyed handle for reuse across sectors and free
//! functions that schedule raw key bytes per call. Buffers are validated
//! before any output is written.
//!
//! ```text
//! master key ── KDF(CMAC) ──> partition key ── KDF(CMAC) ──> sector key ──> keystream   (dec)
//! ```

pub mod cmac;
pub mod cmc;
pub mod dec;
pub mod heh;
pub mod kdf;
pub mod xts;

pub use cmac::{Cmac, TagSize, Verification};
pub use cmc::Cmc;
pub use dec::{Dec, SectorAddress};
pub use heh::Heh;
pub use kdf::{CmacKdf, KdfHooks};
pub use xts::Xts;
