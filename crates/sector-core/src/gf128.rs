//! GF(2^128) arithmetic for tweak and mask computation.
//!
//! A block is read as a little-endian 128-bit integer whose bit `i` is the
//! coefficient of `x^i`. Products are reduced modulo
//! `x^128 + x^7 + x^2 + x + 1`. No branch or memory access depends on the
//! operand values.

use crate::block::Block;

/// Low-order terms of the reduction polynomial: x^7 + x^2 + x + 1.
pub const REDUCTION: u128 = 0x87;

#[inline]
fn double(value: u128) -> u128 {
    let carry = value >> 127;
    (value << 1) ^ (carry.wrapping_neg() & REDUCTION)
}

/// Multiply by the primitive element `x` (one doubling step).
pub fn multiply_by_alpha(a: Block) -> Block {
    Block::from_u128_le(double(a.to_u128_le()))
}

/// General field multiplication.
pub fn multiply(a: Block, b: Block) -> Block {
    let mut x = a.to_u128_le();
    let y = b.to_u128_le();
    let mut product = 0u128;
    for i in 0..128 {
        let bit = (y >> i) & 1;
        product ^= bit.wrapping_neg() & x;
        x = double(x);
    }
    Block::from_u128_le(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use proptest::prelude::*;

    fn counting_block(start: u8) -> Block {
        let mut bytes = [0u8; 16];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = start + i as u8;
        }
        Block::new(bytes)
    }

    #[test]
    fn test_alpha_shifts_without_carry() {
        let doubled = multiply_by_alpha(counting_block(0));
        assert_eq!(doubled.0, hex!("00020406080a0c0e10121416181a1c1e"));
    }

    #[test]
    fn test_alpha_reduces_top_bit() {
        let mut bytes = [0u8; 16];
        bytes[15] = 0x80;
        let doubled = multiply_by_alpha(Block::new(bytes));
        assert_eq!(doubled.0, hex!("87000000000000000000000000000000"));
    }

    #[test]
    fn test_multiply_known_product() {
        let product = multiply(counting_block(0x00), counting_block(0x10));
        assert_eq!(product.0, hex!("c041ee395862761aa00a8e7238291651"));
    }

    #[test]
    fn test_multiply_identity_and_zero() {
        let a = counting_block(0x42);
        assert_eq!(multiply(a, Block::from_u64(1)), a);
        assert_eq!(multiply(a, Block::ZERO), Block::ZERO);
    }

    proptest! {
        #[test]
        fn multiply_by_two_is_alpha(bytes in any::<[u8; 16]>()) {
            let a = Block::new(bytes);
            prop_assert_eq!(multiply(a, Block::from_u64(2)), multiply_by_alpha(a));
        }

        #[test]
        fn multiply_commutes(x in any::<[u8; 16]>(), y in any::<[u8; 16]>()) {
            let (a, b) = (Block::new(x), Block::new(y));
            prop_assert_eq!(multiply(a, b), multiply(b, a));
        }

        #[test]
        fn multiply_distributes_over_xor(
            x in any::<[u8; 16]>(),
            y in any::<[u8; 16]>(),
            z in any::<[u8; 16]>(),
        ) {
            let (a, b, c) = (Block::new(x), Block::new(y), Block::new(z));
            prop_assert_eq!(multiply(a, b ^ c), multiply(a, b) ^ multiply(a, c));
        }
    }
}
