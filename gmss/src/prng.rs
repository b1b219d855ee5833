//! Seed expansion used for every secret in a GMSS key.
//!
//! Each call returns `H(seed)` and moves the seed forward to
//! `seed + H(seed) + 1`, with both additions carried out little-endian
//! modulo `2^(8n)`.

use core::marker::PhantomData;

use zeroize::Zeroize;

use crate::hash::{GmssDigest, hash};

/// Identifier of the digest-based PRNG in encoded parameters.
pub(crate) const PRNG_ID: u8 = 1;

/// Deterministic generator over a caller-held seed.
pub(crate) struct DigestPrng<D>(PhantomData<D>);

impl<D: GmssDigest> DigestPrng<D> {
    /// Returns the next output for `seed` and advances `seed` in place.
    pub(crate) fn next_seed(seed: &mut [u8]) -> Vec<u8> {
        let out = hash::<D>(seed);
        add_le(seed, &out);
        increment_le(seed);
        out
    }

    /// Advances `seed` by `count` steps, discarding the outputs.
    pub(crate) fn skip(seed: &mut [u8], count: u64) {
        for _ in 0..count {
            let mut out = Self::next_seed(seed);
            out.zeroize();
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn add_le(acc: &mut [u8], other: &[u8]) {
    let mut carry = 0u16;
    for (a, b) in acc.iter_mut().zip(other) {
        let sum = u16::from(*a) + u16::from(*b) + carry;
        // keep the low byte, carry the high one
        *a = sum as u8;
        carry = sum >> 8;
    }
}

fn increment_le(acc: &mut [u8]) {
    for byte in acc.iter_mut() {
        let (value, overflow) = byte.overflowing_add(1);
        *byte = value;
        if !overflow {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;

    #[test]
    fn test_add_le_carries() {
        let mut acc = [0xff, 0xff, 0x00];
        add_le(&mut acc, &[0x01, 0x00, 0x00]);
        assert_eq!(acc, [0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_add_le_wraps() {
        let mut acc = [0xff, 0xff];
        add_le(&mut acc, &[0xff, 0xff]);
        assert_eq!(acc, [0xfe, 0xff]);
    }

    #[test]
    fn test_increment_le() {
        let mut acc = [0xff, 0x7f];
        increment_le(&mut acc);
        assert_eq!(acc, [0x00, 0x80]);

        let mut acc = [0xff, 0xff];
        increment_le(&mut acc);
        assert_eq!(acc, [0x00, 0x00]);
    }

    #[test]
    fn test_next_seed_output_and_state() {
        let start = [3u8; 32];
        let mut seed = start;
        let out = DigestPrng::<Sha256>::next_seed(&mut seed);
        assert_eq!(out, hash::<Sha256>(&start));

        let mut expected = start;
        add_le(&mut expected, &out);
        increment_le(&mut expected);
        assert_eq!(seed, expected);
    }

    #[test]
    fn test_skip_matches_repeated_next_seed() {
        let mut a = [9u8; 32];
        let mut b = [9u8; 32];
        for _ in 0..5 {
            DigestPrng::<Sha256>::next_seed(&mut a);
        }
        DigestPrng::<Sha256>::skip(&mut b, 5);
        assert_eq!(a, b);
    }
}
