use core::marker::PhantomData;

use digest::Digest;
use zeroize::Zeroize;

use crate::error::{Error, GmssResult};
use crate::hash::{GmssDigest, digest_size, hash_chain};
use crate::prng::DigestPrng;

/// Winternitz one-time signature with `w` bits per digit.
///
/// Chain secrets are the successive outputs of [`DigestPrng`] started from
/// the one-time seed of a leaf. The public key is the hash of all chain ends.
pub(crate) struct WinternitzOts<D> {
    w: u32,
    n: usize,
    message_len: usize,
    checksum_len: usize,
    _marker: PhantomData<D>,
}

impl<D: GmssDigest> WinternitzOts<D> {
    /// Sets up the chain layout for `w` bits per digit, `2 <= w <= 16`.
    pub(crate) fn new(w: u32) -> Self {
        let n = digest_size::<D>();
        let bits = w as usize;
        let message_len = (8 * n).div_ceil(bits);
        let max_checksum = message_len as u64 * u64::from(max_digit(w));
        let checksum_bits = (u64::BITS - max_checksum.leading_zeros()) as usize;
        let checksum_len = checksum_bits.div_ceil(bits);
        Self {
            w,
            n,
            message_len,
            checksum_len,
            _marker: PhantomData,
        }
    }

    /// Number of hash chains.
    pub(crate) fn key_len(&self) -> usize {
        self.message_len + self.checksum_len
    }

    /// Length of a signature in bytes.
    pub(crate) fn signature_len(&self) -> usize {
        self.key_len() * self.n
    }

    /// Length of every chain, `2^w - 1`.
    pub(crate) fn chain_len(&self) -> u32 {
        max_digit(self.w)
    }

    /// Hash operations needed to compute one public key from its seed.
    pub(crate) fn leaf_cost(&self) -> u64 {
        self.key_len() as u64 * (u64::from(self.chain_len()) + 1) + 1
    }

    /// Splits `H(message)` and its checksum into base-`2^w` digits.
    pub(crate) fn digits(&self, message: &[u8]) -> Vec<u32> {
        let digest = D::digest(message);
        let mut digits = base_w(&digest, self.w, self.message_len);

        let max = self.chain_len();
        let checksum: u64 = digits.iter().map(|d| u64::from(max - d)).sum();
        for i in (0..self.checksum_len).rev() {
            let shift = self.w as usize * i;
            // masked to w bits
            #[allow(clippy::cast_possible_truncation)]
            digits.push(((checksum >> shift) & u64::from(max)) as u32);
        }
        digits
    }

    /// Computes the public key of the one-time key derived from `ots_seed`.
    pub(crate) fn public_key(&self, ots_seed: &[u8]) -> Vec<u8> {
        let mut state = ots_seed.to_vec();
        let mut hasher = D::new();
        for _ in 0..self.key_len() {
            let mut chain = DigestPrng::<D>::next_seed(&mut state);
            hash_chain::<D>(&mut chain, self.chain_len());
            Digest::update(&mut hasher, &chain);
        }
        state.zeroize();
        hasher.finalize().to_vec()
    }

    /// Signs `message` with the one-time key derived from `ots_seed`.
    pub(crate) fn sign(&self, ots_seed: &[u8], message: &[u8]) -> Vec<u8> {
        let mut state = ots_seed.to_vec();
        let mut signature = Vec::with_capacity(self.signature_len());
        for digit in self.digits(message) {
            let mut chain = DigestPrng::<D>::next_seed(&mut state);
            hash_chain::<D>(&mut chain, digit);
            signature.extend_from_slice(&chain);
            chain.zeroize();
        }
        state.zeroize();
        signature
    }

    /// Recomputes the public key from a signature over `message`.
    ///
    /// Returns an error only if `signature` has the wrong length; a forged or
    /// corrupted signature yields a different public key.
    pub(crate) fn recover(&self, message: &[u8], signature: &[u8]) -> GmssResult<Vec<u8>> {
        if signature.len() != self.signature_len() {
            return Err(Error::InvalidSignatureLength {
                expected: self.signature_len(),
                got: signature.len(),
            });
        }

        let max = self.chain_len();
        let mut hasher = D::new();
        let mut chain = vec![0u8; self.n];
        for (digit, part) in self.digits(message).into_iter().zip(signature.chunks(self.n)) {
            chain.copy_from_slice(part);
            hash_chain::<D>(&mut chain, max - digit);
            Digest::update(&mut hasher, &chain);
        }
        Ok(hasher.finalize().to_vec())
    }
}

/// Largest digit value for `w` bits.
fn max_digit(w: u32) -> u32 {
    (1 << w) - 1
}

/// Reads `out_len` big-endian `w`-bit digits from `input`, padding with zero
/// bits past the end.
fn base_w(input: &[u8], w: u32, out_len: usize) -> Vec<u32> {
    let mut digits = Vec::with_capacity(out_len);
    let mut bytes = input.iter();
    let mut acc: u64 = 0;
    let mut bits: u32 = 0;

    for _ in 0..out_len {
        while bits < w {
            acc = (acc << 8) | u64::from(bytes.next().copied().unwrap_or(0));
            bits += 8;
        }
        bits -= w;
        // at most w bits remain after the shift
        #[allow(clippy::cast_possible_truncation)]
        digits.push((acc >> bits) as u32);
        acc &= (1u64 << bits) - 1;
    }
    digits
}

/// Computes the leaf value of the leaf whose seed state is `leaf_seed`.
pub(crate) fn leaf_from_seed<D: GmssDigest>(ots: &WinternitzOts<D>, leaf_seed: &[u8]) -> Vec<u8> {
    let mut state = leaf_seed.to_vec();
    let mut ots_seed = DigestPrng::<D>::next_seed(&mut state);
    let leaf = ots.public_key(&ots_seed);
    ots_seed.zeroize();
    state.zeroize();
    leaf
}

/// Returns the one-time seed of the leaf whose seed state is `leaf_seed`.
pub(crate) fn ots_seed_of<D: GmssDigest>(leaf_seed: &[u8]) -> Vec<u8> {
    let mut state = leaf_seed.to_vec();
    let ots_seed = DigestPrng::<D>::next_seed(&mut state);
    state.zeroize();
    ots_seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Sha256, Sha512};

    #[test]
    fn test_base_w_nibbles() {
        assert_eq!(base_w(&[0x12, 0x34], 4, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_base_w_pads_last_digit() {
        // 0b1011_0110 read as 3-bit digits: 101 101 10(0)
        assert_eq!(base_w(&[0xb6], 3, 3), vec![5, 5, 4]);
    }

    #[test]
    fn test_base_w_wide_digits() {
        assert_eq!(base_w(&[0xab, 0xcd, 0xef], 12, 2), vec![0xabc, 0xdef]);
    }

    #[test]
    fn test_layout_sha256() {
        // 256 / 3 -> 86 digits, checksum max 86 * 7 = 602 needs 10 bits -> 4 digits
        let ots = WinternitzOts::<Sha256>::new(3);
        assert_eq!(ots.key_len(), 90);
        assert_eq!(ots.signature_len(), 90 * 32);

        // 256 / 4 -> 64 digits, checksum max 64 * 15 = 960 needs 10 bits -> 3 digits
        let ots = WinternitzOts::<Sha256>::new(4);
        assert_eq!(ots.key_len(), 67);

        // 512 / 8 -> 64 digits, checksum max 64 * 255 needs 14 bits -> 2 digits
        let ots = WinternitzOts::<Sha512>::new(8);
        assert_eq!(ots.key_len(), 66);
    }

    #[test]
    fn test_checksum_digits() {
        let ots = WinternitzOts::<Sha256>::new(4);
        let digits = ots.digits(b"checksum");
        assert_eq!(digits.len(), ots.key_len());

        let checksum: u32 = digits[..64].iter().map(|d| 15 - d).sum();
        let encoded = digits[64..].iter().fold(0u32, |acc, d| (acc << 4) | d);
        assert_eq!(checksum, encoded);
    }

    #[test]
    fn test_sign_recover_matches_public_key() {
        for w in [2, 3, 4, 6] {
            let ots = WinternitzOts::<Sha256>::new(w);
            let seed = [0x5au8; 32];
            let pk = ots.public_key(&seed);
            let sig = ots.sign(&seed, b"message");
            assert_eq!(ots.recover(b"message", &sig).unwrap(), pk);
        }
    }

    #[test]
    fn test_recover_other_message_differs() {
        let ots = WinternitzOts::<Sha256>::new(4);
        let seed = [1u8; 32];
        let sig = ots.sign(&seed, b"message");
        assert_ne!(ots.recover(b"massage", &sig).unwrap(), ots.public_key(&seed));
    }

    #[test]
    fn test_recover_wrong_length() {
        let ots = WinternitzOts::<Sha256>::new(4);
        let sig = ots.sign(&[1u8; 32], b"message");
        assert!(matches!(
            ots.recover(b"message", &sig[1..]),
            Err(Error::InvalidSignatureLength { .. })
        ));
    }

    #[test]
    fn test_leaf_from_seed() {
        let ots = WinternitzOts::<Sha256>::new(2);
        let leaf_seed = [4u8; 32];
        let ots_seed = ots_seed_of::<Sha256>(&leaf_seed);
        assert_eq!(leaf_from_seed(&ots, &leaf_seed), ots.public_key(&ots_seed));
    }
}
