use zeroize::Zeroize;

use crate::error::{Error, GmssResult};
use crate::hash::{GmssDigest, hash_chain};
use crate::prng::DigestPrng;
use crate::utils::{Reader, Writer, expect_len};
use crate::wots::WinternitzOts;

/// Produces a Winternitz signature over a message known in advance, spending
/// a bounded number of hash operations per step.
///
/// Used to sign the root of a layer's next subtree while the layer below is
/// still signing with the current one. The finished signature is identical
/// to a direct one-time signature with the same seed.
#[derive(Clone, Default)]
pub(crate) struct RootSig {
    digits: Vec<u32>,
    steps: u64,
    prng_state: Vec<u8>,
    chain: Vec<u8>,
    chain_index: u32,
    chain_pos: u32,
    signature: Vec<u8>,
}

impl RootSig {
    /// Starts signing `message` with the one-time key derived from
    /// `ots_seed`.
    pub(crate) fn new<D: GmssDigest>(w: u32, ots_seed: &[u8], message: &[u8], steps: u64) -> Self {
        let ots = WinternitzOts::<D>::new(w);
        Self {
            digits: ots.digits(message),
            steps,
            prng_state: ots_seed.to_vec(),
            signature: Vec::with_capacity(ots.signature_len()),
            ..Self::default()
        }
    }

    /// Total work for signing `message` with `w`-bit digits.
    pub(crate) fn cost<D: GmssDigest>(w: u32, message: &[u8]) -> u64 {
        let digits = WinternitzOts::<D>::new(w).digits(message);
        digits.iter().map(|&d| u64::from(d) + 1).sum()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.chain_index as usize >= self.digits.len()
    }

    /// The signature; complete once [`is_finished`](Self::is_finished).
    pub(crate) fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub(crate) fn advance_one_step<D: GmssDigest>(&mut self) {
        self.advance_by::<D>(self.steps);
    }

    pub(crate) fn finish<D: GmssDigest>(&mut self) {
        self.advance_by::<D>(u64::MAX);
    }

    /// Spends at most `units` hash operations and returns how many were used.
    pub(crate) fn advance_by<D: GmssDigest>(&mut self, units: u64) -> u64 {
        let mut used = 0;
        while used < units {
            let Some(&digit) = self.digits.get(self.chain_index as usize) else {
                break;
            };
            if self.chain_pos == 0 {
                self.chain = DigestPrng::<D>::next_seed(&mut self.prng_state);
            } else {
                hash_chain::<D>(&mut self.chain, 1);
            }
            self.chain_pos += 1;
            if self.chain_pos > digit {
                self.signature.extend_from_slice(&self.chain);
                self.chain.zeroize();
                self.chain_index += 1;
                self.chain_pos = 0;
            }
            used += 1;
        }
        if self.is_finished() {
            self.prng_state.zeroize();
        }
        used
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_u32s(&self.digits);
        w.put_u64(self.steps);
        w.put_bytes(&self.prng_state);
        w.put_bytes(&self.chain);
        w.put_u32(self.chain_index);
        w.put_u32(self.chain_pos);
        w.put_bytes(&self.signature);
    }

    /// Decodes a generator signing with Winternitz parameter `w` over
    /// `n`-byte digests.
    pub(crate) fn decode<D: GmssDigest>(r: &mut Reader<'_>, w: u32, n: usize) -> GmssResult<Self> {
        let sig = Self {
            digits: r.get_u32s()?,
            steps: r.get_u64()?,
            prng_state: r.get_bytes()?,
            chain: r.get_bytes()?,
            chain_index: r.get_u32()?,
            chain_pos: r.get_u32()?,
            signature: r.get_bytes()?,
        };

        let ots = WinternitzOts::<D>::new(w);
        expect_len(sig.digits.len(), ots.key_len(), "root signature digit count")?;
        if sig.digits.iter().any(|&d| d > ots.chain_len()) {
            return Err(Error::Malformed("root signature digit out of range"));
        }
        expect_len(
            sig.signature.len(),
            (sig.chain_index as usize).min(sig.digits.len()) * n,
            "root signature length",
        )?;
        if let Some(&digit) = sig.digits.get(sig.chain_index as usize) {
            expect_len(sig.prng_state.len(), n, "root signature seed length")?;
            if sig.chain_pos > digit {
                return Err(Error::Malformed("root signature position"));
            }
            if sig.chain_pos > 0 {
                expect_len(sig.chain.len(), n, "root signature chain length")?;
            }
        }
        Ok(sig)
    }
}

impl Zeroize for RootSig {
    fn zeroize(&mut self) {
        self.digits.zeroize();
        self.prng_state.zeroize();
        self.chain.zeroize();
        self.signature.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;
    use sha3::Sha3_512;

    #[test]
    fn test_incremental_signature_matches_direct() {
        let seed = [0x17u8; 32];
        let root = [0xa5u8; 32];
        for w in [2, 4, 5] {
            let ots = WinternitzOts::<Sha256>::new(w);
            let expected = ots.sign(&seed, &root);
            let mut sig = RootSig::new::<Sha256>(w, &seed, &root, 11);
            while !sig.is_finished() {
                sig.advance_one_step::<Sha256>();
            }
            assert_eq!(sig.signature(), expected.as_slice());
        }
    }

    #[test]
    fn test_cost_matches_work() {
        let seed = [3u8; 64];
        let root = [4u8; 64];
        let mut sig = RootSig::new::<Sha3_512>(3, &seed, &root, 1);
        let used = sig.advance_by::<Sha3_512>(u64::MAX);
        assert_eq!(used, RootSig::cost::<Sha3_512>(3, &root));
        assert!(sig.is_finished());
    }

    #[test]
    fn test_encode_decode_mid_computation() {
        let seed = [0x21u8; 32];
        let root = [0x12u8; 32];
        let mut sig = RootSig::new::<Sha256>(4, &seed, &root, 5);
        sig.advance_by::<Sha256>(333);

        let mut w = Writer::new();
        sig.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let mut decoded = RootSig::decode::<Sha256>(&mut r, 4, 32).unwrap();
        r.finish().unwrap();

        decoded.finish::<Sha256>();
        let ots = WinternitzOts::<Sha256>::new(4);
        assert_eq!(decoded.signature(), ots.sign(&seed, &root).as_slice());
    }
}
