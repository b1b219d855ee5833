use zeroize::Zeroize;

use crate::error::{Error, GmssResult};
use crate::hash::{GmssDigest, hash, hash_chain};
use crate::prng::DigestPrng;
use crate::utils::{Reader, Writer, expect_len};
use crate::wots::{WinternitzOts, ots_seed_of};

/// Computes one leaf (a Winternitz public key) a few hash operations at a
/// time.
///
/// One unit of work is one hash operation: deriving a chain secret, one
/// chain step, or the final hash over all chain ends. A leaf costs
/// `key_len * 2^w + 1` units.
#[derive(Clone, Default)]
pub(crate) struct LeafCalc {
    w: u32,
    key_len: u32,
    steps: u64,
    prng_state: Vec<u8>,
    chain: Vec<u8>,
    chain_index: u32,
    chain_pos: u32,
    ends: Vec<u8>,
    leaf: Vec<u8>,
}

impl LeafCalc {
    /// A generator with nothing to compute.
    pub(crate) fn idle() -> Self {
        Self::default()
    }

    /// Prepares the leaf whose seed state is `leaf_seed`; each
    /// [`advance_one_step`](Self::advance_one_step) spends `steps` units.
    pub(crate) fn new<D: GmssDigest>(w: u32, leaf_seed: &[u8], steps: u64) -> Self {
        let ots = WinternitzOts::<D>::new(w);
        Self {
            w,
            key_len: key_len_u32(ots.key_len()),
            steps,
            prng_state: ots_seed_of::<D>(leaf_seed),
            ..Self::default()
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.w != 0
    }

    pub(crate) fn is_finished(&self) -> bool {
        !self.leaf.is_empty()
    }

    /// The computed leaf; empty until finished.
    pub(crate) fn leaf(&self) -> &[u8] {
        &self.leaf
    }

    pub(crate) fn advance_one_step<D: GmssDigest>(&mut self) {
        self.advance_by::<D>(self.steps);
    }

    /// Completes all remaining work.
    pub(crate) fn finish<D: GmssDigest>(&mut self) {
        self.advance_by::<D>(u64::MAX);
    }

    /// Spends at most `units` hash operations and returns how many were used.
    pub(crate) fn advance_by<D: GmssDigest>(&mut self, units: u64) -> u64 {
        let chain_len = (1u32 << self.w) - 1;
        let mut used = 0;
        while used < units && self.is_active() && !self.is_finished() {
            if self.chain_index < self.key_len {
                if self.chain_pos == 0 {
                    self.chain = DigestPrng::<D>::next_seed(&mut self.prng_state);
                } else {
                    hash_chain::<D>(&mut self.chain, 1);
                }
                self.chain_pos += 1;
                if self.chain_pos > chain_len {
                    self.ends.extend_from_slice(&self.chain);
                    self.chain.zeroize();
                    self.chain_index += 1;
                    self.chain_pos = 0;
                }
            } else {
                self.leaf = hash::<D>(&self.ends);
                self.ends.zeroize();
                self.prng_state.zeroize();
            }
            used += 1;
        }
        used
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_u32(self.w);
        w.put_u32(self.key_len);
        w.put_u64(self.steps);
        w.put_bytes(&self.prng_state);
        w.put_bytes(&self.chain);
        w.put_u32(self.chain_index);
        w.put_u32(self.chain_pos);
        w.put_bytes(&self.ends);
        w.put_bytes(&self.leaf);
    }

    /// Decodes a generator for a layer with Winternitz parameter
    /// `layer_w` and `n`-byte nodes.
    pub(crate) fn decode<D: GmssDigest>(r: &mut Reader<'_>, layer_w: u32, n: usize) -> GmssResult<Self> {
        let calc = Self {
            w: r.get_u32()?,
            key_len: r.get_u32()?,
            steps: r.get_u64()?,
            prng_state: r.get_bytes()?,
            chain: r.get_bytes()?,
            chain_index: r.get_u32()?,
            chain_pos: r.get_u32()?,
            ends: r.get_bytes()?,
            leaf: r.get_bytes()?,
        };
        if !calc.is_active() {
            expect_len(calc.leaf.len(), 0, "idle leaf generator holds a leaf")?;
            return Ok(calc);
        }

        expect_len(calc.w as usize, layer_w as usize, "leaf generator Winternitz parameter")?;
        let ots = WinternitzOts::<D>::new(layer_w);
        expect_len(calc.key_len as usize, ots.key_len(), "leaf generator chain count")?;
        if calc.is_finished() {
            return expect_len(calc.leaf.len(), n, "leaf generator result length").map(|()| calc);
        }
        expect_len(calc.prng_state.len(), n, "leaf generator seed length")?;
        if calc.chain_index > calc.key_len || calc.chain_pos > ots.chain_len() {
            return Err(Error::Malformed("leaf generator position"));
        }
        if calc.chain_pos > 0 {
            expect_len(calc.chain.len(), n, "leaf generator chain length")?;
        }
        expect_len(calc.ends.len(), calc.chain_index as usize * n, "leaf generator chain ends")?;
        Ok(calc)
    }
}

impl Zeroize for LeafCalc {
    fn zeroize(&mut self) {
        self.prng_state.zeroize();
        self.chain.zeroize();
        self.ends.zeroize();
        self.leaf.zeroize();
    }
}

/// Chain counts are bounded by the digest size, far below `u32::MAX`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn key_len_u32(key_len: usize) -> u32 {
    key_len as u32
}

/// Units per step so that `total` units are spread over `calls` steps.
pub(crate) fn spread(total: u64, calls: u64) -> u64 {
    total.div_ceil(calls.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wots::leaf_from_seed;
    use sha2::Sha256;

    #[test]
    fn test_incremental_leaf_matches_direct() {
        let seed = [0x42u8; 32];
        let ots = WinternitzOts::<Sha256>::new(3);
        let expected = leaf_from_seed(&ots, &seed);

        for steps in [1, 7, 100, 5000] {
            let mut calc = LeafCalc::new::<Sha256>(3, &seed, steps);
            let mut calls = 0;
            while !calc.is_finished() {
                calc.advance_one_step::<Sha256>();
                calls += 1;
            }
            assert_eq!(calc.leaf(), expected.as_slice());
            assert_eq!(calls, ots.leaf_cost().div_ceil(steps));
        }
    }

    #[test]
    fn test_advance_by_reports_used_units() {
        let ots = WinternitzOts::<Sha256>::new(2);
        let mut calc = LeafCalc::new::<Sha256>(2, &[1u8; 32], 1);
        assert_eq!(calc.advance_by::<Sha256>(10), 10);
        assert_eq!(calc.advance_by::<Sha256>(u64::MAX), ots.leaf_cost() - 10);
        assert!(calc.is_finished());
        assert_eq!(calc.advance_by::<Sha256>(10), 0);
    }

    #[test]
    fn test_idle_does_nothing() {
        let mut calc = LeafCalc::idle();
        assert!(!calc.is_active());
        assert_eq!(calc.advance_by::<Sha256>(100), 0);
        assert!(!calc.is_finished());
    }

    #[test]
    fn test_encode_decode_mid_computation() {
        let mut calc = LeafCalc::new::<Sha256>(4, &[8u8; 32], 3);
        calc.advance_by::<Sha256>(123);

        let mut w = Writer::new();
        calc.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let mut decoded = LeafCalc::decode::<Sha256>(&mut r, 4, 32).unwrap();
        r.finish().unwrap();

        calc.finish::<Sha256>();
        decoded.finish::<Sha256>();
        assert_eq!(calc.leaf(), decoded.leaf());
    }

    #[test]
    fn test_spread() {
        assert_eq!(spread(10, 3), 4);
        assert_eq!(spread(9, 3), 3);
        assert_eq!(spread(0, 3), 1);
    }
}
