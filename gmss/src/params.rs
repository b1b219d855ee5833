use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::str::FromStr;

use crate::error::{Error, GmssResult};
use crate::hash::{GmssDigest, digest_size};
use crate::prng::PRNG_ID;
use crate::utils::{Reader, Writer};
use crate::wots::WinternitzOts;

/// Tag opening every serialized parameter set ("GMSS" in ASCII).
pub const GMSS_OID: u32 = 0x474d_5353;

/// Largest supported number of layers.
pub const MAX_LAYERS: usize = 16;
/// Smallest supported tree height.
pub const MIN_HEIGHT: u32 = 4;
/// Largest supported tree height.
pub const MAX_HEIGHT: u32 = 31;
/// Smallest supported Winternitz parameter.
pub const MIN_WINTERNITZ: u32 = 2;
/// Largest supported Winternitz parameter.
pub const MAX_WINTERNITZ: u32 = 16;

/// Shape of a GMSS key: per-layer tree height, Winternitz parameter and
/// retain parameter, top layer first. The digest is the type parameter `D`.
///
/// A key made of layers with heights `h_0, ..., h_{L-1}` can produce
/// `2^(h_0 + ... + h_{L-1})` signatures.
pub struct Parameters<D> {
    heights: Vec<u32>,
    winternitz: Vec<u32>,
    retain_k: Vec<u32>,
    _marker: PhantomData<D>,
}

impl<D> Clone for Parameters<D> {
    fn clone(&self) -> Self {
        Self {
            heights: self.heights.clone(),
            winternitz: self.winternitz.clone(),
            retain_k: self.retain_k.clone(),
            _marker: PhantomData,
        }
    }
}

impl<D: GmssDigest> fmt::Debug for Parameters<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameters")
            .field("digest", &D::NAME)
            .field("heights", &self.heights)
            .field("winternitz", &self.winternitz)
            .field("retain_k", &self.retain_k)
            .finish()
    }
}

impl<D> PartialEq for Parameters<D> {
    fn eq(&self, other: &Self) -> bool {
        self.heights == other.heights
            && self.winternitz == other.winternitz
            && self.retain_k == other.retain_k
    }
}

impl<D> Eq for Parameters<D> {}

impl<D> Hash for Parameters<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.heights.hash(state);
        self.winternitz.hash(state);
        self.retain_k.hash(state);
    }
}

impl<D: GmssDigest> Parameters<D> {
    /// Validates and creates a parameter set.
    ///
    /// Every slice holds one entry per layer, top layer first. Heights must
    /// lie in `4..=31`, Winternitz parameters in `2..=16`, and each retain
    /// parameter `k` must satisfy `2 <= k <= height` with `height - k` even.
    pub fn new(heights: &[u32], winternitz: &[u32], retain_k: &[u32]) -> GmssResult<Self> {
        if heights.len() != winternitz.len() || heights.len() != retain_k.len() {
            return Err(Error::LayerCountMismatch {
                heights: heights.len(),
                winternitz: winternitz.len(),
                retain: retain_k.len(),
            });
        }
        if heights.is_empty() || heights.len() > MAX_LAYERS {
            return Err(Error::InvalidLayerCount(heights.len()));
        }
        for (layer, ((&height, &w), &k)) in heights.iter().zip(winternitz).zip(retain_k).enumerate() {
            if !(MIN_HEIGHT..=MAX_HEIGHT).contains(&height) {
                return Err(Error::InvalidHeight { layer, height });
            }
            if !(MIN_WINTERNITZ..=MAX_WINTERNITZ).contains(&w) {
                return Err(Error::InvalidWinternitz { layer, w });
            }
            if k < 2 || k > height || (height - k) % 2 != 0 {
                return Err(Error::InvalidRetain { layer, k, height });
            }
        }
        Ok(Self {
            heights: heights.to_vec(),
            winternitz: winternitz.to_vec(),
            retain_k: retain_k.to_vec(),
            _marker: PhantomData,
        })
    }

    /// Number of layers.
    pub fn num_layers(&self) -> usize {
        self.heights.len()
    }

    /// Tree height per layer, top layer first.
    pub fn heights(&self) -> &[u32] {
        &self.heights
    }

    /// Winternitz parameter per layer, top layer first.
    pub fn winternitz(&self) -> &[u32] {
        &self.winternitz
    }

    /// Retain parameter per layer, top layer first.
    pub fn retain_k(&self) -> &[u32] {
        &self.retain_k
    }

    /// Size of every node and seed in bytes.
    pub fn digest_size(&self) -> usize {
        digest_size::<D>()
    }

    /// Length of every signature in bytes.
    pub fn signature_len(&self) -> usize {
        (0..self.num_layers()).map(|layer| self.layer_signature_len(layer)).sum()
    }

    /// Number of signatures a key with these parameters can produce, or
    /// `None` if it exceeds `u128`.
    pub fn total_signatures(&self) -> Option<u128> {
        let bits: u32 = self.heights.iter().sum();
        1u128.checked_shl(bits)
    }

    /// Serializes the parameters.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    /// Deserializes parameters produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> GmssResult<Self> {
        let mut r = Reader::new(bytes);
        let params = Self::decode(&mut r)?;
        r.finish()?;
        Ok(params)
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_u32(GMSS_OID);
        w.put_u8(D::ID);
        w.put_u8(PRNG_ID);
        w.put_len(self.num_layers());
        w.put_u32s(&self.heights);
        w.put_u32s(&self.winternitz);
        w.put_u32s(&self.retain_k);
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> GmssResult<Self> {
        let oid = r.get_u32()?;
        if oid != GMSS_OID {
            return Err(Error::InvalidOid(oid));
        }
        let digest_id = r.get_u8()?;
        if digest_id != D::ID {
            return Err(Error::UnsupportedDigest {
                expected: D::ID,
                got: digest_id,
            });
        }
        let prng_id = r.get_u8()?;
        if prng_id != PRNG_ID {
            return Err(Error::UnsupportedPrng(prng_id));
        }
        let num_layers = r.get_u32()? as usize;
        let heights = r.get_u32s()?;
        let winternitz = r.get_u32s()?;
        let retain_k = r.get_u32s()?;
        if heights.len() != num_layers {
            return Err(Error::Malformed("layer count does not match the height array"));
        }
        Self::new(&heights, &winternitz, &retain_k)
    }

    /// Number of leaves of a tree on `layer`.
    pub(crate) fn leaves(&self, layer: usize) -> u32 {
        1 << self.heights[layer]
    }

    pub(crate) fn height(&self, layer: usize) -> u32 {
        self.heights[layer]
    }

    pub(crate) fn w(&self, layer: usize) -> u32 {
        self.winternitz[layer]
    }

    pub(crate) fn k(&self, layer: usize) -> u32 {
        self.retain_k[layer]
    }

    pub(crate) fn ots(&self, layer: usize) -> WinternitzOts<D> {
        WinternitzOts::new(self.winternitz[layer])
    }

    /// Length of one layer's part of a signature.
    pub(crate) fn layer_signature_len(&self, layer: usize) -> usize {
        4 + self.ots(layer).signature_len() + self.heights[layer] as usize * self.digest_size()
    }
}

/// Named parameter sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterSet {
    /// One layer of height 10: 2^10 signatures.
    Gmss10,
    /// Two layers of height 10: 2^20 signatures.
    Gmss20,
    /// Four layers of height 10: 2^40 signatures.
    Gmss40,
}

impl ParameterSet {
    /// Instantiates the parameter set for digest `D`.
    pub fn parameters<D: GmssDigest>(self) -> Parameters<D> {
        let (heights, winternitz, retain_k): (&[u32], &[u32], &[u32]) = match self {
            Self::Gmss10 => (&[10], &[3], &[2]),
            Self::Gmss20 => (&[10, 10], &[5, 4], &[2, 2]),
            Self::Gmss40 => (&[10, 10, 10, 10], &[9, 9, 9, 3], &[2, 2, 2, 2]),
        };
        Parameters {
            heights: heights.to_vec(),
            winternitz: winternitz.to_vec(),
            retain_k: retain_k.to_vec(),
            _marker: PhantomData,
        }
    }
}

impl FromStr for ParameterSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GMSS-10" => Ok(Self::Gmss10),
            "GMSS-20" => Ok(Self::Gmss20),
            "GMSS-40" => Ok(Self::Gmss40),
            _ => Err(Error::InvalidParameterSet(s.to_string())),
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gmss10 => "GMSS-10",
            Self::Gmss20 => "GMSS-20",
            Self::Gmss40 => "GMSS-40",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Sha256, Sha512};
    use sha3::Sha3_256;

    #[test]
    fn test_valid_parameters() {
        let params = Parameters::<Sha256>::new(&[10, 6], &[3, 2], &[2, 4]).unwrap();
        assert_eq!(params.num_layers(), 2);
        assert_eq!(params.total_signatures(), Some(1 << 16));
        assert_eq!(params.digest_size(), 32);
    }

    #[test]
    fn test_mismatched_lengths() {
        assert!(matches!(
            Parameters::<Sha256>::new(&[10, 10], &[3], &[2, 2]),
            Err(Error::LayerCountMismatch { .. })
        ));
    }

    #[test]
    fn test_no_layers() {
        assert!(matches!(
            Parameters::<Sha256>::new(&[], &[], &[]),
            Err(Error::InvalidLayerCount(0))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Parameters::<Sha256>::new(&[3], &[3], &[2]),
            Err(Error::InvalidHeight { layer: 0, height: 3 })
        ));
        assert!(matches!(
            Parameters::<Sha256>::new(&[10, 10], &[3, 1], &[2, 2]),
            Err(Error::InvalidWinternitz { layer: 1, w: 1 })
        ));
        assert!(matches!(
            Parameters::<Sha256>::new(&[10], &[3], &[3]),
            Err(Error::InvalidRetain { .. })
        ));
        assert!(matches!(
            Parameters::<Sha256>::new(&[10], &[3], &[12]),
            Err(Error::InvalidRetain { .. })
        ));
        assert!(matches!(
            Parameters::<Sha256>::new(&[10], &[3], &[1]),
            Err(Error::InvalidRetain { .. })
        ));
    }

    #[test]
    fn test_encoding_layout() {
        let params = Parameters::<Sha256>::new(&[10], &[3], &[2]).unwrap();
        let bytes = params.to_bytes();
        let mut expected = vec![0x47, 0x4d, 0x53, 0x53, 1, 1, 0, 0, 0, 1];
        expected.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 10]);
        expected.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 3]);
        expected.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 2]);
        assert_eq!(bytes, expected);
        assert_eq!(Parameters::<Sha256>::from_bytes(&bytes).unwrap(), params);
    }

    #[test]
    fn test_decode_wrong_digest() {
        let bytes = Parameters::<Sha256>::new(&[10], &[3], &[2]).unwrap().to_bytes();
        assert!(matches!(
            Parameters::<Sha3_256>::from_bytes(&bytes),
            Err(Error::UnsupportedDigest { expected: 4, got: 1 })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_oid_and_prng() {
        let mut bytes = Parameters::<Sha256>::new(&[10], &[3], &[2]).unwrap().to_bytes();
        bytes[5] = 7;
        assert!(matches!(
            Parameters::<Sha256>::from_bytes(&bytes),
            Err(Error::UnsupportedPrng(7))
        ));
        bytes[0] = 0;
        assert!(matches!(
            Parameters::<Sha256>::from_bytes(&bytes),
            Err(Error::InvalidOid(_))
        ));
    }

    #[test]
    fn test_signature_len() {
        // 4 + 90 * 32 + 10 * 32
        let params = ParameterSet::Gmss10.parameters::<Sha256>();
        assert_eq!(params.signature_len(), 3204);
    }

    #[test]
    fn test_named_sets_are_valid() {
        for set in [ParameterSet::Gmss10, ParameterSet::Gmss20, ParameterSet::Gmss40] {
            let params = set.parameters::<Sha512>();
            let checked = Parameters::<Sha512>::new(
                params.heights(),
                params.winternitz(),
                params.retain_k(),
            )
            .unwrap();
            assert_eq!(params, checked);
            assert_eq!(set.to_string().parse::<ParameterSet>().unwrap(), set);
        }
        assert_eq!(
            ParameterSet::Gmss40.parameters::<Sha256>().total_signatures(),
            Some(1 << 40)
        );
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            "GMSS-30".parse::<ParameterSet>(),
            Err(Error::InvalidParameterSet(_))
        ));
    }
}
