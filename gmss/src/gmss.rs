use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{Error, GmssResult};
use crate::gmss_commons;
use crate::gmss_core;
use crate::hash::GmssDigest;
use crate::params::Parameters;
use crate::state::KeyState;
use crate::utils::{Reader, Writer};

// ---------------------------------------------------------------------------
// SigningKey<D>
// ---------------------------------------------------------------------------

/// A GMSS signing key (private key).
///
/// The key is stateful: every signature consumes one leaf of the bottom
/// layer and updates the precomputations of all layers. Persist the key with
/// [`to_bytes`](Self::to_bytes) after each signature and never sign twice
/// from the same saved state.
pub struct SigningKey<D: GmssDigest> {
    params: Parameters<D>,
    state: KeyState,
    verifying_key: VerifyingKey<D>,
}

impl<D: GmssDigest> core::fmt::Debug for SigningKey<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningKey")
            .field("parameters", &self.params)
            .field("state", &"[REDACTED]")
            .finish()
    }
}

impl<D: GmssDigest> Drop for SigningKey<D> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<D: GmssDigest> Zeroize for SigningKey<D> {
    fn zeroize(&mut self) {
        self.state.zeroize();
    }
}

impl<D: GmssDigest> TryFrom<&[u8]> for SigningKey<D> {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let mut r = Reader::new(value);
        let (params, state) = KeyState::decode::<D>(&mut r)?;
        let root = r.get_node(params.digest_size())?;
        r.finish()?;
        Self::new(params, state, &root)
    }
}

impl<D: GmssDigest> TryFrom<Vec<u8>> for SigningKey<D> {
    type Error = Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        SigningKey::<D>::try_from(value.as_slice())
    }
}

impl<D: GmssDigest> TryFrom<&Vec<u8>> for SigningKey<D> {
    type Error = Error;

    fn try_from(value: &Vec<u8>) -> Result<Self, Self::Error> {
        SigningKey::<D>::try_from(value.as_slice())
    }
}

impl<D: GmssDigest> TryFrom<Box<[u8]>> for SigningKey<D> {
    type Error = Error;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        SigningKey::<D>::try_from(value.as_ref())
    }
}

impl<D: GmssDigest> PartialEq for SigningKey<D> {
    fn eq(&self, other: &Self) -> bool {
        let mut lhs = self.to_bytes();
        let mut rhs = other.to_bytes();
        let eq = lhs.ct_eq(&rhs).into();
        lhs.zeroize();
        rhs.zeroize();
        eq
    }
}

impl<D: GmssDigest> Eq for SigningKey<D> {}

#[cfg(feature = "serde")]
impl<D: GmssDigest> serdect::serde::Serialize for SigningKey<D> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serdect::serde::Serializer,
    {
        let mut bytes = self.to_bytes();
        let result = serdect::slice::serialize_hex_lower_or_bin(&bytes, serializer);
        bytes.zeroize();
        result
    }
}

#[cfg(feature = "serde")]
impl<'de, D: GmssDigest> serdect::serde::Deserialize<'de> for SigningKey<D> {
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: serdect::serde::Deserializer<'de>,
    {
        let mut bytes = serdect::slice::deserialize_hex_or_bin_vec(deserializer)?;
        let key = Self::try_from(bytes.as_slice()).map_err(serdect::serde::de::Error::custom);
        bytes.zeroize();
        key
    }
}

impl<D: GmssDigest> SigningKey<D> {
    pub(crate) fn new(params: Parameters<D>, state: KeyState, root: &[u8]) -> GmssResult<Self> {
        let verifying_key = VerifyingKey::new(params.clone(), root)?;
        Ok(Self {
            params,
            state,
            verifying_key,
        })
    }

    /// Signs a message and advances the key to its next one-time leaf.
    ///
    /// Fails with [`Error::KeyExhausted`] once every leaf has been used.
    pub fn sign(&mut self, message: &[u8]) -> GmssResult<Signature<D>> {
        gmss_core::sign(&self.params, &mut self.state, message).map(|bytes| Signature {
            bytes,
            _marker: PhantomData,
        })
    }

    /// Serializes the full private state, parameters and public root
    /// included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.state.encode(&self.params, &mut w);
        w.put_bytes(self.verifying_key.root());
        w.into_bytes()
    }

    /// The parameters this key was generated with.
    pub fn parameters(&self) -> &Parameters<D> {
        &self.params
    }

    /// Current leaf index of every layer, top layer first.
    pub fn leaf_indices(&self) -> &[u32] {
        &self.state.index
    }

    /// Whether every one-time leaf has been used.
    pub fn is_exhausted(&self) -> bool {
        self.state.is_used
    }

    /// Number of signatures this key can still produce, saturating at
    /// `u128::MAX`.
    pub fn signatures_remaining(&self) -> u128 {
        if self.state.is_used {
            return 0;
        }
        let Some(total) = self.params.total_signatures() else {
            return u128::MAX;
        };
        let used = self
            .state
            .index
            .iter()
            .zip(self.params.heights())
            .try_fold(0u128, |acc, (&index, &height)| {
                acc.checked_shl(height)
                    .map(|shifted| shifted | u128::from(index))
            });
        used.map_or(u128::MAX, |used| total - used)
    }
}

impl<D: GmssDigest> signature::SignerMut<Signature<D>> for SigningKey<D> {
    fn try_sign(&mut self, msg: &[u8]) -> Result<Signature<D>, signature::Error> {
        self.sign(msg).map_err(|_| signature::Error::new())
    }
}

impl<D: GmssDigest> signature::Keypair for SigningKey<D> {
    type VerifyingKey = VerifyingKey<D>;

    fn verifying_key(&self) -> Self::VerifyingKey {
        VerifyingKey::from(self)
    }
}

// ---------------------------------------------------------------------------
// VerifyingKey<D>
// ---------------------------------------------------------------------------

/// A GMSS verifying key (public key): the root of the top tree together with
/// the parameters needed to parse signatures.
pub struct VerifyingKey<D: GmssDigest> {
    params: Parameters<D>,
    root: Vec<u8>,
}

impl<D: GmssDigest> Clone for VerifyingKey<D> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            root: self.root.clone(),
        }
    }
}

impl<D: GmssDigest> core::fmt::Debug for VerifyingKey<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("parameters", &self.params)
            .field("root", &self.root)
            .finish()
    }
}

impl<D: GmssDigest> AsRef<[u8]> for VerifyingKey<D> {
    fn as_ref(&self) -> &[u8] {
        &self.root
    }
}

impl<D: GmssDigest> TryFrom<&[u8]> for VerifyingKey<D> {
    type Error = Error;

    /// Parses the self-describing encoding produced by
    /// [`VerifyingKey::to_bytes_with_parameters`].
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let mut r = Reader::new(value);
        let params = Parameters::<D>::decode(&mut r)?;
        let root = r.get_bytes()?;
        r.finish()?;
        Self::new(params, &root)
    }
}

impl<D: GmssDigest> TryFrom<Vec<u8>> for VerifyingKey<D> {
    type Error = Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        VerifyingKey::<D>::try_from(value.as_slice())
    }
}

impl<D: GmssDigest> TryFrom<&Vec<u8>> for VerifyingKey<D> {
    type Error = Error;

    fn try_from(value: &Vec<u8>) -> Result<Self, Self::Error> {
        VerifyingKey::<D>::try_from(value.as_slice())
    }
}

impl<D: GmssDigest> TryFrom<Box<[u8]>> for VerifyingKey<D> {
    type Error = Error;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        VerifyingKey::<D>::try_from(value.as_ref())
    }
}

impl<D: GmssDigest> PartialEq for VerifyingKey<D> {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.root == other.root
    }
}

impl<D: GmssDigest> Eq for VerifyingKey<D> {}

impl<D: GmssDigest> Hash for VerifyingKey<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.params.hash(state);
        self.root.hash(state);
    }
}

#[cfg(feature = "serde")]
impl<D: GmssDigest> serdect::serde::Serialize for VerifyingKey<D> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serdect::serde::Serializer,
    {
        serdect::slice::serialize_hex_lower_or_bin(&self.to_bytes_with_parameters(), serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, D: GmssDigest> serdect::serde::Deserialize<'de> for VerifyingKey<D> {
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: serdect::serde::Deserializer<'de>,
    {
        let bytes = serdect::slice::deserialize_hex_or_bin_vec(deserializer)?;
        Self::try_from(bytes).map_err(serdect::serde::de::Error::custom)
    }
}

impl<D: GmssDigest> VerifyingKey<D> {
    /// Creates a verifying key from its parameters and root hash.
    pub fn new(params: Parameters<D>, root: &[u8]) -> GmssResult<Self> {
        if root.len() != params.digest_size() {
            return Err(Error::InvalidKeyLength {
                expected: params.digest_size(),
                got: root.len(),
            });
        }
        Ok(Self {
            params,
            root: root.to_vec(),
        })
    }

    /// Parses the length-prefixed root produced by
    /// [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(params: Parameters<D>, bytes: &[u8]) -> GmssResult<Self> {
        let mut r = Reader::new(bytes);
        let root = r.get_bytes()?;
        r.finish()?;
        Self::new(params, &root)
    }

    /// Serializes the root as `len ∥ root`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_bytes(&self.root);
        w.into_bytes()
    }

    /// Serializes the parameters followed by the root.
    pub fn to_bytes_with_parameters(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.params.encode(&mut w);
        w.put_bytes(&self.root);
        w.into_bytes()
    }

    /// The root hash of the top tree.
    pub fn root(&self) -> &[u8] {
        &self.root
    }

    /// The parameters signatures are parsed with.
    pub fn parameters(&self) -> &Parameters<D> {
        &self.params
    }

    /// Checks `signature` on `message`.
    ///
    /// Malformed signatures are reported as invalid.
    pub fn verify(&self, message: &[u8], signature: &Signature<D>) -> bool {
        gmss_commons::verify(&self.params, &self.root, message, &signature.bytes).is_ok()
    }
}

impl<D: GmssDigest> From<&SigningKey<D>> for VerifyingKey<D> {
    fn from(sk: &SigningKey<D>) -> Self {
        sk.verifying_key.clone()
    }
}

impl<D: GmssDigest> signature::Verifier<Signature<D>> for VerifyingKey<D> {
    fn verify(&self, msg: &[u8], signature: &Signature<D>) -> Result<(), signature::Error> {
        if VerifyingKey::verify(self, msg, signature) {
            Ok(())
        } else {
            Err(signature::Error::new())
        }
    }
}

// ---------------------------------------------------------------------------
// Signature<D>
// ---------------------------------------------------------------------------

/// A GMSS signature: one leaf index, one-time signature and authentication
/// path per layer, bottom layer first.
pub struct Signature<D: GmssDigest> {
    bytes: Vec<u8>,
    _marker: PhantomData<D>,
}

impl<D: GmssDigest> Clone for Signature<D> {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
            _marker: PhantomData,
        }
    }
}

impl<D: GmssDigest> core::fmt::Debug for Signature<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signature")
            .field("digest", &D::NAME)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl<D: GmssDigest> PartialEq for Signature<D> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl<D: GmssDigest> Eq for Signature<D> {}

impl<D: GmssDigest> Hash for Signature<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl<D: GmssDigest> AsRef<[u8]> for Signature<D> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<D: GmssDigest> TryFrom<&[u8]> for Signature<D> {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Signature::<D>::try_from(value.to_vec())
    }
}

impl<D: GmssDigest> TryFrom<Vec<u8>> for Signature<D> {
    type Error = Error;

    /// The length is only known together with the parameters, so it is
    /// checked during verification.
    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Ok(Signature {
            bytes: value,
            _marker: PhantomData,
        })
    }
}

impl<D: GmssDigest> TryFrom<&Vec<u8>> for Signature<D> {
    type Error = Error;

    fn try_from(value: &Vec<u8>) -> Result<Self, Self::Error> {
        Signature::<D>::try_from(value.as_slice())
    }
}

impl<D: GmssDigest> TryFrom<Box<[u8]>> for Signature<D> {
    type Error = Error;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        Signature::<D>::try_from(value.into_vec())
    }
}

impl<D: GmssDigest> From<Signature<D>> for Vec<u8> {
    fn from(sig: Signature<D>) -> Vec<u8> {
        sig.bytes
    }
}

#[cfg(feature = "serde")]
impl<D: GmssDigest> serdect::serde::Serialize for Signature<D> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serdect::serde::Serializer,
    {
        serdect::slice::serialize_hex_lower_or_bin(&self.bytes, serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, D: GmssDigest> serdect::serde::Deserialize<'de> for Signature<D> {
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: serdect::serde::Deserializer<'de>,
    {
        let bytes = serdect::slice::deserialize_hex_or_bin_vec(deserializer)?;
        Self::try_from(bytes).map_err(serdect::serde::de::Error::custom)
    }
}

impl<D: GmssDigest> signature::SignatureEncoding for Signature<D> {
    type Repr = Vec<u8>;
}

impl<D: GmssDigest> Signature<D> {
    /// The leaf index used on every layer, bottom layer first, or `None` if
    /// the signature does not fit `params`.
    pub fn leaf_indices(&self, params: &Parameters<D>) -> Option<Vec<u32>> {
        gmss_commons::leaf_indices(params, &self.bytes)
    }
}

// ---------------------------------------------------------------------------
// KeyPair<D>
// ---------------------------------------------------------------------------

/// A GMSS key pair containing both signing and verifying keys.
pub struct KeyPair<D: GmssDigest> {
    signing_key: SigningKey<D>,
    verifying_key: VerifyingKey<D>,
}

impl<D: GmssDigest> core::fmt::Debug for KeyPair<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("signing_key", &self.signing_key)
            .field("verifying_key", &self.verifying_key)
            .finish()
    }
}

impl<D: GmssDigest> KeyPair<D> {
    fn from_parts(params: &Parameters<D>, root: Vec<u8>, state: KeyState) -> GmssResult<Self> {
        let signing_key = SigningKey::new(params.clone(), state, &root)?;
        let verifying_key = VerifyingKey::from(&signing_key);
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Generates a random key pair. Builds the first two subtrees of every
    /// layer but the top, so this is far slower than signing.
    pub fn generate<R: rand::CryptoRng>(params: &Parameters<D>, rng: &mut R) -> GmssResult<Self> {
        let (root, state) = gmss_core::generate(params, rng)?;
        Self::from_parts(params, root, state)
    }

    /// Generates a key pair from a deterministic seed.
    /// Seed must be `num_layers * digest_size` bytes, one seed per layer,
    /// top layer first.
    pub fn from_seed(params: &Parameters<D>, seed: &[u8]) -> GmssResult<Self> {
        let n = params.digest_size();
        let expected = params.num_layers() * n;
        if seed.len() != expected {
            return Err(Error::InvalidSeedLength {
                expected,
                got: seed.len(),
            });
        }
        let mut seeds: Vec<Vec<u8>> = seed.chunks(n).map(<[u8]>::to_vec).collect();
        let result = gmss_core::generate_from_seeds(params, &seeds);
        seeds.zeroize();
        let (root, state) = result?;
        Self::from_parts(params, root, state)
    }

    /// Returns a mutable reference to the signing key.
    pub fn signing_key(&mut self) -> &mut SigningKey<D> {
        &mut self.signing_key
    }

    /// Returns a reference to the verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey<D> {
        &self.verifying_key
    }

    /// Splits the pair into its keys.
    pub fn into_parts(self) -> (SigningKey<D>, VerifyingKey<D>) {
        (self.signing_key, self.verifying_key)
    }
}
