/// Errors used throughout this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OID value is not recognized.
    #[error("Invalid OID: 0x{0:08x}")]
    InvalidOid(u32),
    /// The parameter set name is not recognized.
    #[error("Invalid parameter set: {0}")]
    InvalidParameterSet(String),
    /// The number of layers is outside the supported range.
    #[error("Invalid parameters: unsupported number of layers {0}")]
    InvalidLayerCount(usize),
    /// The per-layer parameter arrays do not have the same length.
    #[error(
        "Invalid parameters: {heights} heights, {winternitz} Winternitz parameters and {retain} retain parameters"
    )]
    LayerCountMismatch {
        /// Number of tree heights.
        heights: usize,
        /// Number of Winternitz parameters.
        winternitz: usize,
        /// Number of retain parameters.
        retain: usize,
    },
    /// A tree height is outside the supported range.
    #[error("Invalid parameters: unsupported height {height} on layer {layer}")]
    InvalidHeight {
        /// Layer index, 0 being the top layer.
        layer: usize,
        /// The rejected height.
        height: u32,
    },
    /// A Winternitz parameter is outside the supported range.
    #[error("Invalid parameters: unsupported Winternitz parameter w={w} on layer {layer}")]
    InvalidWinternitz {
        /// Layer index, 0 being the top layer.
        layer: usize,
        /// The rejected Winternitz parameter.
        w: u32,
    },
    /// A retain parameter does not fit the tree height of its layer.
    #[error("Invalid parameters: retain parameter k={k} does not fit height {height} on layer {layer}")]
    InvalidRetain {
        /// Layer index, 0 being the top layer.
        layer: usize,
        /// The rejected retain parameter.
        k: u32,
        /// Height of the layer.
        height: u32,
    },
    /// The encoded digest does not match the digest the key is typed with.
    #[error("Unsupported digest: expected id {expected}, got {got}")]
    UnsupportedDigest {
        /// Identifier of the digest in use.
        expected: u8,
        /// Identifier found in the encoding.
        got: u8,
    },
    /// The encoded PRNG identifier is unknown.
    #[error("Unsupported PRNG: id {0}")]
    UnsupportedPrng(u8),
    /// All one-time signatures have been used.
    #[error("Key exhausted: all one-time signatures have been used")]
    KeyExhausted,
    /// The provided seed has an incorrect length.
    #[error("Invalid seed length: expected {expected}, got {got}")]
    InvalidSeedLength {
        /// Expected seed length in bytes.
        expected: usize,
        /// Actual seed length in bytes.
        got: usize,
    },
    /// The provided key has an incorrect length.
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength {
        /// Expected key length in bytes.
        expected: usize,
        /// Actual key length in bytes.
        got: usize,
    },
    /// The provided signature has an incorrect length.
    #[error("Invalid signature length: expected {expected}, got {got}")]
    InvalidSignatureLength {
        /// Expected signature length in bytes.
        expected: usize,
        /// Actual signature length in bytes.
        got: usize,
    },
    /// The encoding ended before a field could be read.
    #[error("Malformed encoding: needed {needed} more bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the next field requires.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },
    /// The encoding has bytes left after its last field.
    #[error("Malformed encoding: {0} trailing bytes")]
    TrailingBytes(usize),
    /// A decoded field is inconsistent with the parameters.
    #[error("Malformed encoding: {0}")]
    Malformed(&'static str),
    /// The private key state is internally inconsistent.
    #[error("Invalid private key state: {0}")]
    InvalidState(&'static str),
    /// Signature verification failed.
    #[error("Signature verification failed")]
    VerificationFailed,
}

/// Result type used by this crate.
pub type GmssResult<T> = Result<T, Error>;
