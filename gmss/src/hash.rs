use digest::Digest;
use sha2::{Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};

/// A message digest usable by GMSS for tree nodes, Winternitz chains and
/// seed expansion.
///
/// Every digest carries a one-byte identifier that is written into the
/// serialized parameters, so a key encoded for one digest can't be decoded
/// as a key for another.
pub trait GmssDigest: Digest + 'static {
    /// Identifier stored in encoded parameters.
    const ID: u8;
    /// Human-readable digest name.
    const NAME: &'static str;
}

macro_rules! impl_gmss_digest {
    ($ty:ty, $id:expr, $name:expr) => {
        impl GmssDigest for $ty {
            const ID: u8 = $id;
            const NAME: &'static str = $name;
        }
    };
}

impl_gmss_digest!(Sha256, 1, "SHA-256");
impl_gmss_digest!(Sha384, 2, "SHA-384");
impl_gmss_digest!(Sha512, 3, "SHA-512");
impl_gmss_digest!(Sha3_256, 4, "SHA3-256");
impl_gmss_digest!(Sha3_512, 5, "SHA3-512");

/// Output size of `D` in bytes.
pub(crate) fn digest_size<D: GmssDigest>() -> usize {
    <D as Digest>::output_size()
}

/// Computes `H(input)`.
pub(crate) fn hash<D: GmssDigest>(input: &[u8]) -> Vec<u8> {
    D::digest(input).to_vec()
}

/// Replaces `value` with `H(value)`, `steps` times.
pub(crate) fn hash_chain<D: GmssDigest>(value: &mut [u8], steps: u32) {
    for _ in 0..steps {
        let next = D::digest(&*value);
        value.copy_from_slice(&next);
    }
}

/// Computes the parent node `H(left || right)`.
pub(crate) fn hash_nodes<D: GmssDigest>(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    Digest::update(&mut hasher, left);
    Digest::update(&mut hasher, right);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_nodes_is_hash_of_concatenation() {
        let left = [0x11u8; 32];
        let right = [0x22u8; 32];
        let mut joined = left.to_vec();
        joined.extend_from_slice(&right);
        assert_eq!(hash_nodes::<Sha256>(&left, &right), hash::<Sha256>(&joined));
    }

    #[test]
    fn test_hash_chain_zero_steps() {
        let mut value = [7u8; 64];
        hash_chain::<Sha512>(&mut value, 0);
        assert_eq!(value, [7u8; 64]);
    }

    #[test]
    fn test_hash_chain_two_steps() {
        let mut value = [7u8; 32];
        hash_chain::<Sha3_256>(&mut value, 2);
        let once = hash::<Sha3_256>(&[7u8; 32]);
        assert_eq!(value.to_vec(), hash::<Sha3_256>(&once));
    }

    #[test]
    fn test_digest_sizes() {
        assert_eq!(digest_size::<Sha256>(), 32);
        assert_eq!(digest_size::<Sha384>(), 48);
        assert_eq!(digest_size::<Sha512>(), 64);
        assert_eq!(digest_size::<Sha3_256>(), 32);
        assert_eq!(digest_size::<Sha3_512>(), 64);
    }
}
