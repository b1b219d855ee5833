//! GMSS (Generalized Merkle Signature Scheme) implementation in Rust.
//!
//! A stateful hash-based signature scheme built from a stack of Merkle trees
//! with Winternitz one-time signatures at their leaves. The bottom layer
//! signs messages, every other layer signs the roots of the layer below it.
//! Authentication paths are maintained with the BDS traversal and all work
//! for upcoming subtrees is spread over the signatures of the layer below,
//! so signing time stays flat over the lifetime of a key.
//!
//! ```
//! use gmss::{KeyPair, ParameterSet};
//! use sha2::Sha256;
//!
//! let params = ParameterSet::Gmss10.parameters::<Sha256>();
//! let mut kp = KeyPair::generate(&params, &mut rand::rng()).unwrap();
//!
//! let sig = kp.signing_key().sign(b"hello").unwrap();
//! assert!(kp.verifying_key().verify(b"hello", &sig));
//! ```

mod error;
mod gmss;
mod gmss_commons;
mod gmss_core;
mod hash;
mod leaf;
mod params;
mod prng;
mod root_calc;
mod root_sig;
mod state;
mod treehash;
mod utils;
mod wots;

pub use error::{Error, GmssResult};

pub use hash::GmssDigest;

pub use params::{
    GMSS_OID, MAX_HEIGHT, MAX_LAYERS, MAX_WINTERNITZ, MIN_HEIGHT, MIN_WINTERNITZ, ParameterSet,
    Parameters,
};

pub use gmss::{KeyPair, Signature, SigningKey, VerifyingKey};

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Sha256, Sha384, Sha512};
    use sha3::{Sha3_256, Sha3_512};

    fn small() -> Parameters<Sha256> {
        Parameters::new(&[4, 4], &[2, 2], &[2, 2]).unwrap()
    }

    #[test]
    fn test_gmss10_sha256_sign_verify() {
        let params = ParameterSet::Gmss10.parameters::<Sha256>();
        let mut kp = KeyPair::generate(&params, &mut rand::rng()).unwrap();

        let message = b"test message";
        let sig = kp.signing_key().sign(message).unwrap();
        assert_eq!(sig.as_ref().len(), params.signature_len());
        assert!(kp.verifying_key().verify(message, &sig));
    }

    #[test]
    fn test_gmss20_sha256_sign_verify() {
        let params = ParameterSet::Gmss20.parameters::<Sha256>();
        let mut kp = KeyPair::generate(&params, &mut rand::rng()).unwrap();

        let message = b"test message for two layers";
        let sig = kp.signing_key().sign(message).unwrap();
        assert!(kp.verifying_key().verify(message, &sig));
        assert_eq!(sig.leaf_indices(&params), Some(vec![0, 0]));
    }

    #[test]
    fn test_bad_signature() {
        let mut kp = KeyPair::from_seed(&small(), &[7u8; 64]).unwrap();

        let message = b"test message";
        let sig = kp.signing_key().sign(message).unwrap();

        // Corrupt the bottom one-time signature
        let mut sig_bytes = sig.as_ref().to_vec();
        sig_bytes[10] ^= 0xFF;
        let bad_sig = Signature::<Sha256>::try_from(sig_bytes).unwrap();

        assert!(!kp.verifying_key().verify(message, &bad_sig));
        assert!(!kp.verifying_key().verify(b"other message", &sig));
    }

    #[test]
    fn test_multiple_signatures() {
        let mut kp = KeyPair::from_seed(&small(), &[1u8; 64]).unwrap();

        for i in 0..40 {
            let msg = format!("message {}", i);
            let sig = kp.signing_key().sign(msg.as_bytes()).unwrap();
            assert!(kp.verifying_key().verify(msg.as_bytes(), &sig));
            assert_eq!(sig.leaf_indices(&small()), Some(vec![i % 16, i / 16]));
        }
    }

    #[test]
    fn test_verify_truncated_signature() {
        let mut kp = KeyPair::from_seed(&small(), &[2u8; 64]).unwrap();

        let sig = kp.signing_key().sign(b"test message").unwrap();

        // Truncate the signature to be too short
        let short_bytes = &sig.as_ref()[..sig.as_ref().len() / 2];
        let short_sig = Signature::<Sha256>::try_from(short_bytes).unwrap();

        assert!(!kp.verifying_key().verify(b"test message", &short_sig));
        assert_eq!(short_sig.leaf_indices(&small()), None);
    }

    #[test]
    fn test_key_exhaustion() {
        let params = Parameters::<Sha256>::new(&[4], &[2], &[2]).unwrap();
        let mut kp = KeyPair::from_seed(&params, &[3u8; 32]).unwrap();

        for i in 0..16u128 {
            assert_eq!(kp.signing_key().signatures_remaining(), 16 - i);
            let sig = kp.signing_key().sign(b"message").unwrap();
            assert!(kp.verifying_key().verify(b"message", &sig));
        }
        assert!(kp.signing_key().is_exhausted());
        assert_eq!(kp.signing_key().signatures_remaining(), 0);

        // Signing again should fail with KeyExhausted.
        let result = kp.signing_key().sign(b"one more");
        assert!(matches!(result, Err(Error::KeyExhausted)));
    }

    #[test]
    fn test_deterministic_keygen() {
        let seed: Vec<u8> = (0u8..64).collect();

        let kp1 = KeyPair::from_seed(&small(), &seed).unwrap();
        let mut kp2 = KeyPair::from_seed(&small(), &seed).unwrap();

        // Same seed must produce identical keys.
        assert_eq!(kp1.verifying_key(), kp2.verifying_key());

        // Sign with one, verify with the other's public key.
        let sig = kp2.signing_key().sign(b"deterministic test").unwrap();
        assert!(kp1.verifying_key().verify(b"deterministic test", &sig));
    }

    #[test]
    fn test_wrong_seed_length() {
        assert!(matches!(
            KeyPair::from_seed(&small(), &[0u8; 63]),
            Err(Error::InvalidSeedLength { expected: 64, got: 63 })
        ));
    }

    #[test]
    fn test_verifying_key_from_signing_key() {
        use signature::Keypair;

        let mut kp = KeyPair::from_seed(&small(), &[4u8; 64]).unwrap();

        // Derive verifying key from signing key.
        let derived_pk = kp.signing_key().verifying_key();
        assert_eq!(kp.verifying_key(), &derived_pk);
    }

    #[test]
    fn test_signer_verifier_traits() {
        use signature::{SignerMut, Verifier};

        let (mut sk, pk) = KeyPair::from_seed(&small(), &[5u8; 64]).unwrap().into_parts();
        let sig: Signature<Sha256> = sk.try_sign(b"trait message").unwrap();
        assert!(pk.verify(b"trait message", &sig));
        assert!(Verifier::verify(&pk, b"trait message", &sig).is_ok());
        assert!(Verifier::verify(&pk, b"other message", &sig).is_err());
    }

    #[test]
    fn test_other_digests() {
        fn check<D: GmssDigest>() {
            let params = Parameters::<D>::new(&[4], &[4], &[2]).unwrap();
            let seed = vec![9u8; params.digest_size()];
            let mut kp = KeyPair::from_seed(&params, &seed).unwrap();
            let sig = kp.signing_key().sign(D::NAME.as_bytes()).unwrap();
            assert_eq!(sig.as_ref().len(), params.signature_len());
            assert!(kp.verifying_key().verify(D::NAME.as_bytes(), &sig));
        }
        check::<Sha384>();
        check::<Sha512>();
        check::<Sha3_256>();
        check::<Sha3_512>();
    }

    #[test]
    fn test_signing_key_roundtrip_continues() {
        let mut kp = KeyPair::from_seed(&small(), &[6u8; 64]).unwrap();
        for _ in 0..21 {
            kp.signing_key().sign(b"warm up").unwrap();
        }

        let bytes = kp.signing_key().to_bytes();
        let mut restored = SigningKey::<Sha256>::try_from(bytes.as_slice()).unwrap();
        assert!(*kp.signing_key() == restored);

        for i in 0..20 {
            let msg = [i as u8; 8];
            let expected = kp.signing_key().sign(&msg).unwrap();
            assert_eq!(restored.sign(&msg).unwrap(), expected);
        }
    }

    #[test]
    fn test_signing_key_rejects_trailing_bytes() {
        let mut kp = KeyPair::from_seed(&small(), &[8u8; 64]).unwrap();
        let mut bytes = kp.signing_key().to_bytes();
        bytes.push(0);
        assert!(matches!(
            SigningKey::<Sha256>::try_from(bytes),
            Err(Error::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_signing_key_debug_is_redacted() {
        let mut kp = KeyPair::from_seed(&small(), &[8u8; 64]).unwrap();
        let debug = format!("{:?}", kp.signing_key());
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_verifying_key_encodings() {
        let kp = KeyPair::from_seed(&small(), &[10u8; 64]).unwrap();
        let pk = kp.verifying_key();

        let bytes = pk.to_bytes();
        assert_eq!(bytes.len(), 4 + 32);
        assert_eq!(&VerifyingKey::from_bytes(small(), &bytes).unwrap(), pk);

        let full = pk.to_bytes_with_parameters();
        assert_eq!(&VerifyingKey::<Sha256>::try_from(full.as_slice()).unwrap(), pk);
        assert!(VerifyingKey::<Sha512>::try_from(full.as_slice()).is_err());
    }

    #[cfg(feature = "serde")]
    mod serde_tests {
        use super::*;

        #[test]
        fn test_signing_key_serde_json_roundtrip() {
            let mut kp = KeyPair::from_seed(&small(), &[11u8; 64]).unwrap();
            let sk = kp.signing_key();

            let json = serde_json::to_string(&*sk).unwrap();
            let sk2: SigningKey<Sha256> = serde_json::from_str(&json).unwrap();
            assert_eq!(*sk, sk2);
        }

        #[test]
        fn test_verifying_key_serde_json_roundtrip() {
            let kp = KeyPair::from_seed(&small(), &[11u8; 64]).unwrap();
            let pk = kp.verifying_key();

            let json = serde_json::to_string(pk).unwrap();
            let pk2: VerifyingKey<Sha256> = serde_json::from_str(&json).unwrap();
            assert_eq!(*pk, pk2);
        }

        #[test]
        fn test_signature_serde_json_roundtrip() {
            let mut kp = KeyPair::from_seed(&small(), &[11u8; 64]).unwrap();
            let sig = kp.signing_key().sign(b"test message").unwrap();

            let json = serde_json::to_string(&sig).unwrap();
            let sig2: Signature<Sha256> = serde_json::from_str(&json).unwrap();
            assert_eq!(sig, sig2);
        }

        #[test]
        fn test_signing_key_postcard_roundtrip() {
            let mut kp = KeyPair::from_seed(&small(), &[12u8; 64]).unwrap();
            let sk = kp.signing_key();

            let bytes = postcard::to_allocvec(&*sk).unwrap();
            let sk2: SigningKey<Sha256> = postcard::from_bytes(&bytes).unwrap();
            assert_eq!(*sk, sk2);
        }

        #[test]
        fn test_verifying_key_postcard_roundtrip() {
            let kp = KeyPair::from_seed(&small(), &[12u8; 64]).unwrap();
            let pk = kp.verifying_key();

            let bytes = postcard::to_allocvec(pk).unwrap();
            let pk2: VerifyingKey<Sha256> = postcard::from_bytes(&bytes).unwrap();
            assert_eq!(*pk, pk2);
        }

        #[test]
        fn test_signature_postcard_roundtrip() {
            let mut kp = KeyPair::from_seed(&small(), &[12u8; 64]).unwrap();
            let sig = kp.signing_key().sign(b"test message").unwrap();

            let bytes = postcard::to_allocvec(&sig).unwrap();
            let sig2: Signature<Sha256> = postcard::from_bytes(&bytes).unwrap();
            assert_eq!(sig, sig2);
        }
    }
}
