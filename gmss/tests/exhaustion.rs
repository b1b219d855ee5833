//! Every one-time leaf is used exactly once, then the key refuses to sign.

use gmss::{Error, KeyPair, ParameterSet, Parameters};
use sha2::Sha256;

#[test]
fn test_gmss10_exhaustion() {
    let params = ParameterSet::Gmss10.parameters::<Sha256>();
    let mut kp = KeyPair::generate(&params, &mut rand::rng()).unwrap();

    for i in 0..1024u32 {
        let msg = i.to_be_bytes();
        let sig = kp.signing_key().sign(&msg).unwrap();
        assert_eq!(sig.leaf_indices(&params), Some(vec![i]));
        assert!(kp.verifying_key().verify(&msg, &sig));
    }

    assert!(kp.signing_key().is_exhausted());
    assert!(matches!(kp.signing_key().sign(b"one more"), Err(Error::KeyExhausted)));
    // still exhausted after the failed attempt
    assert!(matches!(kp.signing_key().sign(b"one more"), Err(Error::KeyExhausted)));
}

#[test]
fn test_three_layer_exhaustion() {
    let params = Parameters::<Sha256>::new(&[4, 4, 4], &[2, 2, 2], &[2, 2, 2]).unwrap();
    let seed: Vec<u8> = (0..96).map(|i| i as u8).collect();
    let mut kp = KeyPair::from_seed(&params, &seed).unwrap();
    assert_eq!(kp.signing_key().signatures_remaining(), 4096);

    for i in 0..4096u32 {
        let msg = i.to_le_bytes();
        let sig = kp.signing_key().sign(&msg).unwrap();
        assert_eq!(
            sig.leaf_indices(&params),
            Some(vec![i % 16, (i / 16) % 16, i / 256]),
        );
        assert!(kp.verifying_key().verify(&msg, &sig), "signature {i}");
        assert_eq!(kp.signing_key().signatures_remaining(), u128::from(4095 - i));
    }

    assert!(matches!(kp.signing_key().sign(b"one more"), Err(Error::KeyExhausted)));
}
