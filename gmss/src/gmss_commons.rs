use subtle::ConstantTimeEq;

use crate::error::{Error, GmssResult};
use crate::hash::{GmssDigest, hash_nodes};
use crate::params::Parameters;
use crate::utils::Reader;

/// Climbs from `leaf` at position `index` to the root of its subtree using
/// the siblings in `auth_path`, lowest first.
pub(crate) fn compute_root<'a, D: GmssDigest>(
    leaf: Vec<u8>,
    index: u32,
    height: u32,
    auth_path: impl IntoIterator<Item = &'a [u8]>,
) -> Vec<u8> {
    // heap numbering: the root is 1, the leaves start at 2^height
    let mut position = u64::from(index) + (1u64 << height);
    let mut node = leaf;
    for sibling in auth_path {
        node = if position % 2 == 0 {
            hash_nodes::<D>(&node, sibling)
        } else {
            hash_nodes::<D>(sibling, &node)
        };
        position >>= 1;
    }
    node
}

/// Recomputes the top-layer root a signature commits to.
///
/// Each layer's one-time signature is verified against the message of the
/// layer below (the signed message itself for the bottom layer), and the
/// subtree root it leads to becomes the message of the layer above.
pub(crate) fn recover_root<D: GmssDigest>(
    params: &Parameters<D>,
    message: &[u8],
    signature: &[u8],
) -> GmssResult<Vec<u8>> {
    if signature.len() != params.signature_len() {
        return Err(Error::InvalidSignatureLength {
            expected: params.signature_len(),
            got: signature.len(),
        });
    }
    let n = params.digest_size();
    let mut r = Reader::new(signature);
    let mut node = message.to_vec();
    for layer in (0..params.num_layers()).rev() {
        let index = r.get_u32()?;
        if index >= params.leaves(layer) {
            return Err(Error::Malformed("leaf index out of range"));
        }
        let ots = params.ots(layer);
        let leaf = ots.recover(&node, r.take(ots.signature_len())?)?;
        let height = params.height(layer);
        let auth_path = r.take(height as usize * n)?;
        node = compute_root::<D>(leaf, index, height, auth_path.chunks(n));
    }
    r.finish()?;
    Ok(node)
}

/// Verifies `signature` on `message` against the public `root`.
pub(crate) fn verify<D: GmssDigest>(
    params: &Parameters<D>,
    root: &[u8],
    message: &[u8],
    signature: &[u8],
) -> GmssResult<()> {
    let candidate = recover_root(params, message, signature)?;
    if !bool::from(candidate.as_slice().ct_eq(root)) {
        return Err(Error::VerificationFailed);
    }
    Ok(())
}

/// Reads the leaf index of every layer, bottom layer first.
pub(crate) fn leaf_indices<D: GmssDigest>(params: &Parameters<D>, signature: &[u8]) -> Option<Vec<u32>> {
    if signature.len() != params.signature_len() {
        return None;
    }
    let mut offset = 0;
    let mut indices = Vec::with_capacity(params.num_layers());
    for layer in (0..params.num_layers()).rev() {
        let bytes = signature.get(offset..offset + 4)?;
        indices.push(u32::from_be_bytes(bytes.try_into().ok()?));
        offset += params.layer_signature_len(layer);
    }
    Some(indices)
}
