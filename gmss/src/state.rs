use zeroize::Zeroize;

use crate::error::{Error, GmssResult};
use crate::hash::GmssDigest;
use crate::leaf::LeafCalc;
use crate::params::Parameters;
use crate::root_calc::{RootCalc, Subtree};
use crate::root_sig::RootSig;
use crate::treehash::{StackNode, Treehash};
use crate::utils::{Reader, Writer, expect_len};

/// Mutable state behind a signing key.
///
/// Per-layer vectors are indexed by layer, 0 being the top. Vectors that
/// only exist for layers that rotate (every layer but the top) are indexed
/// by `layer - 1`; the generators a child layer runs on behalf of its parent
/// use the same slot. `next_next_leaf` serves the layers strictly between
/// the top and the bottom and is indexed by `layer - 1` as well.
pub(crate) struct KeyState {
    pub(crate) index: Vec<u32>,
    pub(crate) current_seed: Vec<Vec<u8>>,
    pub(crate) next_next_seed: Vec<Vec<u8>>,
    pub(crate) current: Vec<Subtree>,
    pub(crate) next: Vec<Subtree>,
    pub(crate) keep: Vec<Vec<Vec<u8>>>,
    pub(crate) next_root: Vec<Vec<u8>>,
    pub(crate) current_root_sig: Vec<Vec<u8>>,
    pub(crate) next_root_sig: Vec<RootSig>,
    pub(crate) next_next_root: Vec<RootCalc>,
    pub(crate) upper_leaf: Vec<LeafCalc>,
    pub(crate) upper_treehash_leaf: Vec<LeafCalc>,
    pub(crate) min_treehash: Vec<Option<u32>>,
    pub(crate) next_next_leaf: Vec<LeafCalc>,
    pub(crate) is_used: bool,
}

impl KeyState {
    pub(crate) fn encode<D: GmssDigest>(&self, params: &Parameters<D>, w: &mut Writer) {
        w.put_u32s(&self.index);
        params.encode(w);
        w.put_nodes(&self.current_seed);
        w.put_nodes(&self.next_next_seed);
        w.put_seq(&self.current, |w, tree| tree.encode_auth_path(w));
        w.put_seq(&self.next, |w, tree| tree.encode_auth_path(w));
        w.put_seq(&self.keep, |w, keep| w.put_nodes(keep));
        w.put_seq(&self.current, |w, tree| tree.encode_treehash(w));
        w.put_seq(&self.next, |w, tree| tree.encode_treehash(w));
        w.put_seq(&self.current, |w, tree| tree.encode_stack(w));
        w.put_seq(&self.next, |w, tree| tree.encode_stack(w));
        w.put_seq(&self.current, |w, tree| tree.encode_retain(w));
        w.put_seq(&self.next, |w, tree| tree.encode_retain(w));
        w.put_nodes(&self.next_root);
        w.put_seq(&self.current_root_sig, |w, sig| w.put_bytes(sig));

        w.put_seq(&self.next_root_sig, |w, sig| sig.encode(w));
        w.put_seq(&self.next_next_root, |w, calc| calc.encode(w));
        w.put_seq(&self.upper_leaf, |w, calc| calc.encode(w));
        w.put_seq(&self.upper_treehash_leaf, |w, calc| calc.encode(w));
        w.put_seq(&self.min_treehash, |w, target| {
            w.put_bool(target.is_some());
            w.put_u32(target.unwrap_or(0));
        });
        w.put_seq(&self.next_next_leaf, |w, calc| calc.encode(w));
        w.put_bool(self.is_used);
    }

    /// Decodes the state together with the parameters embedded in it,
    /// checking every field against those parameters.
    pub(crate) fn decode<D: GmssDigest>(r: &mut Reader<'_>) -> GmssResult<(Parameters<D>, Self)> {
        let index = r.get_u32s()?;
        let params = Parameters::<D>::decode(r)?;
        let layers = params.num_layers();
        let rotating = layers - 1;
        let middle = layers.saturating_sub(2);
        let n = params.digest_size();

        expect_len(index.len(), layers, "leaf index count")?;
        for (layer, &i) in index.iter().enumerate() {
            if i >= params.leaves(layer) {
                return Err(Error::Malformed("leaf index out of range"));
            }
        }

        let current_seed = r.get_nodes(n)?;
        expect_len(current_seed.len(), layers, "current seed count")?;
        let next_next_seed = r.get_nodes(n)?;
        expect_len(next_next_seed.len(), rotating, "next-next seed count")?;

        let current_auth = per_layer(r, layers, |r, layer| {
            Subtree::decode_auth_path(r, params.height(layer), n)
        })?;
        let next_auth = per_layer(r, rotating, |r, i| {
            Subtree::decode_auth_path(r, params.height(i + 1), n)
        })?;
        let keep = per_layer(r, layers, |r, layer| {
            let keep = r.get_nodes(n)?;
            expect_len(keep.len(), (params.height(layer) - 1) as usize, "keep length")?;
            Ok(keep)
        })?;
        let current_treehash = per_layer(r, layers, |r, layer| {
            Subtree::decode_treehash(r, params.height(layer), params.k(layer), n)
        })?;
        let next_treehash = per_layer(r, rotating, |r, i| {
            Subtree::decode_treehash(r, params.height(i + 1), params.k(i + 1), n)
        })?;
        let current_stack = per_layer(r, layers, |r, layer| {
            Subtree::decode_stack(r, params.height(layer), n)
        })?;
        let next_stack = per_layer(r, rotating, |r, i| {
            Subtree::decode_stack(r, params.height(i + 1), n)
        })?;
        let current_retain = per_layer(r, layers, |r, layer| {
            Subtree::decode_retain(r, params.k(layer), n)
        })?;
        let next_retain = per_layer(r, rotating, |r, i| Subtree::decode_retain(r, params.k(i + 1), n))?;

        let next_root = r.get_nodes(n)?;
        expect_len(next_root.len(), rotating, "next root count")?;
        let current_root_sig = per_layer(r, rotating, |r, i| {
            let sig = r.get_bytes()?;
            expect_len(sig.len(), params.ots(i).signature_len(), "root signature length")?;
            Ok(sig)
        })?;

        let next_root_sig = per_layer(r, rotating, |r, i| RootSig::decode::<D>(r, params.w(i), n))?;
        let next_next_root = per_layer(r, rotating, |r, i| {
            RootCalc::decode(r, params.height(i + 1), params.k(i + 1), n)
        })?;
        let upper_leaf = per_layer(r, rotating, |r, i| LeafCalc::decode::<D>(r, params.w(i), n))?;
        let upper_treehash_leaf =
            per_layer(r, rotating, |r, i| LeafCalc::decode::<D>(r, params.w(i), n))?;
        let min_treehash = per_layer(r, rotating, |r, i| {
            let present = r.get_bool()?;
            let target = r.get_u32()?;
            if !present {
                return Ok(None);
            }
            if target >= params.height(i) - params.k(i) {
                return Err(Error::Malformed("treehash target out of range"));
            }
            Ok(Some(target))
        })?;
        let next_next_leaf =
            per_layer(r, middle, |r, i| LeafCalc::decode::<D>(r, params.w(i + 1), n))?;
        let is_used = r.get_bool()?;

        let current = assemble(current_auth, current_treehash, current_stack, current_retain);
        let next = assemble(next_auth, next_treehash, next_stack, next_retain);

        let state = Self {
            index,
            current_seed,
            next_next_seed,
            current,
            next,
            keep,
            next_root,
            current_root_sig,
            next_root_sig,
            next_next_root,
            upper_leaf,
            upper_treehash_leaf,
            min_treehash,
            next_next_leaf,
            is_used,
        };
        Ok((params, state))
    }
}

impl Zeroize for KeyState {
    fn zeroize(&mut self) {
        self.index.zeroize();
        self.current_seed.zeroize();
        self.next_next_seed.zeroize();
        self.current.zeroize();
        self.next.zeroize();
        self.keep.zeroize();
        self.next_root.zeroize();
        self.current_root_sig.zeroize();
        self.next_root_sig.zeroize();
        self.next_next_root.zeroize();
        self.upper_leaf.zeroize();
        self.upper_treehash_leaf.zeroize();
        self.min_treehash.zeroize();
        self.next_next_leaf.zeroize();
        self.is_used.zeroize();
    }
}

/// Reads an array that must hold exactly `count` entries.
fn per_layer<T>(
    r: &mut Reader<'_>,
    count: usize,
    mut f: impl FnMut(&mut Reader<'_>, usize) -> GmssResult<T>,
) -> GmssResult<Vec<T>> {
    let len = r.get_len(1)?;
    expect_len(len, count, "per-layer array length")?;
    (0..len).map(|i| f(r, i)).collect()
}

fn assemble(
    auth: Vec<Vec<Vec<u8>>>,
    treehash: Vec<Vec<Treehash>>,
    stack: Vec<Vec<StackNode>>,
    retain: Vec<Vec<Vec<Vec<u8>>>>,
) -> Vec<Subtree> {
    auth.into_iter()
        .zip(treehash)
        .zip(stack)
        .zip(retain)
        .map(|(((auth_path, treehash), stack), retain)| Subtree {
            auth_path,
            treehash,
            stack,
            retain,
        })
        .collect()
}
