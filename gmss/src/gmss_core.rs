//! Key generation and the per-signature state update.
//!
//! Every layer walks its leaves in order. Before each step the bottom layer
//! spends a fixed number of leaf computations on its treehash instances;
//! every other layer has its upcoming work (the next root signature, the
//! next leaf it will authenticate, its treehash leaves and the leaves of the
//! subtree after next) spread in small slices over the steps of the layer
//! below it, so no single signature pays for a whole subtree.

use core::mem;

use zeroize::Zeroize;

use crate::error::{Error, GmssResult};
use crate::hash::{GmssDigest, hash_nodes};
use crate::leaf::{LeafCalc, spread};
use crate::params::Parameters;
use crate::prng::DigestPrng;
use crate::root_calc::{RootCalc, Subtree};
use crate::root_sig::RootSig;
use crate::state::KeyState;
use crate::treehash::min_treehash;
use crate::wots::{leaf_from_seed, ots_seed_of};

/// Generates a key from one random seed per layer.
///
/// Returns the public root and the initial private state.
pub(crate) fn generate<D: GmssDigest, R: rand::CryptoRng>(
    params: &Parameters<D>,
    rng: &mut R,
) -> GmssResult<(Vec<u8>, KeyState)> {
    let n = params.digest_size();
    let mut seeds: Vec<Vec<u8>> = (0..params.num_layers())
        .map(|_| {
            let mut seed = vec![0u8; n];
            rng.fill_bytes(&mut seed);
            seed
        })
        .collect();
    let result = generate_from_seeds(params, &seeds);
    seeds.zeroize();
    result
}

/// Generates a key deterministically from `seeds`, one `n`-byte seed per
/// layer, top layer first.
pub(crate) fn generate_from_seeds<D: GmssDigest>(
    params: &Parameters<D>,
    seeds: &[Vec<u8>],
) -> GmssResult<(Vec<u8>, KeyState)> {
    let layers = params.num_layers();
    let n = params.digest_size();
    if seeds.len() != layers {
        return Err(Error::InvalidSeedLength {
            expected: layers * n,
            got: seeds.iter().map(Vec::len).sum(),
        });
    }
    if let Some(seed) = seeds.iter().find(|seed| seed.len() != n) {
        return Err(Error::InvalidSeedLength {
            expected: n,
            got: seed.len(),
        });
    }

    let mut current = Vec::with_capacity(layers);
    let mut next = Vec::with_capacity(layers - 1);
    let mut next_root = Vec::with_capacity(layers - 1);
    let mut next_next_seed = Vec::with_capacity(layers - 1);
    let mut current_root_sig = Vec::with_capacity(layers - 1);
    let mut lower_root: Option<Vec<u8>> = None;

    for layer in (0..layers).rev() {
        let mut seed = seeds[layer].clone();
        let (tree, root) = build_subtree(params, layer, &mut seed)?;
        current.push(tree);

        if let Some(lower_root) = lower_root.take() {
            let mut ots_seed = ots_seed_of::<D>(&seeds[layer]);
            current_root_sig.push(params.ots(layer).sign(&ots_seed, &lower_root));
            ots_seed.zeroize();
        }

        if layer > 0 {
            let (tree, root) = build_subtree(params, layer, &mut seed)?;
            next.push(tree);
            next_root.push(root);
            next_next_seed.push(seed);
        } else {
            seed.zeroize();
        }
        lower_root = Some(root);
    }
    let public_root = lower_root.ok_or(Error::InvalidState("no layers"))?;

    current.reverse();
    next.reverse();
    next_root.reverse();
    next_next_seed.reverse();
    current_root_sig.reverse();

    let mut state = KeyState {
        index: vec![0; layers],
        current_seed: seeds.to_vec(),
        next_next_seed,
        current,
        next,
        keep: (0..layers)
            .map(|layer| vec![vec![0u8; n]; (params.height(layer) - 1) as usize])
            .collect(),
        next_root,
        current_root_sig,
        next_root_sig: vec![RootSig::default(); layers - 1],
        next_next_root: (1..layers)
            .map(|layer| RootCalc::new(params.height(layer), params.k(layer)))
            .collect(),
        upper_leaf: vec![LeafCalc::idle(); layers - 1],
        upper_treehash_leaf: vec![LeafCalc::idle(); layers - 1],
        min_treehash: vec![None; layers - 1],
        next_next_leaf: vec![LeafCalc::idle(); layers.saturating_sub(2)],
        is_used: false,
    };
    for child in 1..layers {
        restart_pipelines(params, &mut state, child);
    }
    for layer in 1..layers.saturating_sub(1) {
        restart_next_next_leaf(params, &mut state, layer);
    }
    Ok((public_root, state))
}

/// Builds a whole subtree of `layer` starting at seed state `seed`, leaving
/// `seed` at the state of the leaf after it.
fn build_subtree<D: GmssDigest>(
    params: &Parameters<D>,
    layer: usize,
    seed: &mut [u8],
) -> GmssResult<(Subtree, Vec<u8>)> {
    let ots = params.ots(layer);
    let mut calc = RootCalc::new(params.height(layer), params.k(layer));
    for _ in 0..params.leaves(layer) {
        let leaf = leaf_from_seed(&ots, seed);
        calc.update::<D>(seed, leaf);
        DigestPrng::<D>::skip(seed, 1);
    }
    calc.into_parts()
}

/// Signs `message` and moves the state on to the next leaf.
///
/// Any failure while updating the state marks the key as used.
pub(crate) fn sign<D: GmssDigest>(
    params: &Parameters<D>,
    state: &mut KeyState,
    message: &[u8],
) -> GmssResult<Vec<u8>> {
    if state.is_used {
        return Err(Error::KeyExhausted);
    }
    let bottom = params.num_layers() - 1;
    let ots = params.ots(bottom);
    let mut ots_seed = ots_seed_of::<D>(&state.current_seed[bottom]);
    let ots_sig = ots.sign(&ots_seed, message);
    ots_seed.zeroize();

    let mut signature = Vec::with_capacity(params.signature_len());
    for layer in (0..=bottom).rev() {
        signature.extend_from_slice(&state.index[layer].to_be_bytes());
        if layer == bottom {
            signature.extend_from_slice(&ots_sig);
        } else {
            signature.extend_from_slice(&state.current_root_sig[layer]);
        }
        for node in &state.current[layer].auth_path {
            signature.extend_from_slice(node);
        }
    }

    // Left leaves become authentication nodes, so keep the value the
    // signature already yields.
    let used_leaf = if state.index[bottom] % 2 == 0 {
        Some(ots.recover(message, &ots_sig)?)
    } else {
        None
    };
    if let Err(err) = advance(params, state, bottom, used_leaf) {
        state.is_used = true;
        return Err(err);
    }
    Ok(signature)
}

/// Moves `layer` past its active leaf, rotating in the next subtree when
/// the active one is used up.
fn advance<D: GmssDigest>(
    params: &Parameters<D>,
    state: &mut KeyState,
    layer: usize,
    used_leaf: Option<Vec<u8>>,
) -> GmssResult<()> {
    let index = state.index[layer];
    if index + 1 == params.leaves(layer) {
        if layer == 0 {
            state.is_used = true;
            return Ok(());
        }
        return rotate(params, state, layer);
    }

    next_auth_path(params, state, layer, index, used_leaf)?;
    if layer == params.num_layers() - 1 {
        update_treehash(params, state, layer);
    }
    DigestPrng::<D>::skip(&mut state.current_seed[layer], 1);
    state.index[layer] = index + 1;

    if layer > 0 {
        pipeline_step(params, state, layer);
        feed_next_next(params, state, layer);
    }
    Ok(())
}

/// Turns the authentication path of leaf `s` into the one of leaf `s + 1`.
fn next_auth_path<D: GmssDigest>(
    params: &Parameters<D>,
    state: &mut KeyState,
    layer: usize,
    s: u32,
    used_leaf: Option<Vec<u8>>,
) -> GmssResult<()> {
    let height = params.height(layer);
    let lower = height - params.k(layer);
    let tree = &mut state.current[layer];
    let keep = &mut state.keep[layer];

    for th in tree.treehash.iter_mut() {
        th.advance_seed_next::<D>();
    }

    // height of the first parent of leaf s that is a left node
    let tau = s.trailing_ones();
    let t = tau as usize;
    let pair = (tau > 0).then(|| (tree.auth_path[t - 1].clone(), keep[t - 1].clone()));
    if (s >> (tau + 1)) & 1 == 0 && tau + 1 < height {
        keep[t].clone_from(&tree.auth_path[t]);
    }

    let Some((left, right)) = pair else {
        tree.auth_path[0] = match used_leaf {
            Some(leaf) => leaf,
            None => leaf_from_seed(&params.ots(layer), &state.current_seed[layer]),
        };
        return Ok(());
    };

    tree.auth_path[t] = hash_nodes::<D>(&left, &right);
    for h in 0..tau {
        let node = if h < lower {
            tree.treehash[h as usize]
                .first_node()
                .ok_or(Error::InvalidState("treehash node not ready"))?
                .to_vec()
        } else {
            tree.retain[(h - lower) as usize]
                .pop()
                .ok_or(Error::InvalidState("retain stack exhausted"))?
        };
        tree.auth_path[h as usize] = node;
    }

    let leaves = u64::from(params.leaves(layer));
    for h in 0..tau.min(lower) {
        let start = u64::from(s) + 1 + 3 * (1u64 << h);
        let th = &mut tree.treehash[h as usize];
        if start < leaves {
            // start < 2^31
            #[allow(clippy::cast_possible_truncation)]
            th.initialize(start as u32);
        } else {
            th.destroy();
        }
    }
    Ok(())
}

/// Spends the bottom layer's per-signature treehash budget.
fn update_treehash<D: GmssDigest>(params: &Parameters<D>, state: &mut KeyState, layer: usize) {
    let budget = (params.height(layer) - params.k(layer)) / 2;
    let ots = params.ots(layer);
    let tree = &mut state.current[layer];
    for _ in 0..budget {
        let Some(h) = min_treehash(&tree.treehash, &tree.stack) else {
            break;
        };
        let th = &mut tree.treehash[h];
        let leaf = leaf_from_seed(&ots, th.seed_active());
        th.update::<D>(&mut tree.stack, leaf);
    }
}

/// One slice of the work `child` runs for its parent layer.
fn pipeline_step<D: GmssDigest>(params: &Parameters<D>, state: &mut KeyState, child: usize) {
    let parent = child - 1;
    state.next_root_sig[parent].advance_one_step::<D>();
    state.upper_leaf[parent].advance_one_step::<D>();
    if parent >= 1 {
        state.next_next_leaf[parent - 1].advance_one_step::<D>();
    }

    let updates = (params.height(parent) - params.k(parent)) / 2;
    if updates == 0 {
        return;
    }
    let calls = u64::from(params.leaves(child) - 1);
    let cost = u64::from(updates).saturating_mul(params.ots(parent).leaf_cost());
    feed_parent_treehash(params, state, child, spread(cost, calls));
}

/// Computes treehash leaves of the parent layer with at most `budget` hash
/// operations, feeding each one as soon as it is complete.
fn feed_parent_treehash<D: GmssDigest>(
    params: &Parameters<D>,
    state: &mut KeyState,
    child: usize,
    mut budget: u64,
) {
    let parent = child - 1;
    while budget > 0 {
        if !state.upper_treehash_leaf[parent].is_active() {
            let tree = &state.current[parent];
            let Some(h) = min_treehash(&tree.treehash, &tree.stack) else {
                break;
            };
            state.upper_treehash_leaf[parent] =
                LeafCalc::new::<D>(params.w(parent), tree.treehash[h].seed_active(), 0);
            // fewer than 32 instances
            #[allow(clippy::cast_possible_truncation)]
            let target = h as u32;
            state.min_treehash[parent] = Some(target);
        }
        budget -= state.upper_treehash_leaf[parent].advance_by::<D>(budget);
        if !state.upper_treehash_leaf[parent].is_finished() {
            break;
        }
        store_parent_treehash_leaf::<D>(state, child);
    }
}

/// Hands a finished treehash leaf to the parent instance it was computed
/// for and idles the generator.
fn store_parent_treehash_leaf<D: GmssDigest>(state: &mut KeyState, child: usize) {
    let parent = child - 1;
    let mut calc = mem::take(&mut state.upper_treehash_leaf[parent]);
    if let Some(h) = state.min_treehash[parent].take() {
        let tree = &mut state.current[parent];
        if let Some(th) = tree.treehash.get_mut(h as usize) {
            th.update::<D>(&mut tree.stack, calc.leaf().to_vec());
        }
    }
    calc.zeroize();
}

/// Feeds the next leaf of the subtree after next of `layer`.
fn feed_next_next<D: GmssDigest>(params: &Parameters<D>, state: &mut KeyState, layer: usize) {
    let slot = layer - 1;
    let leaf = if layer == params.num_layers() - 1 {
        leaf_from_seed(&params.ots(layer), &state.next_next_seed[slot])
    } else {
        let calc = &mut state.next_next_leaf[layer - 1];
        calc.finish::<D>();
        calc.leaf().to_vec()
    };
    state.next_next_root[slot].update::<D>(&state.next_next_seed[slot], leaf);
    DigestPrng::<D>::skip(&mut state.next_next_seed[slot], 1);
    if layer < params.num_layers() - 1 {
        restart_next_next_leaf(params, state, layer);
    }
}

/// Replaces the exhausted subtree of `layer` by the next one and moves the
/// parent layer on by one leaf.
fn rotate<D: GmssDigest>(params: &Parameters<D>, state: &mut KeyState, layer: usize) -> GmssResult<()> {
    if (0..layer).all(|upper| state.index[upper] + 1 == params.leaves(upper)) {
        state.is_used = true;
        return Ok(());
    }
    let parent = layer - 1;

    feed_next_next(params, state, layer);
    state.next_root_sig[parent].finish::<D>();
    state.upper_leaf[parent].finish::<D>();
    if state.upper_treehash_leaf[parent].is_active() {
        state.upper_treehash_leaf[parent].finish::<D>();
        store_parent_treehash_leaf::<D>(state, layer);
    }

    let fresh = RootCalc::new(params.height(layer), params.k(layer));
    let (next_next, next_next_root) = mem::replace(&mut state.next_next_root[parent], fresh).into_parts()?;
    let next = mem::replace(&mut state.next[parent], next_next);
    let mut retired = mem::replace(&mut state.current[layer], next);
    retired.zeroize();
    state.next_root[parent] = next_next_root;
    state.current_root_sig[parent] = state.next_root_sig[parent].signature().to_vec();
    for node in state.keep[layer].iter_mut() {
        node.fill(0);
    }
    DigestPrng::<D>::skip(&mut state.current_seed[layer], 1);
    state.index[layer] = 0;

    let parent_leaf = state.upper_leaf[parent].leaf().to_vec();
    advance(params, state, parent, Some(parent_leaf))?;
    restart_pipelines(params, state, layer);
    Ok(())
}

/// Starts the work `child` runs for its parent's next leaf: the signature
/// of the next subtree's root and the leaf value itself.
fn restart_pipelines<D: GmssDigest>(params: &Parameters<D>, state: &mut KeyState, child: usize) {
    let parent = child - 1;
    let w = params.w(parent);
    let calls = u64::from(params.leaves(child) - 1);

    let mut seed = state.current_seed[parent].clone();
    DigestPrng::<D>::skip(&mut seed, 1);
    let mut ots_seed = ots_seed_of::<D>(&seed);
    let message = &state.next_root[parent];
    let cost = RootSig::cost::<D>(w, message);
    state.next_root_sig[parent] = RootSig::new::<D>(w, &ots_seed, message, spread(cost, calls));
    ots_seed.zeroize();
    seed.zeroize();

    let leaf_cost = params.ots(parent).leaf_cost();
    state.upper_leaf[parent] = LeafCalc::new::<D>(w, &state.current_seed[parent], spread(leaf_cost, calls));
    state.upper_treehash_leaf[parent] = LeafCalc::idle();
    state.min_treehash[parent] = None;
}

/// Starts the leaf `layer` will feed next into its subtree after next,
/// spread over the steps of the layer below.
fn restart_next_next_leaf<D: GmssDigest>(params: &Parameters<D>, state: &mut KeyState, layer: usize) {
    let calls = u64::from(params.leaves(layer + 1) - 1);
    let cost = params.ots(layer).leaf_cost();
    state.next_next_leaf[layer - 1] = LeafCalc::new::<D>(
        params.w(layer),
        &state.next_next_seed[layer - 1],
        spread(cost, calls),
    );
}
