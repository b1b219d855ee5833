use zeroize::Zeroize;

use crate::error::{Error, GmssResult};
use crate::hash::{GmssDigest, hash_nodes};
use crate::prng::DigestPrng;
use crate::utils::{Reader, Writer, expect_len};

/// A node waiting on a layer's shared treehash stack.
#[derive(Clone)]
pub(crate) struct StackNode {
    pub(crate) height: u32,
    pub(crate) node: Vec<u8>,
}

impl StackNode {
    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_u32(self.height);
        w.put_bytes(&self.node);
    }

    pub(crate) fn decode(r: &mut Reader<'_>, tree_height: u32, n: usize) -> GmssResult<Self> {
        let height = r.get_u32()?;
        if height >= tree_height {
            return Err(Error::Malformed("stack node height"));
        }
        Ok(Self {
            height,
            node: r.get_node(n)?,
        })
    }
}

impl Zeroize for StackNode {
    fn zeroize(&mut self) {
        self.height.zeroize();
        self.node.zeroize();
    }
}

/// Incremental computation of the next authentication node at one height.
///
/// Leaves are folded into nodes on the layer's shared stack. The instance
/// only knows how many stack entries it owns (its tail); the entries
/// themselves live in the shared stack passed to each call.
#[derive(Clone)]
pub(crate) struct Treehash {
    height: u32,
    initialized: bool,
    finished: bool,
    tail_len: u32,
    next_index: u32,
    node: Vec<u8>,
    seed_active: Vec<u8>,
    seed_next: Vec<u8>,
}

impl Treehash {
    /// An idle instance for target height `height`.
    pub(crate) fn new(height: u32) -> Self {
        Self {
            height,
            initialized: false,
            finished: false,
            tail_len: 0,
            next_index: 0,
            node: Vec::new(),
            seed_active: Vec::new(),
            seed_next: Vec::new(),
        }
    }

    /// Starts computing the node whose first leaf is `start_index`; that
    /// leaf's seed is the one kept in `seed_next`.
    pub(crate) fn initialize(&mut self, start_index: u32) {
        self.seed_active.clone_from(&self.seed_next);
        self.next_index = start_index;
        self.tail_len = 0;
        self.node.zeroize();
        self.initialized = true;
        self.finished = false;
    }

    /// Stops the instance. `seed_next` keeps tracking the seed chain.
    pub(crate) fn destroy(&mut self) {
        self.initialized = false;
        self.finished = false;
        self.tail_len = 0;
        self.node.zeroize();
        self.seed_active.zeroize();
    }

    /// Records a node computed during a full subtree construction.
    pub(crate) fn set_first_node(&mut self, node: Vec<u8>) {
        self.node = node;
        self.initialized = true;
        self.finished = true;
    }

    pub(crate) fn set_seed_next(&mut self, seed: &[u8]) {
        self.seed_next = seed.to_vec();
    }

    /// Moves `seed_next` one leaf forward.
    pub(crate) fn advance_seed_next<D: GmssDigest>(&mut self) {
        let mut out = DigestPrng::<D>::next_seed(&mut self.seed_next);
        out.zeroize();
    }

    #[cfg(test)]
    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    /// Seed state of the next leaf this instance consumes.
    pub(crate) fn seed_active(&self) -> &[u8] {
        &self.seed_active
    }

    #[cfg(test)]
    pub(crate) fn seed_next(&self) -> &[u8] {
        &self.seed_next
    }

    /// The completed node, once finished.
    pub(crate) fn first_node(&self) -> Option<&[u8]> {
        self.finished.then_some(self.node.as_slice())
    }

    /// Height of the lowest tail node, or the target height if the instance
    /// has none. `None` for idle and finished instances.
    pub(crate) fn lowest_node_height(&self, stack: &[StackNode]) -> Option<u32> {
        if !self.initialized || self.finished {
            return None;
        }
        if self.tail_len == 0 {
            return Some(self.height);
        }
        stack
            .iter()
            .rev()
            .take(self.tail_len as usize)
            .map(|entry| entry.height)
            .min()
    }

    /// Folds the next leaf into this instance.
    pub(crate) fn update<D: GmssDigest>(&mut self, stack: &mut Vec<StackNode>, leaf: Vec<u8>) {
        let mut node = leaf;
        let mut height = 0;
        while self.tail_len > 0 && stack.last().is_some_and(|top| top.height == height) {
            let Some(mut top) = stack.pop() else {
                break;
            };
            node = hash_nodes::<D>(&top.node, &node);
            top.zeroize();
            height += 1;
            self.tail_len -= 1;
        }

        if height == self.height {
            self.node = node;
            self.finished = true;
        } else {
            stack.push(StackNode { height, node });
            self.tail_len += 1;
        }
        self.next_index += 1;
        let mut out = DigestPrng::<D>::next_seed(&mut self.seed_active);
        out.zeroize();
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_u32(self.height);
        w.put_bool(self.initialized);
        w.put_bool(self.finished);
        w.put_u32(self.tail_len);
        w.put_u32(self.next_index);
        w.put_bytes(&self.node);
        w.put_bytes(&self.seed_active);
        w.put_bytes(&self.seed_next);
    }

    /// Decodes the instance expected at target height `height`.
    pub(crate) fn decode(r: &mut Reader<'_>, height: u32, n: usize) -> GmssResult<Self> {
        let th = Self {
            height: r.get_u32()?,
            initialized: r.get_bool()?,
            finished: r.get_bool()?,
            tail_len: r.get_u32()?,
            next_index: r.get_u32()?,
            node: r.get_bytes()?,
            seed_active: r.get_bytes()?,
            seed_next: r.get_bytes()?,
        };
        expect_len(th.height as usize, height as usize, "treehash height")?;
        if th.finished {
            expect_len(th.node.len(), n, "treehash node length")?;
        }
        if th.initialized && !th.finished {
            expect_len(th.seed_active.len(), n, "treehash seed length")?;
        }
        if !th.seed_next.is_empty() {
            expect_len(th.seed_next.len(), n, "treehash seed length")?;
        }
        Ok(th)
    }
}

impl Zeroize for Treehash {
    fn zeroize(&mut self) {
        self.node.zeroize();
        self.seed_active.zeroize();
        self.seed_next.zeroize();
    }
}

/// Picks the instance to feed next: the lowest tail node wins, ties go to
/// the lower target height.
pub(crate) fn min_treehash(treehash: &[Treehash], stack: &[StackNode]) -> Option<usize> {
    let mut best: Option<(u32, usize)> = None;
    for (index, th) in treehash.iter().enumerate() {
        if let Some(low) = th.lowest_node_height(stack) {
            if best.is_none_or(|(lowest, _)| low < lowest) {
                best = Some((low, index));
            }
        }
    }
    best.map(|(_, index)| index)
}
