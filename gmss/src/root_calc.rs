use zeroize::Zeroize;

use crate::error::{Error, GmssResult};
use crate::hash::{GmssDigest, hash_nodes};
use crate::treehash::{StackNode, Treehash};
use crate::utils::{Reader, Writer, expect_len};

/// Traversal state of one subtree: what a layer needs to produce the
/// authentication path of every leaf in turn.
#[derive(Clone)]
pub(crate) struct Subtree {
    /// Authentication path of the active leaf.
    pub(crate) auth_path: Vec<Vec<u8>>,
    /// One instance per height below `height - K`.
    pub(crate) treehash: Vec<Treehash>,
    /// Tail nodes shared by the treehash instances.
    pub(crate) stack: Vec<StackNode>,
    /// Right siblings at heights `height - K .. height - 1`, next node last.
    pub(crate) retain: Vec<Vec<Vec<u8>>>,
}

impl Subtree {
    pub(crate) fn encode_auth_path(&self, w: &mut Writer) {
        w.put_nodes(&self.auth_path);
    }

    pub(crate) fn encode_treehash(&self, w: &mut Writer) {
        w.put_seq(&self.treehash, |w, th| th.encode(w));
    }

    pub(crate) fn encode_stack(&self, w: &mut Writer) {
        w.put_seq(&self.stack, |w, entry| entry.encode(w));
    }

    pub(crate) fn encode_retain(&self, w: &mut Writer) {
        w.put_seq(&self.retain, |w, nodes| w.put_nodes(nodes));
    }

    pub(crate) fn decode_auth_path(r: &mut Reader<'_>, height: u32, n: usize) -> GmssResult<Vec<Vec<u8>>> {
        let nodes = r.get_nodes(n)?;
        expect_len(nodes.len(), height as usize, "authentication path length")?;
        Ok(nodes)
    }

    pub(crate) fn decode_treehash(
        r: &mut Reader<'_>,
        height: u32,
        retain_k: u32,
        n: usize,
    ) -> GmssResult<Vec<Treehash>> {
        let instances = r.get_seq(|r, h| Treehash::decode(r, h_u32(h), n))?;
        expect_len(instances.len(), (height - retain_k) as usize, "treehash count")?;
        Ok(instances)
    }

    pub(crate) fn decode_stack(r: &mut Reader<'_>, height: u32, n: usize) -> GmssResult<Vec<StackNode>> {
        r.get_seq(|r, _| StackNode::decode(r, height, n))
    }

    pub(crate) fn decode_retain(r: &mut Reader<'_>, retain_k: u32, n: usize) -> GmssResult<Vec<Vec<Vec<u8>>>> {
        let retain = r.get_seq(|r, _| r.get_nodes(n))?;
        expect_len(retain.len(), (retain_k - 1) as usize, "retain stack count")?;
        Ok(retain)
    }
}

impl Zeroize for Subtree {
    fn zeroize(&mut self) {
        self.auth_path.zeroize();
        self.treehash.zeroize();
        self.stack.zeroize();
        self.retain.zeroize();
    }
}

/// Heights are bounded by the parameter limits.
#[allow(clippy::cast_possible_truncation)]
fn h_u32(h: usize) -> u32 {
    h as u32
}

/// Builds a subtree from its leaves, fed in order, one per call.
///
/// Besides the root it collects everything the traversal needs when the
/// subtree becomes active: the authentication path of leaf 0, the first
/// node of every treehash instance with its starting seed, and the retained
/// right siblings of the upper heights.
#[derive(Clone)]
pub(crate) struct RootCalc {
    height: u32,
    retain_k: u32,
    leaves: u32,
    stack: Vec<StackNode>,
    tree: Subtree,
    root: Vec<u8>,
}

impl RootCalc {
    pub(crate) fn new(height: u32, retain_k: u32) -> Self {
        Self {
            height,
            retain_k,
            leaves: 0,
            stack: Vec::new(),
            tree: Subtree {
                auth_path: vec![Vec::new(); height as usize],
                treehash: (0..height - retain_k).map(Treehash::new).collect(),
                stack: Vec::new(),
                retain: vec![Vec::new(); (retain_k - 1) as usize],
            },
            root: Vec::new(),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        !self.root.is_empty()
    }

    /// Number of leaves consumed so far.
    #[cfg(test)]
    pub(crate) fn leaves(&self) -> u32 {
        self.leaves
    }

    /// Feeds the next leaf; `leaf_seed` is the seed state it was derived
    /// from. Ignored once the root is known.
    pub(crate) fn update<D: GmssDigest>(&mut self, leaf_seed: &[u8], leaf: Vec<u8>) {
        if self.is_finished() {
            return;
        }
        let index = self.leaves;
        for th in self.tree.treehash.iter_mut() {
            if index == 3 << th.height() {
                th.set_seed_next(leaf_seed);
            }
        }

        let mut node = leaf;
        let mut height = 0;
        let mut node_index = index;
        loop {
            self.record(height, node_index, &node);
            if height == self.height {
                break;
            }
            let sibling = match self.stack.last() {
                Some(top) if top.height == height => self.stack.pop(),
                _ => None,
            };
            let Some(mut sibling) = sibling else {
                self.stack.push(StackNode { height, node });
                break;
            };
            node = hash_nodes::<D>(&sibling.node, &node);
            sibling.zeroize();
            height += 1;
            node_index >>= 1;
        }

        self.leaves += 1;
        if self.is_finished() {
            for nodes in self.tree.retain.iter_mut() {
                nodes.reverse();
            }
        }
    }

    fn record(&mut self, height: u32, index: u32, node: &[u8]) {
        if height == self.height {
            self.root = node.to_vec();
            return;
        }
        let lower = self.height - self.retain_k;
        let h = height as usize;
        if index == 1 {
            self.tree.auth_path[h] = node.to_vec();
        } else if height < lower {
            if index == 3 {
                self.tree.treehash[h].set_first_node(node.to_vec());
            }
        } else if index >= 3 && index % 2 == 1 && height + 1 < self.height {
            self.tree.retain[(height - lower) as usize].push(node.to_vec());
        }
    }

    /// Splits a finished calculator into the subtree state and its root.
    pub(crate) fn into_parts(self) -> GmssResult<(Subtree, Vec<u8>)> {
        if !self.is_finished() {
            return Err(Error::InvalidState("subtree consumed before its root was computed"));
        }
        Ok((self.tree, self.root))
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.put_u32(self.height);
        w.put_u32(self.retain_k);
        w.put_u32(self.leaves);
        w.put_seq(&self.stack, |w, entry| entry.encode(w));
        self.tree.encode_auth_path(w);
        self.tree.encode_treehash(w);
        self.tree.encode_retain(w);
        w.put_bytes(&self.root);
    }

    pub(crate) fn decode(r: &mut Reader<'_>, height: u32, retain_k: u32, n: usize) -> GmssResult<Self> {
        expect_len(r.get_u32()? as usize, height as usize, "subtree calculator height")?;
        expect_len(r.get_u32()? as usize, retain_k as usize, "subtree calculator retain parameter")?;
        let leaves = r.get_u32()?;
        let stack = Subtree::decode_stack(r, height, n)?;
        let auth_path = r.get_nodes_or_empty(n)?;
        expect_len(auth_path.len(), height as usize, "authentication path length")?;
        let treehash = Subtree::decode_treehash(r, height, retain_k, n)?;
        let retain = Subtree::decode_retain(r, retain_k, n)?;
        let root = r.get_bytes()?;
        if !root.is_empty() {
            expect_len(root.len(), n, "subtree root length")?;
        }
        if u64::from(leaves) > 1u64 << height {
            return Err(Error::Malformed("subtree calculator leaf count"));
        }
        Ok(Self {
            height,
            retain_k,
            leaves,
            stack,
            tree: Subtree {
                auth_path,
                treehash,
                stack: Vec::new(),
                retain,
            },
            root,
        })
    }
}

impl Zeroize for RootCalc {
    fn zeroize(&mut self) {
        self.stack.zeroize();
        self.tree.zeroize();
        self.root.zeroize();
    }
}
