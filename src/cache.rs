use std::time::Instant;

use ethereum_types::H256;
use log::info;

use crate::node::{Node, NODE_BYTES};
use crate::{Error, CACHE_ROUNDS};

/// The per-epoch cache: enough to recompute any dataset node on demand.
///
/// Immutable once built, so one cache can be shared by any number of light
/// hash computations and dataset workers.
#[derive(Clone, PartialEq, Eq)]
pub struct Cache {
    nodes: Vec<Node>,
}

impl Cache {
    /// Build the cache of `cache_size` bytes for `seed`.
    ///
    /// `cache_size` should come from [`get_cache_size`](crate::get_cache_size);
    /// any other node-aligned size still yields a deterministic cache.
    pub fn new(cache_size: usize, seed: H256) -> Result<Self, Error> {
        if cache_size == 0 || cache_size % NODE_BYTES != 0 {
            return Err(Error::InvalidInput(format!(
                "cache size {} is not a positive multiple of {}",
                cache_size, NODE_BYTES
            )));
        }
        let n = cache_size / NODE_BYTES;
        if n > u32::MAX as usize {
            return Err(Error::InvalidInput(format!(
                "cache of {} nodes cannot be indexed by 32-bit words",
                n
            )));
        }

        let now = Instant::now();
        let mut nodes = crate::alloc_nodes(n)?;
        make_cache(&mut nodes, seed);
        info!(
            "built {} KiB cache for seed {:?} in {:?}",
            cache_size / 1024,
            seed,
            now.elapsed()
        );
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.nodes.len() * NODE_BYTES
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        for node in &self.nodes {
            out.extend_from_slice(node.as_bytes());
        }
        out
    }
}

impl core::fmt::Debug for Cache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cache").field("nodes", &self.nodes.len()).finish()
    }
}

/// Fill `nodes` with the cache for `seed`.
///
/// A sequential Keccak-512 chain followed by `CACHE_ROUNDS` passes of
/// RandMemoHash. Each pass updates nodes in place, in index order: node `i`
/// reads the value node `i - 1` received earlier in the same pass.
pub fn make_cache(nodes: &mut [Node], seed: H256) {
    let n = nodes.len();
    if n == 0 {
        return;
    }

    nodes[0] = Node::hash(seed.as_bytes());
    for i in 1..n {
        nodes[i] = nodes[i - 1].rehash();
    }

    for _ in 0..CACHE_ROUNDS {
        for i in 0..n {
            let v = nodes[i].word(0) as usize % n;
            let mut data = nodes[(i + n - 1) % n];
            data ^= &nodes[v];
            nodes[i] = data.rehash();
        }
    }
}
