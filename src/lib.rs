//! Apache-2 licensed krash proof of work: a memory-hard, Ethash-style
//! algorithm with light (cache only) and full (materialized dataset) modes.

// The reference algorithm used is from https://github.com/ethereum/wiki/wiki/Ethash

mod cache;
mod dag;
mod dataset;
mod error;
mod hashimoto;
pub mod io;
mod node;

use ethereum_types::H256;
use sha3::{Digest, Keccak256, Keccak512};

pub use crate::cache::{make_cache, Cache};
pub use crate::dag::{make_dag, FullDAG, LightDAG, TransferError};
pub use crate::dataset::{calc_dataset_item, make_dataset, make_dataset_with_progress};
pub use crate::error::Error;
pub use crate::hashimoto::{
    boundary_from_difficulty, check_difficulty, hashimoto, hashimoto_full, hashimoto_light,
    quick_check_difficulty, quick_hash, MIX_NODES, MIX_WORDS,
};
pub use crate::node::{Node, NODE_BYTES, NODE_DWORDS, NODE_WORDS};

pub const DATASET_BYTES_INIT: u64 = 1 << 30;
pub const DATASET_BYTES_GROWTH: u64 = 1 << 23;
pub const CACHE_BYTES_INIT: u64 = 1 << 24;
pub const CACHE_BYTES_GROWTH: u64 = 1 << 17;
pub const MIX_BYTES: usize = 128;
pub const DATASET_PARENTS: u32 = 256;
pub const CACHE_ROUNDS: usize = 3;
pub const ACCESSES: usize = 64;

pub const EPOCH_LENGTH: u64 = 30_000;

const FNV_PRIME: u32 = 0x0100_0193;

pub fn get_epoch(block_number: u64) -> u64 {
    block_number / EPOCH_LENGTH
}

/// Largest size `<= init + growth * epoch - unit` whose count of `unit`s is
/// prime.
fn prime_size(block_number: u64, init: u64, growth: u64, unit: u64) -> Result<usize, Error> {
    let overflow = || Error::SizeOverflow { block_number };
    let mut sz = growth
        .checked_mul(get_epoch(block_number))
        .and_then(|g| g.checked_add(init))
        .ok_or_else(overflow)?
        - unit;
    while !primal::is_prime(sz / unit) {
        sz -= 2 * unit;
    }
    usize::try_from(sz).map_err(|_| overflow())
}

/// Cache size in bytes for the epoch of `block_number`.
pub fn get_cache_size(block_number: u64) -> Result<usize, Error> {
    prime_size(
        block_number,
        CACHE_BYTES_INIT,
        CACHE_BYTES_GROWTH,
        NODE_BYTES as u64,
    )
}

/// Dataset size in bytes for the epoch of `block_number`.
pub fn get_full_size(block_number: u64) -> Result<usize, Error> {
    prime_size(
        block_number,
        DATASET_BYTES_INIT,
        DATASET_BYTES_GROWTH,
        MIX_BYTES as u64,
    )
}

/// Get the seedhash for a given block number.
pub fn get_seedhash(block_number: u64) -> H256 {
    let mut s = [0u8; 32];
    for _ in 0..get_epoch(block_number) {
        s = keccak_256(&s);
    }
    H256::from(s)
}

pub fn keccak_512(data: &[u8]) -> [u8; 64] {
    let mut output = [0u8; 64];
    output.copy_from_slice(&Keccak512::digest(data));
    output
}

pub fn keccak_256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Keccak256::digest(data));
    output
}

#[inline]
pub fn fnv(v1: u32, v2: u32) -> u32 {
    v1.wrapping_mul(FNV_PRIME) ^ v2
}

#[inline]
pub fn fnv_mix_hash(mix: &mut [u32; MIX_WORDS], data: [u32; MIX_WORDS]) {
    for (m, d) in mix.iter_mut().zip(data.iter()) {
        *m = fnv(*m, *d);
    }
}

pub(crate) fn alloc_bytes(len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory { bytes: len })?;
    buf.resize(len, 0);
    Ok(buf)
}

pub(crate) fn alloc_nodes(count: usize) -> Result<Vec<Node>, Error> {
    let mut nodes = Vec::new();
    nodes.try_reserve_exact(count).map_err(|_| Error::OutOfMemory {
        bytes: count.saturating_mul(NODE_BYTES),
    })?;
    nodes.resize(count, Node::zero());
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn known_sizes() {
        assert_eq!(get_cache_size(0).unwrap(), 16_776_896);
        assert_eq!(get_full_size(0).unwrap(), 1_073_739_904);
        assert_eq!(get_cache_size(29_999).unwrap(), 16_776_896);
        assert_eq!(get_cache_size(30_000).unwrap(), 16_907_456);
        assert_eq!(get_full_size(30_000).unwrap(), 1_082_130_304);
    }

    #[test]
    fn sizes_grow_and_stay_prime() {
        let mut last_cache = 0;
        let mut last_full = 0;
        for epoch in 0..64u64 {
            let block = epoch * EPOCH_LENGTH + epoch;
            let cache = get_cache_size(block).unwrap();
            let full = get_full_size(block).unwrap();
            assert!(cache >= last_cache && full >= last_full);
            assert_eq!(cache % NODE_BYTES, 0);
            assert_eq!(full % MIX_BYTES, 0);
            assert!(primal::is_prime((cache / NODE_BYTES) as u64));
            assert!(primal::is_prime((full / MIX_BYTES) as u64));
            last_cache = cache;
            last_full = full;
        }
    }

    #[test]
    fn size_overflow_fails_cleanly() {
        assert!(matches!(
            get_cache_size(u64::MAX),
            Err(Error::SizeOverflow { block_number: u64::MAX })
        ));
        assert!(get_full_size(u64::MAX).is_err());
    }

    #[test]
    fn seedhash_per_epoch() {
        assert_eq!(get_seedhash(0), H256::zero());
        assert_eq!(get_seedhash(29_999), H256::zero());
        let epoch1 = H256::from(hex!(
            "290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
        ));
        assert_eq!(get_seedhash(30_000), epoch1);
        assert_eq!(get_seedhash(59_999), epoch1);
        assert_ne!(get_seedhash(60_000), epoch1);
    }

    #[test]
    fn keccak_empty() {
        assert_eq!(
            keccak_256(&[]),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn fnv_wraps() {
        assert_eq!(fnv(0, 7), 7);
        assert_eq!(fnv(u32::MAX, 0), u32::MAX.wrapping_mul(FNV_PRIME));
    }
}
