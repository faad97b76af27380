use byteorder::{ByteOrder, LittleEndian};
use ethereum_types::{H256, U256};

use crate::cache::Cache;
use crate::dataset::calc_dataset_item;
use crate::node::{Node, NODE_BYTES, NODE_WORDS};
use crate::{fnv, fnv_mix_hash, keccak_256, keccak_512, Error, ACCESSES, MIX_BYTES};

pub const MIX_WORDS: usize = MIX_BYTES / 4;
pub const MIX_NODES: usize = MIX_WORDS / NODE_WORDS;

fn seed_hash(header_hash: H256, nonce: u64) -> [u8; 64] {
    let mut seed = [0u8; 40]; // 32 + 8
    seed[..32].copy_from_slice(header_hash.as_bytes());
    LittleEndian::write_u64(&mut seed[32..], nonce);
    keccak_512(&seed)
}

fn final_hash(seed: &[u8; 64], mix_hash: &H256) -> H256 {
    let mut buf = [0u8; 96]; // 64 + 32
    buf[..64].copy_from_slice(seed);
    buf[64..].copy_from_slice(mix_hash.as_bytes());
    H256::from(keccak_256(&buf))
}

/// Reject a dataset size hashimoto cannot page through: it must be a
/// non-zero multiple of [`MIX_BYTES`] with node indices that fit in `u32`.
pub(crate) fn check_full_size(full_size: usize) -> Result<(), Error> {
    if full_size < MIX_BYTES || full_size % MIX_BYTES != 0 {
        return Err(Error::InvalidInput(format!(
            "full size {} is not a positive multiple of {}",
            full_size, MIX_BYTES
        )));
    }
    if full_size / NODE_BYTES > u32::MAX as usize {
        return Err(Error::InvalidInput(format!(
            "full size {} has too many nodes",
            full_size
        )));
    }
    Ok(())
}

/// "Main" function of the proof of work, calculating the mix digest and the
/// result given the header hash and nonce.
///
/// `lookup` returns dataset node `i`; `full_size` is only used to derive the
/// number of 128-byte pages.
pub fn hashimoto<F>(
    header_hash: H256,
    nonce: u64,
    full_size: usize,
    lookup: F,
) -> Result<(H256, H256), Error>
where
    F: Fn(usize) -> Node,
{
    check_full_size(full_size)?;
    let pages = (full_size / MIX_BYTES) as u32;
    let seed = seed_hash(header_hash, nonce);
    let seed_head = LittleEndian::read_u32(&seed);

    let mut mix = [0u32; MIX_WORDS];
    for (i, w) in mix.iter_mut().enumerate() {
        *w = LittleEndian::read_u32(&seed[(i % NODE_WORDS * 4)..]);
    }

    let mut temp = [0u32; MIX_WORDS];
    for i in 0..ACCESSES as u32 {
        let page = fnv(i ^ seed_head, mix[i as usize % MIX_WORDS]) % pages;
        for n in 0..MIX_NODES {
            let node = lookup(page as usize * MIX_NODES + n);
            temp[n * NODE_WORDS..(n + 1) * NODE_WORDS].copy_from_slice(&node.words());
        }
        fnv_mix_hash(&mut mix, temp);
    }

    let mut digest = [0u8; 32];
    for (i, w) in mix.chunks_exact(4).enumerate() {
        let reduction = fnv(fnv(fnv(w[0], w[1]), w[2]), w[3]);
        LittleEndian::write_u32(&mut digest[i * 4..], reduction);
    }
    let mix_hash = H256::from(digest);

    Ok((mix_hash, final_hash(&seed, &mix_hash)))
}

/// Hashimoto for a light client, recomputing dataset nodes from the cache.
pub fn hashimoto_light(
    header_hash: H256,
    nonce: u64,
    full_size: usize,
    cache: &Cache,
) -> Result<(H256, H256), Error> {
    hashimoto(header_hash, nonce, full_size, |i| {
        calc_dataset_item(cache, i as u32)
    })
}

/// Hashimoto for a full client holding the whole dataset in memory.
pub fn hashimoto_full(
    header_hash: H256,
    nonce: u64,
    dataset: &[u8],
) -> Result<(H256, H256), Error> {
    hashimoto(header_hash, nonce, dataset.len(), |i| {
        let mut node = Node::zero();
        node.as_bytes_mut()
            .copy_from_slice(&dataset[i * NODE_BYTES..(i + 1) * NODE_BYTES]);
        node
    })
}

/// The result hash for a claimed mix digest, without touching the dataset.
pub fn quick_hash(header_hash: H256, nonce: u64, mix_hash: H256) -> H256 {
    final_hash(&seed_hash(header_hash, nonce), &mix_hash)
}

/// Pre-verification: whether the claimed mix digest would meet `boundary`.
///
/// Passing this says nothing about the mix digest itself; a full or light
/// computation is still needed to accept a seal.
pub fn quick_check_difficulty(
    header_hash: H256,
    nonce: u64,
    mix_hash: H256,
    boundary: H256,
) -> bool {
    check_difficulty(&quick_hash(header_hash, nonce, mix_hash), &boundary)
}

/// Whether `hash <= boundary`, both read as 256-bit big-endian integers.
pub fn check_difficulty(hash: &H256, boundary: &H256) -> bool {
    for (h, b) in hash.as_bytes().iter().zip(boundary.as_bytes()) {
        if h != b {
            return h < b;
        }
    }
    true
}

/// `2^256 / difficulty` as a big-endian boundary, saturated to `2^256 - 1`.
pub fn boundary_from_difficulty(difficulty: U256) -> Result<H256, Error> {
    if difficulty.is_zero() {
        return Err(Error::InvalidInput("difficulty must be non-zero".into()));
    }
    // 2^256 = MAX + 1 = q * d + r + 1
    let (q, r) = U256::MAX.div_mod(difficulty);
    let boundary = if r + U256::one() == difficulty {
        q.saturating_add(U256::one())
    } else {
        q
    };
    let mut out = [0u8; 32];
    boundary.to_big_endian(&mut out);
    Ok(H256::from(out))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    const FULL_SIZE: usize = 32 * 1024;

    fn header() -> H256 {
        H256::from([b'~'; 32])
    }

    #[test]
    fn light_golden() {
        let cache = Cache::new(1088, H256::zero()).unwrap();
        let (mix, result) = hashimoto_light(header(), 0x7c7c597c, FULL_SIZE, &cache).unwrap();
        assert_eq!(
            mix,
            H256::from(hex!("44468c4f017db6abf6a3d21c82a1ca33bd9290f44a7e6e844f086e9a1e118027"))
        );
        assert_eq!(
            result,
            H256::from(hex!("c9eb6fd2e67959ebb83543cf106bac655c69616a54c794e8d21e29ea1297c546"))
        );
    }

    #[test]
    fn quick_hash_matches_full_result() {
        let cache = Cache::new(1088, H256::zero()).unwrap();
        let (mix, result) = hashimoto_light(header(), 0x7c7c597c, FULL_SIZE, &cache).unwrap();
        assert_eq!(quick_hash(header(), 0x7c7c597c, mix), result);
        assert!(quick_check_difficulty(header(), 0x7c7c597c, mix, result));
        assert!(!quick_check_difficulty(header(), 0x7c7c597c, mix, H256::zero()));
    }

    #[test]
    fn full_rejects_malformed_dataset() {
        for len in [0, 64, 200] {
            let dataset = vec![0u8; len];
            assert!(matches!(
                hashimoto_full(H256::zero(), 0, &dataset),
                Err(Error::InvalidInput(_))
            ));
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn light_rejects_sizes_past_u32_nodes() {
        let cache = Cache::new(1088, H256::zero()).unwrap();
        let too_big = (u32::MAX as usize + 1) * NODE_BYTES;
        assert!(matches!(
            hashimoto_light(header(), 0, too_big, &cache),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            hashimoto_light(header(), 0, 0, &cache),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn difficulty_equal_passes() {
        let h = H256::from(hex!("00000000ffffffff00000000ffffffff00000000ffffffff00000000ffffffff"));
        assert!(check_difficulty(&h, &h));
    }

    #[test]
    fn difficulty_extremes() {
        let max = H256::repeat_byte(0xff);
        let zero = H256::zero();
        assert!(check_difficulty(&max, &max));
        assert!(check_difficulty(&H256::repeat_byte(0x80), &max));
        assert!(check_difficulty(&zero, &zero));
        assert!(!check_difficulty(&H256::from_low_u64_be(1), &zero));
    }

    #[test]
    fn difficulty_is_big_endian_unsigned() {
        let mut hash = H256::zero();
        let mut boundary = H256::zero();
        hash.0[0] = 0x01;
        boundary.0[31] = 0xff;
        assert!(!check_difficulty(&hash, &boundary));
        // 0x80 must not be read as negative
        hash.0[0] = 0x7f;
        boundary.0[0] = 0x80;
        assert!(check_difficulty(&hash, &boundary));
    }

    #[test]
    fn boundary_from_difficulty_values() {
        assert!(boundary_from_difficulty(U256::zero()).is_err());
        assert_eq!(boundary_from_difficulty(U256::one()).unwrap(), H256::repeat_byte(0xff));
        let mut half = H256::zero();
        half.0[0] = 0x80;
        assert_eq!(boundary_from_difficulty(U256::from(2u64)).unwrap(), half);
        let third = boundary_from_difficulty(U256::from(3u64)).unwrap();
        assert_eq!(third, H256::repeat_byte(0x55));
    }
}
