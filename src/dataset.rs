use core::ops::ControlFlow;
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;

use crate::cache::Cache;
use crate::node::{Node, NODE_BYTES, NODE_WORDS};
use crate::{fnv, Error, DATASET_PARENTS};

/// Number of progress reports over a whole dataset.
const PROGRESS_STEPS: usize = 100;

/// Compute dataset node `index` from the cache.
///
/// Every index is independent of every other, which is what lets light
/// clients verify with the cache alone.
pub fn calc_dataset_item(cache: &Cache, index: u32) -> Node {
    let nodes = cache.nodes();
    let n = nodes.len() as u32;

    let mut seed = nodes[(index % n) as usize];
    seed.set_word(0, seed.word(0) ^ index);
    let mut mix = seed.rehash().words();

    for i in 0..DATASET_PARENTS {
        let parent = fnv(index ^ i, mix[i as usize % NODE_WORDS]) % n;
        let parent = nodes[parent as usize].words();
        for (m, p) in mix.iter_mut().zip(parent.iter()) {
            *m = fnv(*m, *p);
        }
    }

    Node::from_words(&mix).rehash()
}

/// Fill `dataset` with every dataset node derived from `cache`.
pub fn make_dataset(dataset: &mut [u8], cache: &Cache) -> Result<(), Error> {
    make_dataset_with_progress(dataset, cache, |_| ControlFlow::Continue(()))
}

/// Fill `dataset` like [`make_dataset`], reporting progress as it goes.
///
/// `progress` receives a percentage, first `0` before any work and then
/// non-decreasing values up to `100`. It runs on the calling thread between
/// parallel batches; returning `ControlFlow::Break` stops generation with
/// [`Error::Cancelled`] and the buffer contents must be discarded.
pub fn make_dataset_with_progress<F>(
    dataset: &mut [u8],
    cache: &Cache,
    mut progress: F,
) -> Result<(), Error>
where
    F: FnMut(u32) -> ControlFlow<()>,
{
    if dataset.len() % NODE_BYTES != 0 {
        return Err(Error::InvalidInput(format!(
            "dataset size {} is not a multiple of {}",
            dataset.len(),
            NODE_BYTES
        )));
    }
    let total = dataset.len() / NODE_BYTES;
    if total > u32::MAX as usize + 1 {
        return Err(Error::InvalidInput(format!(
            "dataset of {} nodes cannot be indexed by 32-bit words",
            total
        )));
    }
    if cache.is_empty() {
        return Err(Error::InvalidInput("empty cache".into()));
    }

    if progress(0).is_break() {
        return Err(Error::Cancelled { progress: 0 });
    }

    let now = Instant::now();
    let batch = (total / PROGRESS_STEPS).max(1);
    let mut done = 0usize;
    for chunk in dataset.chunks_mut(batch * NODE_BYTES) {
        let base = done;
        chunk
            .par_chunks_mut(NODE_BYTES)
            .enumerate()
            .for_each(|(offset, out)| {
                let item = calc_dataset_item(cache, (base + offset) as u32);
                out.copy_from_slice(item.as_bytes());
            });
        done += chunk.len() / NODE_BYTES;

        let percent = (done as u64 * 100 / total as u64) as u32;
        debug!("dataset generation {}% ({} of {} nodes)", percent, done, total);
        if progress(percent).is_break() {
            return Err(Error::Cancelled { progress: percent });
        }
    }

    info!(
        "generated {} MiB dataset in {:?}",
        dataset.len() / (1024 * 1024),
        now.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use ethereum_types::H256;

    use super::*;

    fn cache() -> Cache {
        Cache::new(1088, H256::zero()).unwrap()
    }

    #[test]
    fn item_golden() {
        let cache = cache();
        assert_eq!(
            calc_dataset_item(&cache, 0).as_bytes()[..],
            hex_literal::hex!("ec1258817623604ff5ac315d1a271dd2d5aefe1a71d5744b190b1363d484d4c15fa5e5bc157bc75151049dde5dd27dcf9b93353372c14685f4642c0a5eb14e3a")[..]
        );
        assert_eq!(
            calc_dataset_item(&cache, 5).as_bytes()[..],
            hex_literal::hex!("5afc7a9016a713f15a38f9c020ebd36baa53e0f8ad345922beb7c1841d180bbc129ba308e99569afec89664528a4eefb1405c1280fa297cb38b7bddf3592ee1d")[..]
        );
    }

    #[test]
    fn materialized_nodes_match_items() {
        let cache = cache();
        let mut dataset = vec![0u8; 64 * 300];
        make_dataset(&mut dataset, &cache).unwrap();
        for i in [0usize, 1, 16, 17, 150, 299] {
            assert_eq!(
                &dataset[i * 64..(i + 1) * 64],
                calc_dataset_item(&cache, i as u32).as_bytes(),
                "node {}",
                i
            );
        }
    }

    #[test]
    fn progress_is_monotonic_and_complete() {
        let cache = cache();
        let mut dataset = vec![0u8; 64 * 250];
        let mut seen = Vec::new();
        make_dataset_with_progress(&mut dataset, &cache, |p| {
            seen.push(p);
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn cancel_on_second_report() {
        let cache = cache();
        let mut dataset = vec![0u8; 64 * 512];
        let mut calls = 0;
        let res = make_dataset_with_progress(&mut dataset, &cache, |_| {
            calls += 1;
            if calls == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(matches!(res, Err(Error::Cancelled { progress }) if progress < 100));
        assert_eq!(calls, 2);
        // the last node is never reached
        assert!(dataset[dataset.len() - 64..].iter().all(|b| *b == 0));
    }

    #[test]
    fn rejects_unaligned_dataset() {
        let mut dataset = vec![0u8; 100];
        assert!(matches!(
            make_dataset(&mut dataset, &cache()),
            Err(Error::InvalidInput(_))
        ));
    }
}
