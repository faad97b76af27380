use core::fmt;
use core::ops::ControlFlow;
use std::path::Path;

use ethereum_types::{H256, H64};
use log::info;

use crate::cache::Cache;
use crate::hashimoto::{check_full_size, hashimoto_full, hashimoto_light};
use crate::io::{self, DagFile, Prepared};
use crate::Error;

/// Verification context for one epoch: the cache only.
pub struct LightDAG {
    block_number: u64,
    cache: Cache,
}

impl LightDAG {
    /// Build the cache for the epoch of `number`.
    pub fn new(number: u64) -> Result<Self, Error> {
        let cache_size = crate::get_cache_size(number)?;
        let seed = crate::get_seedhash(number);
        let cache = Cache::new(cache_size, seed)?;
        Ok(Self {
            block_number: number,
            cache,
        })
    }

    /// Build the cache from explicit parameters, for `number`'s epoch.
    ///
    /// `cache_size` and `seed` are not checked against `number`; they decide
    /// the cache, `number` decides the dataset size [`hashimoto`] uses and the
    /// blocks the context [`is_valid_for`].
    ///
    /// [`hashimoto`]: LightDAG::hashimoto
    /// [`is_valid_for`]: LightDAG::is_valid_for
    pub fn from_seed(number: u64, cache_size: usize, seed: H256) -> Result<Self, Error> {
        Ok(Self {
            block_number: number,
            cache: Cache::new(cache_size, seed)?,
        })
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn epoch(&self) -> u64 {
        crate::get_epoch(self.block_number)
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn cache_size(&self) -> usize {
        self.cache.size()
    }

    /// Light hashimoto against a dataset of `full_size` bytes.
    pub fn compute(
        &self,
        full_size: usize,
        header_hash: H256,
        nonce: u64,
    ) -> Result<(H256, H256), Error> {
        hashimoto_light(header_hash, nonce, full_size, &self.cache)
    }

    /// Light hashimoto for this context's epoch, with the nonce as it appears
    /// in a block header.
    pub fn hashimoto(&self, hash: H256, nonce: H64) -> Result<(H256, H256), Error> {
        let full_size = crate::get_full_size(self.block_number)?;
        self.compute(full_size, hash, nonce.to_low_u64_be())
    }

    pub fn is_valid_for(&self, number: u64) -> bool {
        crate::get_epoch(number) == self.epoch()
    }
}

impl fmt::Debug for LightDAG {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightDAG")
            .field("block_number", &self.block_number)
            .field("cache_size", &self.cache.size())
            .finish()
    }
}

/// A [`LightDAG`] that could not be turned into a [`FullDAG`].
///
/// The light context comes back untouched and is still owned by the caller.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TransferError {
    pub light: LightDAG,
    #[source]
    pub error: Error,
}

/// Mining context for one epoch: the materialized dataset, the file backing
/// it and the cache it was built from.
pub struct FullDAG {
    light: LightDAG,
    dataset: Vec<u8>,
    file: DagFile,
    file_size: u64,
}

impl FullDAG {
    /// Load the dataset of `seed` from `dir`, or generate it from the cache of
    /// `light` and store it there.
    ///
    /// On success the full context owns `light`. On failure, including
    /// cancellation through `progress`, `light` is returned inside the error
    /// and no valid dataset file is left behind. See
    /// [`make_dataset_with_progress`](crate::make_dataset_with_progress) for
    /// the callback contract.
    pub fn new<F>(
        dir: &Path,
        seed: H256,
        full_size: usize,
        light: LightDAG,
        progress: F,
    ) -> Result<Self, TransferError>
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        match Self::load_or_generate(dir, &seed, full_size, &light.cache, progress) {
            Ok((file, dataset)) => match file.file_size() {
                Ok(file_size) => Ok(Self {
                    light,
                    dataset,
                    file,
                    file_size,
                }),
                Err(error) => Err(TransferError { light, error }),
            },
            Err(error) => Err(TransferError { light, error }),
        }
    }

    fn load_or_generate<F>(
        dir: &Path,
        seed: &H256,
        full_size: usize,
        cache: &Cache,
        progress: F,
    ) -> Result<(DagFile, Vec<u8>), Error>
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        check_full_size(full_size)?;
        let mut file = match io::prepare(dir, seed, full_size, false)? {
            Prepared::Match(mut file) => {
                let mut dataset = crate::alloc_bytes(full_size)?;
                file.read_dataset(&mut dataset)?;
                info!("loaded dataset from {}", file.path().display());
                return Ok((file, dataset));
            }
            Prepared::SizeMismatch => io::create(dir, seed, full_size)?,
            Prepared::ContentMismatch(file) | Prepared::Created(file) => file,
        };

        let mut dataset = crate::alloc_bytes(full_size)?;
        crate::make_dataset_with_progress(&mut dataset, cache, progress)?;
        file.write_dataset(&dataset)?;
        info!("stored dataset in {}", file.path().display());
        Ok((file, dataset))
    }

    /// Full hashimoto by direct dataset lookups.
    pub fn compute(&self, header_hash: H256, nonce: u64) -> Result<(H256, H256), Error> {
        hashimoto_full(header_hash, nonce, &self.dataset)
    }

    pub fn dataset(&self) -> &[u8] {
        &self.dataset
    }

    pub fn full_size(&self) -> usize {
        self.dataset.len()
    }

    /// Size of the backing file, magic number included.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn light(&self) -> &LightDAG {
        &self.light
    }

    /// Release the dataset and file, keeping the cache.
    pub fn into_light(self) -> LightDAG {
        self.light
    }
}

impl fmt::Debug for FullDAG {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullDAG")
            .field("light", &self.light)
            .field("full_size", &self.dataset.len())
            .field("path", &self.file.path())
            .finish()
    }
}

/// Build the full dataset for the epoch of `number` in `dir`, reusing a valid
/// file when one is already there.
pub fn make_dag<F>(number: u64, dir: &Path, progress: F) -> Result<FullDAG, Error>
where
    F: FnMut(u32) -> ControlFlow<()>,
{
    let light = LightDAG::new(number)?;
    let full_size = crate::get_full_size(number)?;
    let seed = crate::get_seedhash(number);
    FullDAG::new(dir, seed, full_size, light, progress).map_err(|e| e.error)
}
