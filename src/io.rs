//! On-disk dataset files.
//!
//! A dataset file is the 8-byte magic number followed by the raw dataset
//! nodes, named after the format revision and the epoch seed. [`prepare`]
//! decides whether an existing file can be reused; every other outcome ends
//! with the caller generating the dataset and handing it to
//! [`DagFile::write_dataset`], which writes the magic number last.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ethereum_types::H256;
use log::{debug, error, warn};

use crate::Error;

/// On-disk format revision, part of every dataset file name.
pub const REVISION: u32 = 23;
pub const DAG_MAGIC_NUM: u64 = 0xFEE1_DEAD_BADD_CAFE;
pub const DAG_MAGIC_NUM_SIZE: u64 = 8;

/// An open dataset file.
#[derive(Debug)]
pub struct DagFile {
    file: File,
    path: PathBuf,
}

/// Result of looking for a usable dataset file.
#[derive(Debug)]
pub enum Prepared {
    /// Right size and magic number: the dataset can be read as-is.
    Match(DagFile),
    /// A file exists with the wrong size and must be recreated.
    SizeMismatch,
    /// Right size, wrong magic number. The file can be overwritten in place.
    ContentMismatch(DagFile),
    /// A fresh file of the final size, waiting for the dataset.
    Created(DagFile),
}

impl Prepared {
    pub fn needs_generation(&self) -> bool {
        !matches!(self, Prepared::Match(_))
    }
}

/// `full-R{revision}-{first 8 seed bytes in hex}`.
pub fn dag_file_name(seed: &H256) -> String {
    let mut head = [0u8; 8];
    head.copy_from_slice(&seed.as_bytes()[..8]);
    format!("full-R{}-{:016x}", REVISION, u64::from_be_bytes(head))
}

pub fn dag_path(dir: &Path, seed: &H256) -> PathBuf {
    dir.join(dag_file_name(seed))
}

fn ensure_dir(dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(dir).map_err(|source| {
        error!("could not create the dataset directory {}: {}", dir.display(), source);
        Error::Io {
            path: dir.to_path_buf(),
            source,
        }
    })
}

/// Look for the dataset file of `seed` in `dir`, creating it when absent.
///
/// With `force_create` any existing file is truncated and recreated. Size
/// and magic mismatches are outcomes, not errors; errors are fatal I/O
/// failures, with [`Error::InsufficientSpace`] when the new file could not be
/// extended to its final size.
pub fn prepare(
    dir: &Path,
    seed: &H256,
    dataset_size: usize,
    force_create: bool,
) -> Result<Prepared, Error> {
    ensure_dir(dir)?;
    let path = dag_path(dir, seed);

    if !force_create {
        if let Ok(file) = OpenOptions::new().read(true).write(true).open(&path) {
            let mut dag = DagFile { file, path };
            let found_size = dag.file_size()?;
            if found_size.checked_sub(DAG_MAGIC_NUM_SIZE) != Some(dataset_size as u64) {
                warn!(
                    "dataset file {} has {} bytes, expected {}",
                    dag.path.display(),
                    found_size,
                    dataset_size as u64 + DAG_MAGIC_NUM_SIZE
                );
                return Ok(Prepared::SizeMismatch);
            }

            let mut magic = [0u8; DAG_MAGIC_NUM_SIZE as usize];
            dag.file.read_exact(&mut magic).map_err(|source| {
                error!("could not read from dataset file {}", dag.path.display());
                Error::Io {
                    path: dag.path.clone(),
                    source,
                }
            })?;
            if u64::from_le_bytes(magic) != DAG_MAGIC_NUM {
                warn!("dataset file {} has a bad magic number", dag.path.display());
                return Ok(Prepared::ContentMismatch(dag));
            }

            debug!("reusing dataset file {}", dag.path.display());
            return Ok(Prepared::Match(dag));
        }
    }

    create_file(path, dataset_size).map(Prepared::Created)
}

/// Create (or truncate) the dataset file of `seed` at its final size.
pub fn create(dir: &Path, seed: &H256, dataset_size: usize) -> Result<DagFile, Error> {
    ensure_dir(dir)?;
    create_file(dag_path(dir, seed), dataset_size)
}

fn create_file(path: PathBuf, dataset_size: usize) -> Result<DagFile, Error> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .map_err(|source| {
            error!("could not create dataset file {}", path.display());
            Error::Io {
                path: path.clone(),
                source,
            }
        })?;

    // Extend to the final size by writing the last byte only, so the data
    // writes that follow never grow the file.
    let last = dataset_size as u64 + DAG_MAGIC_NUM_SIZE - 1;
    let sized = file
        .seek(SeekFrom::Start(last))
        .and_then(|_| file.write_all(b"\n"))
        .and_then(|_| file.flush());
    if let Err(source) = sized {
        error!(
            "could not extend dataset file {} to {} bytes, insufficient space?",
            path.display(),
            last + 1
        );
        return Err(Error::insufficient_space(path)(source));
    }

    debug!("created dataset file {}", path.display());
    Ok(DagFile { file, path })
}

/// Delete the dataset file of `seed`, if there is one.
pub fn remove(dir: &Path, seed: &H256) -> Result<bool, Error> {
    let path = dag_path(dir, seed);
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!("removed dataset file {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(Error::Io { path, source }),
    }
}

impl DagFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> Result<u64, Error> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(Error::io(&self.path))
    }

    /// Read the dataset that follows the magic number into `dataset`.
    pub fn read_dataset(&mut self, dataset: &mut [u8]) -> Result<(), Error> {
        self.file
            .seek(SeekFrom::Start(DAG_MAGIC_NUM_SIZE))
            .and_then(|_| self.file.read_exact(dataset))
            .map_err(Error::io(&self.path))
    }

    /// Write a complete dataset, then the magic number.
    ///
    /// The data is synced before the magic number is written, so an
    /// interrupted write leaves a file [`prepare`] rejects.
    pub fn write_dataset(&mut self, dataset: &[u8]) -> Result<(), Error> {
        let path = self.path.clone();
        let file = &mut self.file;
        file.seek(SeekFrom::Start(DAG_MAGIC_NUM_SIZE))
            .and_then(|_| file.write_all(dataset))
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(&DAG_MAGIC_NUM.to_le_bytes()))
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .map_err(|source| {
                error!("could not write dataset file {}: {}", path.display(), source);
                Error::Io { path, source }
            })
    }
}
