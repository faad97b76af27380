//! Error types for cache, dataset and dataset file operations.

use std::path::PathBuf;

/// Errors produced while building caches and datasets or managing dataset
/// files on disk.
///
/// A dataset file with the wrong size or magic number is not an error: it is
/// reported as an [`io::Prepared`](crate::io::Prepared) outcome so the caller
/// can regenerate it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A cache or dataset buffer could not be allocated.
    #[error("failed to allocate {bytes} bytes")]
    OutOfMemory {
        /// Requested allocation size.
        bytes: usize,
    },

    /// The dataset file could not be extended to its final size.
    #[error("could not size dataset file {path}, insufficient space? {source}")]
    InsufficientSpace {
        /// The dataset file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Any other file system failure.
    #[error("dataset I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The progress callback asked for dataset generation to stop.
    #[error("dataset generation cancelled at {progress}%")]
    Cancelled {
        /// Last progress value reported before cancellation.
        progress: u32,
    },

    /// Cache or dataset size for the block does not fit the size arithmetic.
    #[error("size computation overflows for block {block_number}")]
    SizeOverflow {
        /// The offending block number.
        block_number: u64,
    },

    /// A malformed argument, rejected before any computation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io { path, source }
    }

    pub(crate) fn insufficient_space(
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::InsufficientSpace { path, source }
    }
}
