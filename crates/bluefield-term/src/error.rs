// SPDX-License-Identifier: MIT
//
// Error type shared by every fallible operation in the crate.
//
// Out-of-range grid indexing is deliberately absent: it is a programming
// error and panics at the call site. Everything here is a runtime
// condition the caller can reasonably react to.

use std::io;

use thiserror::Error;

/// Errors produced by the link runtime, the renderer and grid construction.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport failed while reading, writing or polling.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport reported end-of-file (the far side went away).
    #[error("transport disconnected")]
    Disconnected,

    /// The link's background task is no longer running.
    #[error("link closed")]
    LinkClosed,

    /// Grid rows supplied from external data were not all the same width.
    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRows {
        /// 1-indexed row that broke the shape.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },

    /// Grid rows supplied from external data exceed the addressable size.
    #[error("{rows}x{cols} does not fit a 16-bit addressable grid")]
    TooLarge {
        /// Number of rows supplied.
        rows: usize,
        /// Number of columns in the first row.
        cols: usize,
    },
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
