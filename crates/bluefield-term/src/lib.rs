// SPDX-License-Identifier: MIT
//
// bluefield-term — VT220 rendering over a slow serial link.
//
// A double-buffered character screen that sends only what changed, in as
// few bytes as the VT220 command set allows, plus the background pump that
// moves those bytes over a non-blocking transport and turns the bytes
// coming back into key and report tokens.
//
//   grid      1-indexed bounded 2D buffer
//   cell      glyph + rendition + charset
//   buffer    text buffer and `put`
//   protocol  wire encodings of the commands
//   output    output buffer and session-tracking command writer
//   diff      frame differ with run-length erasure
//   screen    the renderer: buffers, flush, direct primitives
//   token     input tokenizer
//   link      background reader/writer thread
//   terminal  link + screen in one handle

pub mod buffer;
pub mod cell;
pub mod diff;
pub mod error;
pub mod grid;
pub mod output;
pub mod protocol;
pub mod screen;
pub mod token;

#[cfg(unix)]
pub mod link;
#[cfg(unix)]
pub mod terminal;

pub use error::{Error, Result};
