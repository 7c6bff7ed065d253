// SPDX-License-Identifier: MIT
//
// Screen — the double-buffered renderer the caller paints into.
//
// Two text buffers of the same size:
//
//   desired      what the caller wants on the glass; painted freely
//   on_terminal  what has been sent, as far as the renderer knows
//
// `flush` diffs the pair, queues the resulting bytes on the sink in one
// `send`, and only then copies `desired` over `on_terminal`. A failed send
// leaves both buffers and the session exactly as they were, so the next
// flush retries the same work.
//
// The direct primitives (cursor, rendition, charset, modes, resets) are
// encoded through the same `SessionWriter` and sent immediately. They are
// skipped when the session says the terminal is already in the requested
// state; `clear`, `reset`, `hard_reset` and `soft_reset` always transmit.

use log::{debug, trace};

use crate::buffer::TextBuffer;
use crate::cell::{Attr, Cell, Charset};
use crate::diff::{self, RenderStats};
use crate::error::{Error, Result};
use crate::output::{Direction, OutputBuffer, Session, SessionWriter};
use crate::protocol::{self, ColumnMode, Controls};

// ─── Sink ────────────────────────────────────────────────────────────────────

/// Where encoded bytes go: a link's outbound queue, or a plain `Vec` in tests.
pub trait Sink {
    /// Queue `bytes` for transmission, all or nothing.
    ///
    /// # Errors
    ///
    /// [`Error::LinkClosed`] (or a transport error) when nothing can be
    /// queued any more.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

impl Sink for Vec<u8> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Screen geometry and control encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenConfig {
    /// Rows. Default: 24.
    pub rows: u16,
    /// Columns. Default: 80.
    pub cols: u16,
    /// How CSI goes on the wire. Default: the 8-bit `0x9B`.
    pub controls: Controls,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            rows: 24,
            cols: 80,
            controls: Controls::EightBit,
        }
    }
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// A double-buffered terminal screen writing into a [`Sink`].
pub struct Screen<S> {
    sink: S,
    writer: SessionWriter,
    desired: TextBuffer,
    on_terminal: TextBuffer,
    scratch: OutputBuffer,
}

impl<S: Sink> Screen<S> {
    /// A 24×80 screen with 8-bit controls.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, ScreenConfig::default())
    }

    /// A screen with explicit geometry and control encoding.
    ///
    /// Both buffers start blank and the session starts at power-on state
    /// (no attributes, ASCII in G0, cursor unknown).
    #[must_use]
    pub fn with_config(sink: S, config: ScreenConfig) -> Self {
        Self {
            sink,
            writer: SessionWriter::new(config.controls, config.rows, config.cols),
            desired: TextBuffer::blank(config.rows, config.cols),
            on_terminal: TextBuffer::blank(config.rows, config.cols),
            scratch: OutputBuffer::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.desired.height()
    }

    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.desired.width()
    }

    /// The buffer the caller paints into.
    #[inline]
    #[must_use]
    pub const fn desired(&self) -> &TextBuffer {
        &self.desired
    }

    #[inline]
    pub const fn desired_mut(&mut self) -> &mut TextBuffer {
        &mut self.desired
    }

    /// What the renderer believes is currently displayed.
    ///
    /// Cells are recorded as painted; a non-ASCII glyph is shown on the
    /// terminal as its [`Cell::wire_byte`] substitute.
    #[inline]
    #[must_use]
    pub const fn on_terminal(&self) -> &TextBuffer {
        &self.on_terminal
    }

    /// The renderer's beliefs about cursor, rendition, charset and modes.
    #[inline]
    #[must_use]
    pub const fn session(&self) -> Session {
        self.writer.session()
    }

    #[inline]
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Give the sink back, dropping both buffers.
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    // ── Painting ────────────────────────────────────────────────────────

    /// Paint `text` into the desired buffer at `(y, x)`. See
    /// [`TextBuffer::put`] for the CR/LF handling and clipping.
    pub fn paint(&mut self, y: u16, x: u16, text: &str, attrs: Attr, charset: Charset) -> usize {
        self.desired.put(y, x, text, attrs, charset)
    }

    /// Overwrite one desired cell.
    ///
    /// # Panics
    ///
    /// Panics if `(y, x)` is outside the screen.
    pub fn set_cell(&mut self, y: u16, x: u16, cell: Cell) {
        self.desired.set(y, x, cell);
    }

    /// Read one desired cell; `None` outside the screen.
    #[must_use]
    pub fn cell(&self, y: u16, x: u16) -> Option<&Cell> {
        self.desired.get(y, x)
    }

    // ── Flush ───────────────────────────────────────────────────────────

    /// Send whatever it takes to make the terminal show `desired`.
    ///
    /// Nothing is sent when the buffers already agree, so calling this on
    /// every tick is cheap.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error; the screen is then left untouched.
    pub fn flush(&mut self) -> Result<RenderStats> {
        let saved = self.writer.session();
        self.scratch.clear();

        let stats = diff::diff(
            &mut self.writer,
            &mut self.scratch,
            &self.on_terminal,
            &self.desired,
        );
        if self.scratch.is_empty() {
            return Ok(stats);
        }

        if let Err(e) = self.sink.send(self.scratch.as_bytes()) {
            self.writer.set_session(saved);
            return Err(e);
        }
        self.on_terminal.copy_from(&self.desired);

        trace!(
            "flush: {} written, {} erased in {} runs, {} bytes",
            stats.cells_written, stats.cells_erased, stats.erase_commands, stats.bytes_written
        );
        Ok(stats)
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    /// Move the cursor to `(y, x)`; nothing is sent if it is already there.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    ///
    /// # Panics
    ///
    /// Panics if `(y, x)` is outside the screen.
    pub fn move_cursor(&mut self, y: u16, x: u16) -> Result<()> {
        assert!(
            self.desired.in_bounds(y, x),
            "cursor ({y}, {x}) outside {}x{} screen",
            self.rows(),
            self.cols(),
        );
        self.emit(|w, out| w.move_to(out, y, x))
    }

    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn cursor_up(&mut self, n: u16) -> Result<()> {
        self.emit(|w, out| w.step(out, Direction::Up, n))
    }

    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn cursor_down(&mut self, n: u16) -> Result<()> {
        self.emit(|w, out| w.step(out, Direction::Down, n))
    }

    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn cursor_right(&mut self, n: u16) -> Result<()> {
        self.emit(|w, out| w.step(out, Direction::Right, n))
    }

    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn cursor_left(&mut self, n: u16) -> Result<()> {
        self.emit(|w, out| w.step(out, Direction::Left, n))
    }

    /// Show or hide the cursor (DECTCEM).
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn set_cursor_visible(&mut self, visible: bool) -> Result<()> {
        self.emit(|w, out| w.cursor_visible(out, visible))
    }

    // ── Rendition ───────────────────────────────────────────────────────

    /// Make `attrs` the active rendition for subsequent output.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn set_attributes(&mut self, attrs: Attr) -> Result<()> {
        self.emit(|w, out| w.set_attributes(out, attrs))
    }

    /// Send SGR 0, whatever the session believes.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn reset_attributes(&mut self) -> Result<()> {
        self.emit(SessionWriter::reset_attributes)
    }

    /// Designate `charset` into G0.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn select_charset(&mut self, charset: Charset) -> Result<()> {
        self.emit(|w, out| w.select_charset(out, charset))
    }

    // ── Modes ───────────────────────────────────────────────────────────

    /// Select 80 or 132 columns.
    ///
    /// This does not resize the buffers.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn set_columns(&mut self, mode: ColumnMode) -> Result<()> {
        self.emit(|w, out| w.columns(out, mode))
    }

    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn set_reverse_video(&mut self, on: bool) -> Result<()> {
        self.emit(|w, out| w.reverse_video(out, on))
    }

    // ── Clear & resets ──────────────────────────────────────────────────

    /// Erase from the cursor to the end of the screen.
    ///
    /// With a known cursor the erased cells are recorded as blank in
    /// `on_terminal`; otherwise the record is left alone.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn clear(&mut self) -> Result<()> {
        self.emit(|_, out| {
            protocol::clear(out).ok();
        })?;
        if let Some(cursor) = self.writer.session().cursor {
            self.blank_from(cursor);
        }
        Ok(())
    }

    /// Soft terminal reset (DECSTR).
    ///
    /// Rendition returns to normal. The charset and cursor visibility become
    /// unknown; the cursor position is kept.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn reset(&mut self) -> Result<()> {
        self.emit(|w, out| {
            protocol::soft_terminal_reset(out, w.controls()).ok();
            w.set_session(Session {
                attrs: Some(Attr::empty()),
                charset: None,
                cursor_visible: None,
                ..w.session()
            });
        })
    }

    /// Reset to initial state (RIS). The terminal clears itself and every
    /// piece of session state becomes unknown.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn hard_reset(&mut self) -> Result<()> {
        self.emit(|w, out| {
            protocol::hard_reset(out).ok();
            w.invalidate();
        })?;
        self.on_terminal.reset();
        debug!("hard reset");
        Ok(())
    }

    /// Bring a terminal in an unknown state back in step with the renderer.
    ///
    /// Sends, unconditionally: 80 columns, ASCII into G0, SGR 0, cursor
    /// home, clear. `on_terminal` becomes blank, so the next flush repaints
    /// everything non-blank in `desired`.
    ///
    /// # Errors
    ///
    /// Propagates the sink's error.
    pub fn soft_reset(&mut self) -> Result<()> {
        self.emit(|w, out| {
            w.invalidate();
            w.columns(out, ColumnMode::Eighty);
            w.select_charset(out, Charset::ASCII);
            w.reset_attributes(out);
            w.move_to(out, 1, 1);
            protocol::clear(out).ok();
        })?;
        self.on_terminal.reset();
        debug!("soft reset ({}x{})", self.rows(), self.cols());
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Encode with `f` and send. The session change made by `f` is rolled
    /// back if the send fails.
    fn emit(&mut self, f: impl FnOnce(&mut SessionWriter, &mut OutputBuffer)) -> Result<()> {
        let saved = self.writer.session();
        self.scratch.clear();
        f(&mut self.writer, &mut self.scratch);
        if self.scratch.is_empty() {
            return Ok(());
        }
        match self.sink.send(self.scratch.as_bytes()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.writer.set_session(saved);
                Err(e)
            }
        }
    }

    /// Record `(y, x)` through the end of the screen as blank.
    fn blank_from(&mut self, (y, x): (u16, u16)) {
        let (rows, cols) = (self.rows(), self.cols());
        for row in y..=rows {
            let first = if row == y { x } else { 1 };
            for col in first..=cols {
                self.on_terminal.set(row, col, Cell::BLANK);
            }
        }
    }
}

impl<S> std::fmt::Debug for Screen<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("rows", &self.desired.height())
            .field("cols", &self.desired.width())
            .field("session", &self.writer.session())
            .finish_non_exhaustive()
    }
}

/// A sink that refuses everything, for callers that want a `Screen` with
/// the link already gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Closed;

impl Sink for Closed {
    fn send(&mut self, _bytes: &[u8]) -> Result<()> {
        Err(Error::LinkClosed)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
