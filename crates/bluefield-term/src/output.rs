// SPDX-License-Identifier: MIT
//
// Output buffering and session-state tracking.
//
// Two components work together to keep the slow link quiet:
//
//   OutputBuffer — accumulates every byte of a frame (or of a primitive)
//   so it reaches the link's outbound queue in one append. A frame is
//   never half-queued.
//
//   SessionWriter — remembers what the terminal currently believes: cursor
//   position, rendition, G0 charset and the three screen modes. Each
//   request is compared with that belief and only emitted when it would
//   change something. A field of `None` means "unknown", which always
//   forces the next request out.
//
// On a 9600 baud line one byte is roughly a millisecond, so every skipped
// `CSI y;xH` is visible latency saved.

use std::io::{self, Write};

use crate::cell::{Attr, Cell, Charset};
use crate::protocol::{self, ColumnMode, Controls};

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// A byte buffer that collects encoded output before it is queued.
///
/// Default capacity is 4 KB, so a full 24×80 repaint with a few attribute
/// changes fits without reallocating.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 4096;

impl OutputBuffer {
    /// Create an empty buffer with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append one byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// What the renderer believes the terminal's state to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Cursor position `(y, x)`, 1-indexed.
    pub cursor: Option<(u16, u16)>,
    /// Active rendition flags.
    pub attrs: Option<Attr>,
    /// Charset designated into G0.
    pub charset: Option<Charset>,
    /// Whether the cursor is shown.
    pub cursor_visible: Option<bool>,
    /// Screen width mode.
    pub columns: Option<ColumnMode>,
    /// Whole-screen reverse video.
    pub reverse_video: Option<bool>,
}

impl Session {
    /// Nothing is known; every request is transmitted.
    pub const UNKNOWN: Self = Self {
        cursor: None,
        attrs: None,
        charset: None,
        cursor_visible: None,
        columns: None,
        reverse_video: None,
    };

    /// Power-on rendition and charset; cursor and modes unknown.
    pub const POWER_ON: Self = Self {
        attrs: Some(Attr::empty()),
        charset: Some(Charset::ASCII),
        ..Self::UNKNOWN
    };
}

impl Default for Session {
    fn default() -> Self {
        Self::POWER_ON
    }
}

// ─── SessionWriter ───────────────────────────────────────────────────────────

/// Emits protocol commands into an [`OutputBuffer`], skipping the ones the
/// tracked [`Session`] says are redundant.
///
/// Writes into `OutputBuffer` cannot fail, so the `io::Result`s from
/// [`protocol`] are discarded with `.ok()`.
pub struct SessionWriter {
    controls: Controls,
    height: u16,
    width: u16,
    session: Session,
}

impl SessionWriter {
    /// A writer for a `height × width` screen, starting from power-on state.
    #[must_use]
    pub const fn new(controls: Controls, height: u16, width: u16) -> Self {
        Self {
            controls,
            height,
            width,
            session: Session::POWER_ON,
        }
    }

    /// The current beliefs.
    #[inline]
    #[must_use]
    pub const fn session(&self) -> Session {
        self.session
    }

    /// Replace the current beliefs wholesale.
    #[inline]
    pub const fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Forget everything; the next request of every kind is transmitted.
    #[inline]
    pub const fn invalidate(&mut self) {
        self.session = Session::UNKNOWN;
    }

    /// The introducer encoding in use.
    #[inline]
    #[must_use]
    pub const fn controls(&self) -> Controls {
        self.controls
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    /// Move to `(y, x)` unless the cursor is already there.
    pub fn move_to(&mut self, out: &mut OutputBuffer, y: u16, x: u16) {
        if self.session.cursor != Some((y, x)) {
            protocol::cursor_to(out, self.controls, y, x).ok();
            self.session.cursor = Some((y, x));
        }
    }

    /// Relative motion, clamped to the screen. `n == 0` emits nothing.
    pub fn step(&mut self, out: &mut OutputBuffer, dir: Direction, n: u16) {
        if n == 0 {
            return;
        }
        let c = self.controls;
        match dir {
            Direction::Up => protocol::cursor_up(out, c, n),
            Direction::Down => protocol::cursor_down(out, c, n),
            Direction::Right => protocol::cursor_right(out, c, n),
            Direction::Left => protocol::cursor_left(out, c, n),
        }
        .ok();

        let (height, width) = (self.height.max(1), self.width.max(1));
        self.session.cursor = self.session.cursor.map(|(y, x)| match dir {
            Direction::Up => (y.saturating_sub(n).max(1), x),
            Direction::Down => (y.saturating_add(n).min(height), x),
            Direction::Right => (y, x.saturating_add(n).min(width)),
            Direction::Left => (y, x.saturating_sub(n).max(1)),
        });
    }

    /// Show or hide the cursor unless it is already in that state.
    pub fn cursor_visible(&mut self, out: &mut OutputBuffer, visible: bool) {
        if self.session.cursor_visible != Some(visible) {
            protocol::cursor_visible(out, self.controls, visible).ok();
            self.session.cursor_visible = Some(visible);
        }
    }

    // ── Rendition ───────────────────────────────────────────────────────

    /// Make `attrs` the active rendition.
    ///
    /// The VT220 can only turn flags on, or everything off. When `attrs`
    /// is a superset of the active set only the missing flags are sent;
    /// otherwise (or when the active set is unknown) the sequence starts
    /// with a reset.
    pub fn set_attributes(&mut self, out: &mut OutputBuffer, attrs: Attr) {
        match self.session.attrs {
            Some(current) if current == attrs => {}
            Some(current) if attrs.contains(current) => {
                protocol::sgr(out, self.controls, false, attrs - current).ok();
            }
            _ => {
                protocol::sgr(out, self.controls, true, attrs).ok();
            }
        }
        self.session.attrs = Some(attrs);
    }

    /// Unconditionally send SGR 0.
    pub fn reset_attributes(&mut self, out: &mut OutputBuffer) {
        protocol::sgr(out, self.controls, true, Attr::empty()).ok();
        self.session.attrs = Some(Attr::empty());
    }

    /// Designate `charset` into G0 unless it is already there.
    pub fn select_charset(&mut self, out: &mut OutputBuffer, charset: Charset) {
        if self.session.charset != Some(charset) {
            protocol::charset(out, charset).ok();
            self.session.charset = Some(charset);
        }
    }

    // ── Content ─────────────────────────────────────────────────────────

    /// Draw `cell` at `(y, x)`, emitting only the state changes it needs.
    pub fn write_cell(&mut self, out: &mut OutputBuffer, y: u16, x: u16, cell: &Cell) {
        self.move_to(out, y, x);
        self.set_attributes(out, cell.attrs);
        self.select_charset(out, cell.charset);
        out.push(cell.wire_byte());
        // The terminal parks the cursor on the last column instead of wrapping.
        self.session.cursor = Some((y, x.saturating_add(1).min(self.width)));
    }

    /// Blank `len` cells starting at `(y, x)` with a single erase.
    ///
    /// ECH fills with the current rendition, so any active attributes are
    /// cleared first. The cursor does not move.
    pub fn erase(&mut self, out: &mut OutputBuffer, y: u16, x: u16, len: u16) {
        if len == 0 {
            return;
        }
        self.move_to(out, y, x);
        self.set_attributes(out, Attr::empty());
        protocol::erase_chars(out, self.controls, len).ok();
    }

    // ── Modes ───────────────────────────────────────────────────────────

    /// Select the column mode unless it is already active.
    pub fn columns(&mut self, out: &mut OutputBuffer, mode: ColumnMode) {
        if self.session.columns != Some(mode) {
            protocol::columns(out, self.controls, mode).ok();
            self.session.columns = Some(mode);
        }
    }

    /// Switch whole-screen reverse video unless it is already in that state.
    pub fn reverse_video(&mut self, out: &mut OutputBuffer, on: bool) {
        if self.session.reverse_video != Some(on) {
            protocol::reverse_video(out, self.controls, on).ok();
            self.session.reverse_video = Some(on);
        }
    }
}

/// Direction of a relative cursor motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards row 1.
    Up,
    /// Towards the last row.
    Down,
    /// Towards the last column.
    Right,
    /// Towards column 1.
    Left,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
