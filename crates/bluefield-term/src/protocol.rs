// SPDX-License-Identifier: MIT
//
// VT220 wire encoding.
//
// Pure functions that write control sequences to any `impl Write`. No
// state and no decisions about when to emit; `output::SessionWriter` owns
// that. This module only knows the bytes.
//
// Coordinates are 1-indexed here exactly as on the wire, because the
// buffers are 1-indexed too.
//
// The control-sequence introducer is either the single C1 byte 0x9B (the
// VT220's native 8-bit form) or the 7-bit pair `ESC [`. Sequences that are
// defined with a literal ESC (charset select, clear, hard reset) use ESC
// in both modes.

use std::io::{self, Write};

use crate::cell::{Attr, Charset};

/// Escape.
pub const ESC: u8 = 0x1B;

/// 8-bit control-sequence introducer.
pub const CSI: u8 = 0x9B;

// ─── Controls ────────────────────────────────────────────────────────────────

/// How the control-sequence introducer is transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Controls {
    /// Single byte `0x9B`.
    #[default]
    EightBit,
    /// Two bytes `ESC [`.
    SevenBit,
}

impl Controls {
    /// The introducer bytes.
    #[inline]
    #[must_use]
    pub const fn csi(self) -> &'static [u8] {
        match self {
            Self::EightBit => &[CSI],
            Self::SevenBit => &[ESC, b'['],
        }
    }
}

/// DECCOLM screen width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMode {
    /// 80 columns (`CSI ? 3 l`).
    Eighty,
    /// 132 columns (`CSI ? 3 h`).
    Wide,
}

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Absolute cursor position (CUP).
#[inline]
pub fn cursor_to(w: &mut impl Write, c: Controls, y: u16, x: u16) -> io::Result<()> {
    w.write_all(c.csi())?;
    write!(w, "{y};{x}H")
}

/// Relative cursor motion: `A` up, `B` down, `C` right, `D` left.
///
/// The count is omitted when it is 1 (the terminal's default).
fn cursor_step(w: &mut impl Write, c: Controls, n: u16, dir: u8) -> io::Result<()> {
    w.write_all(c.csi())?;
    if n != 1 {
        write!(w, "{n}")?;
    }
    w.write_all(&[dir])
}

/// Cursor up `n` rows (CUU).
#[inline]
pub fn cursor_up(w: &mut impl Write, c: Controls, n: u16) -> io::Result<()> {
    cursor_step(w, c, n, b'A')
}

/// Cursor down `n` rows (CUD).
#[inline]
pub fn cursor_down(w: &mut impl Write, c: Controls, n: u16) -> io::Result<()> {
    cursor_step(w, c, n, b'B')
}

/// Cursor right `n` columns (CUF).
#[inline]
pub fn cursor_right(w: &mut impl Write, c: Controls, n: u16) -> io::Result<()> {
    cursor_step(w, c, n, b'C')
}

/// Cursor left `n` columns (CUB).
#[inline]
pub fn cursor_left(w: &mut impl Write, c: Controls, n: u16) -> io::Result<()> {
    cursor_step(w, c, n, b'D')
}

/// Show or hide the cursor (DECTCEM).
#[inline]
pub fn cursor_visible(w: &mut impl Write, c: Controls, visible: bool) -> io::Result<()> {
    w.write_all(c.csi())?;
    w.write_all(if visible { b"?25h" } else { b"?25l" })
}

// ─── Rendition ───────────────────────────────────────────────────────────────

/// Select graphic rendition.
///
/// With `reset` the list starts with `0`, turning everything off before
/// the flags in `attrs` are turned on. Flags go out in declaration order:
/// `CSI 0;1;7m` for a reset followed by bold and reverse.
pub fn sgr(w: &mut impl Write, c: Controls, reset: bool, attrs: Attr) -> io::Result<()> {
    w.write_all(c.csi())?;
    let mut first = true;
    if reset {
        w.write_all(b"0")?;
        first = false;
    }
    for flag in attrs.iter() {
        if !first {
            w.write_all(b";")?;
        }
        write!(w, "{}", flag.sgr_code())?;
        first = false;
    }
    w.write_all(b"m")
}

/// Designate `charset` into G0 (SCS).
#[inline]
pub fn charset(w: &mut impl Write, charset: Charset) -> io::Result<()> {
    w.write_all(&[ESC, b'(', charset.designator()])
}

// ─── Erasing ─────────────────────────────────────────────────────────────────

/// Erase `n` characters from the cursor, without moving it (ECH).
#[inline]
pub fn erase_chars(w: &mut impl Write, c: Controls, n: u16) -> io::Result<()> {
    w.write_all(c.csi())?;
    write!(w, "{n}X")
}

/// Erase from the cursor to the end of the screen (ED 0).
#[inline]
pub fn clear(w: &mut impl Write) -> io::Result<()> {
    w.write_all(&[ESC, b'[', b'J'])
}

// ─── Modes & Resets ──────────────────────────────────────────────────────────

/// Soft terminal reset (DECSTR).
#[inline]
pub fn soft_terminal_reset(w: &mut impl Write, c: Controls) -> io::Result<()> {
    w.write_all(c.csi())?;
    w.write_all(b"!p")
}

/// Reset to initial state (RIS).
#[inline]
pub fn hard_reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(&[ESC, b'c'])
}

/// Select 80 or 132 columns (DECCOLM).
#[inline]
pub fn columns(w: &mut impl Write, c: Controls, mode: ColumnMode) -> io::Result<()> {
    w.write_all(c.csi())?;
    w.write_all(match mode {
        ColumnMode::Eighty => b"?3l",
        ColumnMode::Wide => b"?3h",
    })
}

/// Whole-screen reverse video (DECSCNM).
#[inline]
pub fn reverse_video(w: &mut impl Write, c: Controls, on: bool) -> io::Result<()> {
    w.write_all(c.csi())?;
    w.write_all(if on { b"?5h" } else { b"?5l" })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
