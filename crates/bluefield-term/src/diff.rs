// SPDX-License-Identifier: MIT
//
// Frame differ — turns "what is shown" vs "what is wanted" into bytes.
//
// Rows are scanned top to bottom, columns left to right, so consecutive
// writes land where the terminal cursor already is and cursor positioning
// is mostly skipped. Unchanged rows are detected with one slice compare.
//
// Blank targets are not written one by one. A changed cell whose desired
// content is `Cell::BLANK` opens an erasure run; the run stays open across
// further blank cells (changed or not) and closes at the first cell that
// must show something, or at the end of the row. A closed run becomes one
// ECH covering the span from its first to its last changed cell, so
// clearing a 40-column message costs `CSI 40 X` instead of 40 spaces.
//
// The differ never touches either buffer. It only advances the
// `SessionWriter`'s beliefs; the caller commits the new on-terminal
// state once the bytes have actually been queued.

use crate::buffer::TextBuffer;
use crate::output::{OutputBuffer, SessionWriter};

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// Statistics from one flush, for profiling and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Cells transmitted as glyphs.
    pub cells_written: usize,
    /// Changed cells blanked by erase commands.
    pub cells_erased: usize,
    /// Erase commands emitted.
    pub erase_commands: usize,
    /// Total bytes queued for the link.
    pub bytes_written: usize,
}

impl RenderStats {
    /// Whether the flush changed anything on the terminal.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cells_written == 0 && self.cells_erased == 0
    }
}

// ─── Scan state ──────────────────────────────────────────────────────────────

/// Per-row scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// No run open.
    Idle,
    /// A run of cells to blank, from `start` through `last` (last changed cell).
    Erasing { start: u16, last: u16 },
}

/// Encode everything needed to turn `shown` into `desired`.
///
/// # Panics
///
/// Panics if the buffers have different dimensions.
pub fn diff(
    writer: &mut SessionWriter,
    out: &mut OutputBuffer,
    shown: &TextBuffer,
    desired: &TextBuffer,
) -> RenderStats {
    assert!(
        shown.height() == desired.height() && shown.width() == desired.width(),
        "diff between {}x{} and {}x{} buffers",
        shown.height(),
        shown.width(),
        desired.height(),
        desired.width(),
    );

    let start_len = out.len();
    let mut stats = RenderStats::default();

    for y in 1..=desired.height() {
        let want_row = desired.row(y);
        let have_row = shown.row(y);
        if want_row == have_row {
            continue;
        }

        let mut scan = Scan::Idle;

        for (x, (want, have)) in (1..=desired.width()).zip(want_row.iter().zip(have_row)) {
            if want != have {
                if want.is_blank() {
                    scan = match scan {
                        Scan::Idle => Scan::Erasing { start: x, last: x },
                        Scan::Erasing { start, .. } => Scan::Erasing { start, last: x },
                    };
                    stats.cells_erased += 1;
                } else {
                    close_run(writer, out, y, &mut scan, &mut stats);
                    writer.write_cell(out, y, x, want);
                    stats.cells_written += 1;
                }
            } else if !have.is_blank() {
                close_run(writer, out, y, &mut scan, &mut stats);
            }
        }

        close_run(writer, out, y, &mut scan, &mut stats);
    }

    stats.bytes_written = out.len() - start_len;
    stats
}

/// Emit the open run, if any, and return to `Idle`.
fn close_run(
    writer: &mut SessionWriter,
    out: &mut OutputBuffer,
    y: u16,
    scan: &mut Scan,
    stats: &mut RenderStats,
) {
    if let Scan::Erasing { start, last } = *scan {
        writer.erase(out, y, start, last - start + 1);
        stats.erase_commands += 1;
        *scan = Scan::Idle;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
