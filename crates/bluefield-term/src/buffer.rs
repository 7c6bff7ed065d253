// SPDX-License-Identifier: MIT
//
// TextBuffer — a grid of cells plus the paint operation.
//
// The renderer keeps two of these: what the terminal is showing and what
// the caller wants it to show. Callers only ever paint into the second;
// the differ is the only writer of the first.

use crate::cell::{Attr, Cell, Charset};
use crate::grid::Grid;

/// A 1-indexed grid of [`Cell`]s, blank-filled.
pub type TextBuffer = Grid<Cell>;

impl Grid<Cell> {
    /// A blank buffer of the given size.
    #[must_use]
    pub fn blank(height: u16, width: u16) -> Self {
        Self::new(height, width, Cell::BLANK)
    }

    /// Paint `text` starting at `(y, x)`.
    ///
    /// Each character becomes `(ch, attrs, charset)` and advances one
    /// column. `\r` returns to column `x`; `\n` moves down one row without
    /// changing the column, so `"ab\r\ncd"` paints a two-line block.
    /// Characters that land outside the buffer are dropped.
    ///
    /// Returns the number of cells written.
    ///
    /// ```
    /// use bluefield_term::buffer::TextBuffer;
    /// use bluefield_term::cell::{Attr, Charset};
    ///
    /// let mut buf = TextBuffer::blank(3, 10);
    /// buf.put(1, 2, "ab\r\ncd", Attr::BOLD, Charset::ASCII);
    /// assert_eq!(buf[(1, 3)].glyph, 'b');
    /// assert_eq!(buf[(2, 2)].glyph, 'c');
    /// ```
    pub fn put(&mut self, y: u16, x: u16, text: &str, attrs: Attr, charset: Charset) -> usize {
        let mut row = u32::from(y);
        let mut col = u32::from(x);
        let mut written = 0;

        for ch in text.chars() {
            match ch {
                '\r' => col = u32::from(x),
                '\n' => row += 1,
                _ => {
                    if let (Ok(cy), Ok(cx)) = (u16::try_from(row), u16::try_from(col)) {
                        if self.in_bounds(cy, cx) {
                            self.set(cy, cx, Cell::styled(ch, attrs, charset));
                            written += 1;
                        }
                    }
                    col += 1;
                }
            }
        }

        written
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row_text(buf: &TextBuffer, y: u16) -> String {
        buf.row(y).iter().map(|c| c.glyph).collect()
    }

    #[test]
    fn put_writes_left_to_right() {
        let mut buf = TextBuffer::blank(2, 6);
        let n = buf.put(1, 2, "abc", Attr::empty(), Charset::ASCII);
        assert_eq!(n, 3);
        assert_eq!(row_text(&buf, 1), " abc  ");
        assert_eq!(row_text(&buf, 2), "      ");
    }

    #[test]
    fn put_stamps_attrs_and_charset() {
        let mut buf = TextBuffer::blank(1, 3);
        buf.put(1, 1, "qq", Attr::REVERSE, Charset::DEC_SPECIAL);
        assert_eq!(
            buf[(1, 1)],
            Cell::styled('q', Attr::REVERSE, Charset::DEC_SPECIAL)
        );
        assert_eq!(buf[(1, 3)], Cell::BLANK);
    }

    #[test]
    fn carriage_return_and_line_feed() {
        let mut buf = TextBuffer::blank(3, 5);
        buf.put(1, 2, "ab\r\ncd\r\nef", Attr::empty(), Charset::ASCII);
        assert_eq!(row_text(&buf, 1), " ab  ");
        assert_eq!(row_text(&buf, 2), " cd  ");
        assert_eq!(row_text(&buf, 3), " ef  ");
    }

    #[test]
    fn bare_line_feed_keeps_column() {
        let mut buf = TextBuffer::blank(2, 5);
        buf.put(1, 1, "ab\ncd", Attr::empty(), Charset::ASCII);
        assert_eq!(row_text(&buf, 1), "ab   ");
        assert_eq!(row_text(&buf, 2), "  cd ");
    }

    #[test]
    fn put_clips_at_edges() {
        let mut buf = TextBuffer::blank(2, 3);
        let n = buf.put(2, 2, "xyz\n!", Attr::empty(), Charset::ASCII);
        assert_eq!(n, 2);
        assert_eq!(row_text(&buf, 2), " xy");
    }

    #[test]
    fn put_leaves_other_cells_alone() {
        let mut buf = TextBuffer::blank(1, 4);
        buf.set(1, 4, Cell::new('#'));
        buf.put(1, 1, "ab", Attr::BOLD, Charset::ASCII);
        assert_eq!(buf[(1, 3)], Cell::BLANK);
        assert_eq!(buf[(1, 4)], Cell::new('#'));
    }
}
