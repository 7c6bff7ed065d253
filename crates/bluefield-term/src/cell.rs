// SPDX-License-Identifier: MIT
//
// Cell — one character position on the VT220 screen.
//
// A cell is a plain value: glyph, rendition attributes and the G0 charset
// designator it must be drawn with. Cells are replaced wholesale, never
// patched in place, and compared with the derived `PartialEq` in the
// differ's inner loop (4 + 1 + 1 bytes, padded to 8).
//
// The VT220 only offers additive SGR ("turn bold on") plus a global
// SGR 0, so `Attr` is a set rather than a list of deltas. Going from one
// set to another that is not a superset costs a reset first; see
// `output::SessionWriter::set_attributes`.

use bitflags::bitflags;

// ─── Attributes ──────────────────────────────────────────────────────────────

bitflags! {
    /// Character rendition flags understood by the VT220.
    ///
    /// The declaration order is the order flags are emitted on the wire.
    ///
    /// ```
    /// use bluefield_term::cell::Attr;
    ///
    /// let style = Attr::BOLD | Attr::REVERSE;
    /// assert!(style.contains(Attr::BOLD));
    /// assert!(!style.contains(Attr::BLINK));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 1 — bold.
        const BOLD      = 1 << 0;
        /// SGR 4 — underline.
        const UNDERLINE = 1 << 1;
        /// SGR 5 — blink.
        const BLINK     = 1 << 2;
        /// SGR 7 — reverse video.
        const REVERSE   = 1 << 3;
    }
}

impl Attr {
    /// Parse the single-letter form: `b` bold, `u` underline, `f` flash
    /// (blink), `r` reverse. Returns `None` on any other letter.
    ///
    /// ```
    /// use bluefield_term::cell::Attr;
    ///
    /// assert_eq!(Attr::from_letters("rb"), Some(Attr::BOLD | Attr::REVERSE));
    /// assert_eq!(Attr::from_letters(""), Some(Attr::empty()));
    /// assert_eq!(Attr::from_letters("x"), None);
    /// ```
    #[must_use]
    pub fn from_letters(letters: &str) -> Option<Self> {
        letters.chars().try_fold(Self::empty(), |acc, letter| {
            let flag = match letter {
                'b' => Self::BOLD,
                'u' => Self::UNDERLINE,
                'f' => Self::BLINK,
                'r' => Self::REVERSE,
                _ => return None,
            };
            Some(acc | flag)
        })
    }

    /// SGR parameter for a single flag.
    #[must_use]
    pub(crate) const fn sgr_code(self) -> u8 {
        if self.bits() == Self::BOLD.bits() {
            1
        } else if self.bits() == Self::UNDERLINE.bits() {
            4
        } else if self.bits() == Self::BLINK.bits() {
            5
        } else if self.bits() == Self::REVERSE.bits() {
            7
        } else {
            0
        }
    }
}

// ─── Charset ─────────────────────────────────────────────────────────────────

/// A G0 character set, identified by its SCS final byte (`ESC ( F`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Charset(u8);

impl Charset {
    /// US ASCII, the power-on default.
    pub const ASCII: Self = Self(b'B');
    /// United Kingdom national set.
    pub const UK: Self = Self(b'A');
    /// DEC special graphics (line drawing).
    pub const DEC_SPECIAL: Self = Self(b'0');
    /// DEC supplemental graphics.
    pub const DEC_SUPPLEMENTAL: Self = Self(b'<');

    /// A charset from its designator byte.
    ///
    /// Returns `None` unless `designator` is a valid SCS final byte
    /// (`0x30..=0x7E`).
    #[must_use]
    pub const fn new(designator: u8) -> Option<Self> {
        if designator >= 0x30 && designator <= 0x7E {
            Some(Self(designator))
        } else {
            None
        }
    }

    /// The designator byte sent after `ESC (`.
    #[inline]
    #[must_use]
    pub const fn designator(self) -> u8 {
        self.0
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::ASCII
    }
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// One screen position: glyph, attributes, charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// The character drawn in this position.
    pub glyph: char,
    /// Rendition flags.
    pub attrs: Attr,
    /// G0 charset the glyph is drawn from.
    pub charset: Charset,
}

impl Cell {
    /// The blank cell: space, no attributes, ASCII.
    ///
    /// This is what the erase command leaves behind, so it is the only
    /// cell the differ may produce with an erase instead of a write.
    pub const BLANK: Self = Self {
        glyph: ' ',
        attrs: Attr::empty(),
        charset: Charset::ASCII,
    };

    /// A plain glyph with no attributes in ASCII.
    #[inline]
    #[must_use]
    pub const fn new(glyph: char) -> Self {
        Self {
            glyph,
            attrs: Attr::empty(),
            charset: Charset::ASCII,
        }
    }

    /// A glyph with explicit attributes and charset.
    #[inline]
    #[must_use]
    pub const fn styled(glyph: char, attrs: Attr, charset: Charset) -> Self {
        Self {
            glyph,
            attrs,
            charset,
        }
    }

    /// Whether this cell looks exactly like an erased position.
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        *self == Self::BLANK
    }

    /// The byte transmitted for this glyph.
    ///
    /// Printable ASCII goes out as-is; anything else becomes `?`.
    ///
    /// The renderer's on-terminal record keeps the cell as painted, not the
    /// substitute, so an unchanged non-ASCII cell is not resent on every
    /// flush. What the glass shows for it is always this byte.
    #[inline]
    #[must_use]
    pub const fn wire_byte(&self) -> u8 {
        let cp = self.glyph as u32;
        if cp >= 0x20 && cp < 0x7F { cp as u8 } else { b'?' }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_default() {
        assert_eq!(Cell::default(), Cell::BLANK);
        assert!(Cell::BLANK.is_blank());
        assert!(Cell::new(' ').is_blank());
    }

    #[test]
    fn styled_space_is_not_blank() {
        assert!(!Cell::styled(' ', Attr::REVERSE, Charset::ASCII).is_blank());
        assert!(!Cell::styled(' ', Attr::empty(), Charset::DEC_SPECIAL).is_blank());
        assert!(!Cell::new('x').is_blank());
    }

    #[test]
    fn sgr_codes_match_vt220() {
        assert_eq!(Attr::BOLD.sgr_code(), 1);
        assert_eq!(Attr::UNDERLINE.sgr_code(), 4);
        assert_eq!(Attr::BLINK.sgr_code(), 5);
        assert_eq!(Attr::REVERSE.sgr_code(), 7);
    }

    #[test]
    fn letters_round_out_every_flag() {
        assert_eq!(Attr::from_letters("bufr"), Some(Attr::all()));
        assert_eq!(Attr::from_letters("ff"), Some(Attr::BLINK));
    }

    #[test]
    fn charset_designator_range() {
        assert_eq!(Charset::new(b'B'), Some(Charset::ASCII));
        assert_eq!(Charset::new(b'0'), Some(Charset::DEC_SPECIAL));
        assert_eq!(Charset::new(b' '), None);
        assert_eq!(Charset::new(0x7F), None);
        assert_eq!(Charset::default().designator(), b'B');
    }

    #[test]
    fn wire_byte_replaces_non_ascii() {
        assert_eq!(Cell::new('x').wire_byte(), b'x');
        assert_eq!(Cell::new('~').wire_byte(), b'~');
        assert_eq!(Cell::new('é').wire_byte(), b'?');
        assert_eq!(Cell::new('\t').wire_byte(), b'?');
    }
}
