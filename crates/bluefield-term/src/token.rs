// SPDX-License-Identifier: MIT
//
// Input tokenizer.
//
// Splits the raw byte stream from the terminal into tokens: single bytes
// (ordinary keys, control characters) and control sequences (cursor keys
// and other reports). A sequence starts with an introducer, either the
// C1 byte 0x9B or the 7-bit pair `ESC [`, and runs up to and including
// the first ASCII letter. `CSI A` is cursor up, `CSI 1 B` is one byte
// longer but just as complete.
//
// Sequences regularly straddle reads on a slow line, so the tokenizer
// keeps an internal buffer. Whatever cannot be completed yet stays there
// for the next `advance`. Nothing is ever dropped: a lone ESC is released
// by `flush_escape` once the line has been quiet for a poll interval, and
// an unfinished sequence is handed out by `finish` when the link stops.

use crate::protocol::{CSI, ESC};

// ─── Token ───────────────────────────────────────────────────────────────────

/// One unit of terminal input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A single byte that is not part of a sequence.
    Byte(u8),
    /// A complete control sequence, introducer and final letter included.
    Sequence(Vec<u8>),
    /// The unterminated tail left when the link stopped.
    Incomplete(Vec<u8>),
}

/// A decoded key, for callers that only care about the common cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Cursor up (`CSI A`).
    Up,
    /// Cursor down (`CSI B`).
    Down,
    /// Cursor right (`CSI C`).
    Right,
    /// Cursor left (`CSI D`).
    Left,
    /// Any single byte.
    Char(u8),
    /// Any other sequence.
    Other,
}

impl Token {
    /// The raw bytes of this token.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Byte(b) => std::slice::from_ref(b),
            Self::Sequence(seq) | Self::Incomplete(seq) => seq,
        }
    }

    /// Decode into a [`Key`].
    ///
    /// ```
    /// use bluefield_term::token::{Key, Token};
    ///
    /// assert_eq!(Token::Sequence(b"\x9bA".to_vec()).key(), Key::Up);
    /// assert_eq!(Token::Sequence(b"\x1b[D".to_vec()).key(), Key::Left);
    /// assert_eq!(Token::Byte(b'q').key(), Key::Char(b'q'));
    /// ```
    #[must_use]
    pub fn key(&self) -> Key {
        match self {
            Self::Byte(b) => Key::Char(*b),
            Self::Sequence(seq) => match seq.last() {
                Some(b'A') => Key::Up,
                Some(b'B') => Key::Down,
                Some(b'C') => Key::Right,
                Some(b'D') => Key::Left,
                _ => Key::Other,
            },
            Self::Incomplete(_) => Key::Other,
        }
    }
}

// ─── Tokenizer ───────────────────────────────────────────────────────────────

/// Incremental tokenizer with a carry-over buffer.
#[derive(Debug, Default)]
pub struct Tokenizer {
    pending: Vec<u8>,
}

/// Outcome of scanning the front of the pending buffer.
enum Scan {
    /// A token spanning this many bytes.
    Complete(Token, usize),
    /// The front is the start of something not finished yet.
    NeedMore,
}

impl Tokenizer {
    /// Create an empty tokenizer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Feed bytes and return every token they complete, in order.
    pub fn advance(&mut self, data: &[u8]) -> Vec<Token> {
        self.pending.extend_from_slice(data);

        let mut tokens = Vec::new();
        let mut pos = 0;
        while pos < self.pending.len() {
            match scan(&self.pending[pos..]) {
                Scan::Complete(token, len) => {
                    tokens.push(token);
                    pos += len;
                }
                Scan::NeedMore => break,
            }
        }
        self.pending.drain(..pos);

        tokens
    }

    /// Whether bytes are held back waiting for more input.
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether exactly one ESC is held, waiting to see if `[` follows.
    #[inline]
    #[must_use]
    pub fn holds_escape(&self) -> bool {
        self.pending == [ESC]
    }

    /// Release a lone held ESC as a byte token.
    ///
    /// Called when the line has gone quiet: an ESC with nothing after it
    /// was the Escape key, not the start of `ESC [`. Partial sequences
    /// are left alone.
    pub fn flush_escape(&mut self) -> Option<Token> {
        if self.holds_escape() {
            self.pending.clear();
            Some(Token::Byte(ESC))
        } else {
            None
        }
    }

    /// Hand out whatever is still held, as a final token.
    pub fn finish(&mut self) -> Option<Token> {
        match self.pending.len() {
            0 => None,
            _ if self.pending == [ESC] => {
                self.pending.clear();
                Some(Token::Byte(ESC))
            }
            _ => Some(Token::Incomplete(std::mem::take(&mut self.pending))),
        }
    }
}

/// Classify the front of `buf` (never empty).
fn scan(buf: &[u8]) -> Scan {
    match buf[0] {
        CSI => sequence(buf, 1),
        ESC => match buf.get(1) {
            None => Scan::NeedMore,
            Some(b'[') => sequence(buf, 2),
            Some(_) => Scan::Complete(Token::Byte(ESC), 1),
        },
        b => Scan::Complete(Token::Byte(b), 1),
    }
}

/// A sequence whose body starts at `body`: complete at the first letter.
fn sequence(buf: &[u8], body: usize) -> Scan {
    buf[body..]
        .iter()
        .position(u8::is_ascii_alphabetic)
        .map_or(Scan::NeedMore, |i| {
            let len = body + i + 1;
            Scan::Complete(Token::Sequence(buf[..len].to_vec()), len)
        })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn seq(bytes: &[u8]) -> Token {
        Token::Sequence(bytes.to_vec())
    }

    #[test]
    fn plain_byte_then_sequence() {
        let mut t = Tokenizer::new();
        let tokens = t.advance(b"A\x9b1B");
        assert_eq!(tokens, vec![Token::Byte(b'A'), seq(b"\x9b1B")]);
        assert!(!t.has_pending());
    }

    #[test]
    fn bytes_are_immediate() {
        let mut t = Tokenizer::new();
        assert_eq!(
            t.advance(b"q\r\x03"),
            vec![Token::Byte(b'q'), Token::Byte(b'\r'), Token::Byte(0x03)]
        );
    }

    #[test]
    fn sequence_split_across_reads() {
        let mut t = Tokenizer::new();
        assert!(t.advance(b"\x9b").is_empty());
        assert!(t.advance(b"1").is_empty());
        assert!(t.has_pending());
        assert_eq!(t.advance(b"0Dz"), vec![seq(b"\x9b10D"), Token::Byte(b'z')]);
        assert!(!t.has_pending());
    }

    #[test]
    fn seven_bit_introducer() {
        let mut t = Tokenizer::new();
        assert_eq!(t.advance(b"\x1b[A\x1b[2C"), vec![seq(b"\x1b[A"), seq(b"\x1b[2C")]);
    }

    #[test]
    fn escape_followed_by_other_byte() {
        let mut t = Tokenizer::new();
        assert_eq!(t.advance(b"\x1bx"), vec![Token::Byte(ESC), Token::Byte(b'x')]);
    }

    #[test]
    fn lone_escape_is_held_until_flushed() {
        let mut t = Tokenizer::new();
        assert!(t.advance(b"\x1b").is_empty());
        assert!(t.has_pending());
        assert!(t.holds_escape());
        assert_eq!(t.flush_escape(), Some(Token::Byte(ESC)));
        assert!(!t.has_pending());
        assert_eq!(t.flush_escape(), None);
    }

    #[test]
    fn flush_escape_leaves_partial_sequences() {
        let mut t = Tokenizer::new();
        t.advance(b"\x1b[1");
        assert!(!t.holds_escape());
        assert_eq!(t.flush_escape(), None);
        assert!(t.has_pending());
    }

    #[test]
    fn lone_escape_completed_by_bracket() {
        let mut t = Tokenizer::new();
        t.advance(b"\x1b");
        assert_eq!(t.advance(b"[B"), vec![seq(b"\x1b[B")]);
    }

    #[test]
    fn finish_hands_out_the_tail() {
        let mut t = Tokenizer::new();
        t.advance(b"k\x9b12");
        assert_eq!(t.finish(), Some(Token::Incomplete(b"\x9b12".to_vec())));
        assert_eq!(t.finish(), None);
    }

    #[test]
    fn finish_releases_lone_escape_as_byte() {
        let mut t = Tokenizer::new();
        t.advance(b"\x1b");
        assert_eq!(t.finish(), Some(Token::Byte(ESC)));
    }

    #[test]
    fn keys() {
        assert_eq!(seq(b"\x9bA").key(), Key::Up);
        assert_eq!(seq(b"\x9bB").key(), Key::Down);
        assert_eq!(seq(b"\x9bC").key(), Key::Right);
        assert_eq!(seq(b"\x9bD").key(), Key::Left);
        assert_eq!(seq(b"\x9b?1;2c").key(), Key::Other);
        assert_eq!(Token::Incomplete(vec![CSI]).key(), Key::Other);
    }

    #[test]
    fn as_bytes_round_trips() {
        assert_eq!(Token::Byte(b'x').as_bytes(), b"x");
        assert_eq!(seq(b"\x9bA").as_bytes(), b"\x9bA");
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_tokens(
            data in proptest::collection::vec(
                prop_oneof![Just(CSI), Just(ESC), Just(b'['), Just(b'1'), Just(b'A'), Just(b'x')],
                0..40,
            ),
            split in 0usize..40,
        ) {
            let split = split.min(data.len());

            let mut whole = Tokenizer::new();
            let mut expected = whole.advance(&data);
            expected.extend(whole.finish());

            let mut parts = Tokenizer::new();
            let mut got = parts.advance(&data[..split]);
            got.extend(parts.advance(&data[split..]));
            got.extend(parts.finish());

            prop_assert_eq!(&got, &expected);
            let bytes: Vec<u8> = got.iter().flat_map(|t| t.as_bytes().to_vec()).collect();
            prop_assert_eq!(bytes, data);
        }
    }
}
