// SPDX-License-Identifier: MIT
//
// bluefield — a small console driving a VT220 over a serial line.
//
// Opens the device named on the command line (already configured for the
// right baud rate and raw mode), soft-resets the terminal and runs a tick
// loop: drain input tokens, repaint the desired buffer from scratch, flush.
// Only the differences go over the wire, so an idle screen costs nothing.
//
// Layout (24×80 by default):
//
//   ┌──────────────────────────────┐
//   │ title bar (REVERSE)          │  row 1
//   ├──────────────────────────────┤  row 2, DEC line drawing
//   │ field with a movable marker  │  arrow keys move `@`
//   ├──────────────────────────────┤
//   │ last few input tokens        │  LOG_ROWS rows
//   └──────────────────────────────┘
//
// `q` quits. RUST_LOG=debug shows link and reset activity on stderr.

use std::collections::VecDeque;
use std::env;
use std::fs::OpenOptions;
use std::path::Path;
use std::process;
use std::thread;
use std::time::Duration;

use bluefield_term::cell::{Attr, Charset};
use bluefield_term::screen::{Screen, Sink};
use bluefield_term::terminal::Terminal;
use bluefield_term::token::{Key, Token};

/// Frame cadence. The link is slow; there is no point painting faster.
const TICK: Duration = Duration::from_millis(50);

/// Rows reserved at the bottom for the token log.
const LOG_ROWS: u16 = 3;

/// First row of the marker field (below the title and its rule).
const FIELD_TOP: u16 = 3;

// ─── Console ────────────────────────────────────────────────────────────────

/// Demo state: where the marker is and what was typed recently.
struct Console {
    rows: u16,
    cols: u16,
    marker: (u16, u16),
    log: VecDeque<String>,
    quit: bool,
}

impl Console {
    fn new(rows: u16, cols: u16) -> Self {
        let mut console = Self {
            rows,
            cols,
            marker: (FIELD_TOP, 1),
            log: VecDeque::with_capacity(LOG_ROWS as usize),
            quit: false,
        };
        console.marker = ((FIELD_TOP + console.field_bottom()) / 2, cols.div_ceil(2));
        console
    }

    /// Last row of the marker field; the rule above the log sits below it.
    fn field_bottom(&self) -> u16 {
        self.rows.saturating_sub(LOG_ROWS + 1).max(FIELD_TOP)
    }

    fn on_token(&mut self, token: &Token) {
        let (y, x) = self.marker;
        match token.key() {
            Key::Up => self.marker.0 = y.saturating_sub(1).max(FIELD_TOP),
            Key::Down => self.marker.0 = (y + 1).min(self.field_bottom()),
            Key::Left => self.marker.1 = x.saturating_sub(1).max(1),
            Key::Right => self.marker.1 = (x + 1).min(self.cols),
            Key::Char(b'q') => self.quit = true,
            Key::Char(_) | Key::Other => {}
        }

        if self.log.len() == LOG_ROWS as usize {
            self.log.pop_front();
        }
        self.log.push_back(describe(token));
    }

    /// Repaint the whole desired buffer. The differ works out what changed.
    fn paint<S: Sink>(&self, screen: &mut Screen<S>) {
        let width = usize::from(self.cols);
        screen.desired_mut().reset();

        let title = format!("{:<width$}", " bluefield  (arrows move, q quits)");
        screen.paint(1, 1, &title, Attr::REVERSE, Charset::ASCII);

        // `q` is the horizontal line in the DEC special graphics set.
        let rule = "q".repeat(width);
        screen.paint(2, 1, &rule, Attr::empty(), Charset::DEC_SPECIAL);
        screen.paint(self.field_bottom() + 1, 1, &rule, Attr::empty(), Charset::DEC_SPECIAL);

        let (y, x) = self.marker;
        screen.paint(y, x, "@", Attr::BOLD, Charset::ASCII);

        let log_top = self.field_bottom() + 2;
        for (row, line) in (log_top..).zip(&self.log) {
            screen.paint(row, 1, line, Attr::empty(), Charset::ASCII);
        }
    }
}

/// One log line for a token.
fn describe(token: &Token) -> String {
    let hex = |bytes: &[u8]| {
        bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    match token {
        Token::Byte(b) if b.is_ascii_graphic() => format!("key '{}'", char::from(*b)),
        Token::Byte(b) => format!("byte {b:02X}"),
        Token::Sequence(seq) => format!("sequence {} ({:?})", hex(seq), token.key()),
        Token::Incomplete(seq) => format!("incomplete {}", hex(seq)),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn run(path: &Path) -> bluefield_term::Result<()> {
    let device = OpenOptions::new().read(true).write(true).open(path)?;
    let mut term = Terminal::open(device)?;
    log::info!("opened {}", path.display());

    term.screen_mut().soft_reset()?;
    term.screen_mut().set_cursor_visible(false)?;

    let mut console = Console::new(term.screen().rows(), term.screen().cols());

    while !console.quit {
        while let Some(token) = term.poll_event()? {
            console.on_token(&token);
        }
        console.paint(term.screen_mut());
        let stats = term.flush()?;
        if !stats.is_empty() {
            log::trace!("frame: {} bytes", stats.bytes_written);
        }
        thread::sleep(TICK);
    }

    term.screen_mut().soft_reset()?;
    term.screen_mut().set_cursor_visible(true)?;
    term.close()?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Some(path) = env::args_os().nth(1) else {
        eprintln!("usage: bluefield <device>");
        process::exit(2);
    };

    if let Err(e) = run(Path::new(&path)) {
        eprintln!("bluefield: {e}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bluefield_term::cell::Cell;
    use bluefield_term::screen::ScreenConfig;

    fn screen() -> Screen<Vec<u8>> {
        Screen::with_config(Vec::new(), ScreenConfig::default())
    }

    fn seq(bytes: &[u8]) -> Token {
        Token::Sequence(bytes.to_vec())
    }

    #[test]
    fn marker_starts_centred() {
        let console = Console::new(24, 80);
        assert_eq!(console.field_bottom(), 20);
        assert_eq!(console.marker, (11, 40));
    }

    #[test]
    fn arrows_move_marker_within_field() {
        let mut console = Console::new(24, 80);
        for _ in 0..50 {
            console.on_token(&seq(b"\x9bA"));
        }
        assert_eq!(console.marker.0, FIELD_TOP);
        for _ in 0..100 {
            console.on_token(&seq(b"\x1b[C"));
        }
        assert_eq!(console.marker, (FIELD_TOP, 80));
        console.on_token(&seq(b"\x9bB"));
        console.on_token(&seq(b"\x9bD"));
        assert_eq!(console.marker, (FIELD_TOP + 1, 79));
    }

    #[test]
    fn q_quits() {
        let mut console = Console::new(24, 80);
        console.on_token(&Token::Byte(b'x'));
        assert!(!console.quit);
        console.on_token(&Token::Byte(b'q'));
        assert!(console.quit);
    }

    #[test]
    fn log_keeps_last_lines() {
        let mut console = Console::new(24, 80);
        for b in b"abcde" {
            console.on_token(&Token::Byte(*b));
        }
        assert_eq!(console.log, ["key 'c'", "key 'd'", "key 'e'"]);
    }

    #[test]
    fn describe_tokens() {
        assert_eq!(describe(&Token::Byte(b'z')), "key 'z'");
        assert_eq!(describe(&Token::Byte(0x1b)), "byte 1B");
        assert_eq!(describe(&seq(b"\x9bA")), "sequence 9B 41 (Up)");
        assert_eq!(
            describe(&Token::Incomplete(b"\x9b1".to_vec())),
            "incomplete 9B 31"
        );
    }

    #[test]
    fn paint_layout() {
        let console = Console::new(24, 80);
        let mut screen = screen();
        console.paint(&mut screen);

        let d = screen.desired();
        assert_eq!(d[(1, 2)], Cell::styled('b', Attr::REVERSE, Charset::ASCII));
        assert_eq!(d[(1, 80)], Cell::styled(' ', Attr::REVERSE, Charset::ASCII));
        assert_eq!(d[(2, 1)], Cell::styled('q', Attr::empty(), Charset::DEC_SPECIAL));
        assert_eq!(d[(21, 80)], Cell::styled('q', Attr::empty(), Charset::DEC_SPECIAL));
        assert_eq!(d[(11, 40)], Cell::styled('@', Attr::BOLD, Charset::ASCII));
    }

    #[test]
    fn idle_frames_send_nothing() {
        let mut console = Console::new(24, 80);
        let mut screen = screen();
        console.paint(&mut screen);
        assert!(!screen.flush().unwrap().is_empty());

        console.paint(&mut screen);
        assert!(screen.flush().unwrap().is_empty());

        console.on_token(&seq(b"\x9bC"));
        console.paint(&mut screen);
        let stats = screen.flush().unwrap();
        // The old marker is erased; spaces in the log line were blank already.
        assert_eq!(stats.cells_erased, 1);
        assert_eq!(stats.cells_written, 1 + "sequence9B43(Right)".len());
    }
}
