// SPDX-License-Identifier: MIT
//
// Offline frame demo — renders two frames to stdout, no serial line needed.
//
// Uses 7-bit controls so any VT100-compatible emulator (xterm, most
// terminals today) interprets the output. The second frame only changes
// the counter and the bar, and the byte counts printed at the end show
// how little goes over the wire for it.
//
// Usage:
//   cargo run -p bluefield-term --example frame

use std::io::{self, Write};

use bluefield_term::cell::{Attr, Charset};
use bluefield_term::protocol::Controls;
use bluefield_term::screen::{Screen, ScreenConfig};

const ROWS: u16 = 8;
const COLS: u16 = 40;

/// A DEC line-drawing box around the screen edge.
fn frame<S: bluefield_term::screen::Sink>(screen: &mut Screen<S>) {
    let inner = usize::from(COLS - 2);
    let top = format!("l{}k", "q".repeat(inner));
    let bottom = format!("m{}j", "q".repeat(inner));
    screen.paint(1, 1, &top, Attr::empty(), Charset::DEC_SPECIAL);
    for y in 2..ROWS {
        screen.paint(y, 1, "x", Attr::empty(), Charset::DEC_SPECIAL);
        screen.paint(y, COLS, "x", Attr::empty(), Charset::DEC_SPECIAL);
    }
    screen.paint(ROWS, 1, &bottom, Attr::empty(), Charset::DEC_SPECIAL);
}

fn progress<S: bluefield_term::screen::Sink>(screen: &mut Screen<S>, done: u16) {
    screen.paint(3, 3, &format!("step {done:>2}/10"), Attr::BOLD, Charset::ASCII);
    let bar = format!("{:<10}", "a".repeat(usize::from(done)));
    screen.paint(5, 3, &bar, Attr::empty(), Charset::DEC_SPECIAL);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut screen = Screen::with_config(
        Vec::new(),
        ScreenConfig {
            rows: ROWS,
            cols: COLS,
            controls: Controls::SevenBit,
        },
    );

    // The emulator's own screen is in an unknown state.
    screen.soft_reset()?;
    screen.set_cursor_visible(false)?;

    frame(&mut screen);
    progress(&mut screen, 3);
    let first = screen.flush()?;

    progress(&mut screen, 4);
    let second = screen.flush()?;

    screen.move_cursor(ROWS, 1)?;
    screen.reset_attributes()?;
    screen.select_charset(Charset::ASCII)?;
    screen.set_cursor_visible(true)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&screen.into_sink())?;
    writeln!(stdout)?;
    writeln!(
        stdout,
        "first frame: {} bytes, second frame: {} bytes",
        first.bytes_written, second.bytes_written
    )?;
    Ok(())
}
