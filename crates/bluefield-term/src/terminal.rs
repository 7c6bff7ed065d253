// SPDX-License-Identifier: MIT
//
// Terminal — one link and the screen that writes into it.
//
// The screen's sink is the link's outbound queue, so `flush` returns as soon
// as the frame is queued and the background thread trickles it out at
// whatever pace the line allows. Input tokens come back through
// `poll_event`. Closing gives the transport back (or the error that killed
// the link) after a short wait for queued output to drain.

use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::diff::RenderStats;
use crate::error::Result;
use crate::link::{Link, LinkConfig, Outbound};
use crate::screen::{Screen, ScreenConfig};
use crate::token::Token;

/// How long `close` waits for queued output before stopping the link.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A screen bound to a live link.
///
/// # Example
///
/// ```no_run
/// use std::fs::OpenOptions;
/// use bluefield_term::cell::{Attr, Charset};
/// use bluefield_term::terminal::Terminal;
///
/// let tty = OpenOptions::new().read(true).write(true).open("/dev/ttyS0")?;
/// let mut term = Terminal::open(tty)?;
/// term.screen_mut().soft_reset()?;
/// term.screen_mut().paint(1, 1, "READY", Attr::BOLD, Charset::ASCII);
/// term.flush()?;
/// let _tty = term.close()?;
/// # Ok::<(), bluefield_term::Error>(())
/// ```
pub struct Terminal<T> {
    screen: Screen<Outbound>,
    link: Link<T>,
}

impl<T> Terminal<T>
where
    T: Read + Write + AsRawFd + Send + 'static,
{
    /// Open a 24×80 screen over `transport` with default link timing.
    ///
    /// # Errors
    ///
    /// Fails if the link cannot be started.
    pub fn open(transport: T) -> Result<Self> {
        Self::open_with(transport, LinkConfig::default(), ScreenConfig::default())
    }

    /// Open with explicit link and screen configuration.
    ///
    /// # Errors
    ///
    /// Fails if the link cannot be started.
    pub fn open_with(transport: T, link: LinkConfig, screen: ScreenConfig) -> Result<Self> {
        let link = Link::open_with(transport, link)?;
        let screen = Screen::with_config(link.outbound(), screen);
        Ok(Self { screen, link })
    }
}

impl<T> Terminal<T> {
    #[inline]
    #[must_use]
    pub const fn screen(&self) -> &Screen<Outbound> {
        &self.screen
    }

    #[inline]
    pub const fn screen_mut(&mut self) -> &mut Screen<Outbound> {
        &mut self.screen
    }

    #[inline]
    #[must_use]
    pub const fn link(&self) -> &Link<T> {
        &self.link
    }

    /// Queue the difference between desired and displayed content.
    ///
    /// # Errors
    ///
    /// [`Error::LinkClosed`](crate::Error::LinkClosed) once the link is down.
    pub fn flush(&mut self) -> Result<RenderStats> {
        self.screen.flush()
    }

    /// The next input token, if any. Never blocks.
    ///
    /// # Errors
    ///
    /// [`Error::LinkClosed`](crate::Error::LinkClosed) once the link is
    /// down and every received token has been delivered.
    pub fn poll_event(&self) -> Result<Option<Token>> {
        self.link.poll_event()
    }

    /// Let queued output drain (bounded), stop the link and return the
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the link, if one did.
    pub fn close(self) -> Result<T> {
        let Self { screen, link } = self;
        drop(screen);
        if !link.wait_drained(DRAIN_TIMEOUT) {
            log::debug!("closing with {} bytes unsent", link.pending_output());
        }
        link.close()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
