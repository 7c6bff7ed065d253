// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Link runtime — the background pump between the caller and the wire.
//
// A dedicated thread owns the transport (a serial device, a socket, any
// pollable fd). Each iteration it polls for readability, and for
// writability only when output is queued, with a bounded timeout so a
// stop request is noticed promptly.
//
//   Write side: up to `write_chunk` bytes from the front of the outbound
//   queue go to one `write()`. Whatever the transport accepts is trimmed
//   from the queue; a short write is normal on a slow line and the rest
//   goes next time.
//
//   Read side: bytes go through the `Tokenizer` and complete tokens are
//   sent, in arrival order, down an unbounded channel the caller drains
//   with `poll_event`.
//
// Shared state is exactly two things: the outbound queue (appended by the
// caller, trimmed by the thread, behind one mutex with a condvar signalled
// when it empties) and the event channel. The thread clears the live flag
// under the queue lock, so a send either lands before the thread exits or
// fails.
// The caller never waits on the thread. A self-pipe wakes the poll when
// output is queued or a stop is requested, so neither waits out the
// timeout.
//
// A transport error or end-of-file ends the thread. The error is kept as
// the thread's result for `close`, and every later operation reports
// `Error::LinkClosed`.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::screen::Sink;
use crate::token::{Token, Tokenizer};

// ─── Config ──────────────────────────────────────────────────────────────────

/// Timing and buffer sizes for the background thread.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    /// Upper bound on one poll; also the quiet time after which a lone
    /// ESC is released as the Escape key. Default: 500 ms.
    pub poll_timeout: Duration,
    /// Bytes requested per `read()`. Default: 4096.
    pub read_chunk: usize,
    /// Most bytes offered per `write()`. Default: 4096.
    pub write_chunk: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(500),
            read_chunk: 4096,
            write_chunk: 4096,
        }
    }
}

// ─── Shared state ────────────────────────────────────────────────────────────

struct Shared {
    live: AtomicBool,
    outbound: Mutex<Vec<u8>>,
    /// Signalled when the queue empties or the thread exits.
    drained: Condvar,
    /// Write end of the self-pipe.
    wake: File,
}

impl Shared {
    fn outbound(&self) -> MutexGuard<'_, Vec<u8>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Nudge the thread out of `poll`. A full pipe already means "awake".
    fn wake(&self) {
        let _ = (&self.wake).write(&[1]);
    }

    fn push(&self, bytes: &[u8]) -> Result<()> {
        {
            let mut queue = self.outbound();
            if !self.is_live() {
                return Err(Error::LinkClosed);
            }
            queue.extend_from_slice(bytes);
        }
        if !bytes.is_empty() {
            self.wake();
        }
        Ok(())
    }

    /// Mark the link dead. Taking the queue lock orders this against `push`.
    fn shut(&self) {
        let _queue = self.outbound();
        self.live.store(false, Ordering::Release);
        self.drained.notify_all();
    }
}

// ─── Outbound ────────────────────────────────────────────────────────────────

/// A cloneable handle for queueing bytes on a [`Link`].
///
/// This is the [`Sink`] a [`Screen`](crate::screen::Screen) writes into.
#[derive(Clone)]
pub struct Outbound {
    shared: Arc<Shared>,
}

impl Outbound {
    /// Bytes queued but not yet accepted by the transport.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.outbound().len()
    }
}

impl Sink for Outbound {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.shared.push(bytes)
    }
}

// ─── Link ────────────────────────────────────────────────────────────────────

/// An open link: a transport pumped by a background thread.
///
/// # Example
///
/// ```no_run
/// use std::fs::OpenOptions;
/// use bluefield_term::link::Link;
///
/// let tty = OpenOptions::new().read(true).write(true).open("/dev/ttyUSB0")?;
/// let link = Link::open(tty)?;
/// link.send_raw(b"\x1b[J")?;
/// while let Some(token) = link.poll_event()? {
///     println!("{token:?}");
/// }
/// let _tty = link.close()?;
/// # Ok::<(), bluefield_term::Error>(())
/// ```
pub struct Link<T> {
    shared: Arc<Shared>,
    events: Receiver<Token>,
    handle: Option<JoinHandle<Result<T>>>,
}

impl<T> Link<T>
where
    T: Read + Write + AsRawFd + Send + 'static,
{
    /// Open with the default [`LinkConfig`].
    ///
    /// # Errors
    ///
    /// Fails if the transport cannot be made non-blocking or the thread
    /// cannot be spawned.
    pub fn open(transport: T) -> Result<Self> {
        Self::open_with(transport, LinkConfig::default())
    }

    /// Switch `transport` to non-blocking mode and start the pump.
    ///
    /// # Errors
    ///
    /// Fails if the transport cannot be made non-blocking, the wake pipe
    /// cannot be created, or the thread cannot be spawned.
    pub fn open_with(transport: T, config: LinkConfig) -> Result<Self> {
        set_nonblocking(transport.as_raw_fd())?;
        let (wake_rx, wake_tx) = wake_pipe()?;

        let (tx, events) = mpsc::channel();
        let shared = Arc::new(Shared {
            live: AtomicBool::new(true),
            outbound: Mutex::new(Vec::new()),
            drained: Condvar::new(),
            wake: wake_tx,
        });
        let worker = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("bluefield-link".into())
            .spawn(move || {
                let result = pump(transport, &worker, &wake_rx, &tx, config);
                worker.shut();
                result
            })?;

        debug!("link opened (poll timeout {:?})", config.poll_timeout);

        Ok(Self {
            shared,
            events,
            handle: Some(handle),
        })
    }
}

impl<T> Link<T> {
    /// A handle for queueing output.
    #[must_use]
    pub fn outbound(&self) -> Outbound {
        Outbound {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Queue raw bytes for transmission.
    ///
    /// # Errors
    ///
    /// [`Error::LinkClosed`] once the background thread has stopped.
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        self.shared.push(bytes)
    }

    /// The next input token, if one is waiting.
    ///
    /// `Ok(None)` is the normal "nothing yet" answer. Tokens received
    /// before the thread stopped are still delivered; after that this
    /// returns [`Error::LinkClosed`].
    ///
    /// # Errors
    ///
    /// [`Error::LinkClosed`] when the thread has stopped and every token
    /// has been drained.
    pub fn poll_event(&self) -> Result<Option<Token>> {
        match self.events.try_recv() {
            Ok(token) => Ok(Some(token)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::LinkClosed),
        }
    }

    /// Whether the background thread is still running.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.shared.is_live()
    }

    /// Bytes queued but not yet accepted by the transport.
    #[must_use]
    pub fn pending_output(&self) -> usize {
        self.shared.outbound().len()
    }

    /// Wait until the outbound queue is empty, the link dies, or `timeout`
    /// passes. Returns whether the queue drained.
    #[must_use]
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.outbound();
        while !queue.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.is_live() || remaining.is_zero() {
                return false;
            }
            queue = self
                .shared
                .drained
                .wait_timeout(queue, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Stop the thread and hand back the transport.
    ///
    /// Unsent output is discarded; call [`wait_drained`](Self::wait_drained)
    /// first to avoid that.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the thread, if one did.
    pub fn close(mut self) -> Result<T> {
        self.stop();
        let handle = self.handle.take().ok_or(Error::LinkClosed)?;
        handle.join().map_err(|_| Error::LinkClosed)?
    }

    fn stop(&self) {
        self.shared.shut();
        self.shared.wake();
    }
}

impl<T> Drop for Link<T> {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ─── Background thread ───────────────────────────────────────────────────────

/// The thread body. Returns the transport on an orderly stop.
fn pump<T: Read + Write + AsRawFd>(
    mut transport: T,
    shared: &Shared,
    wake: &File,
    tx: &Sender<Token>,
    config: LinkConfig,
) -> Result<T> {
    let fd = transport.as_raw_fd();
    let mut tokenizer = Tokenizer::new();
    let mut read_buf = vec![0u8; config.read_chunk.max(1)];
    let mut last_read = Instant::now();

    let result = loop {
        if !shared.is_live() {
            break Ok(());
        }

        // A held ESC must come out one quiet interval after the last read,
        // however busy the write side keeps the poll.
        let wait = if tokenizer.holds_escape() {
            config.poll_timeout.saturating_sub(last_read.elapsed())
        } else {
            config.poll_timeout
        };

        let want_write = !shared.outbound().is_empty();
        let ready = match poll(fd, wake.as_raw_fd(), want_write, timeout_ms(wait)) {
            Ok(ready) => ready,
            Err(e) => break Err(Error::Io(e)),
        };

        if ready.woken {
            drain_wake(wake);
        }

        if ready.failed && !ready.readable {
            break Err(Error::Io(io::Error::other("transport reported an error condition")));
        }

        if ready.writable {
            if let Err(e) = write_some(&mut transport, shared, config.write_chunk) {
                break Err(e);
            }
        }

        if ready.readable {
            let n = match read_some(&mut transport, &mut read_buf) {
                Ok(n) => n,
                Err(e) => break Err(e),
            };
            if n > 0 {
                last_read = Instant::now();
            }
            let tokens = tokenizer.advance(&read_buf[..n]);
            trace!("link read {n} bytes, {} tokens", tokens.len());
            if tokens.into_iter().any(|token| tx.send(token).is_err()) {
                break Ok(());
            }
        }

        if last_read.elapsed() >= config.poll_timeout {
            if let Some(token) = tokenizer.flush_escape() {
                if tx.send(token).is_err() {
                    break Ok(());
                }
            }
        }
    };

    if let Some(tail) = tokenizer.finish() {
        let _ = tx.send(tail);
    }

    match result {
        Ok(()) => {
            debug!("link stopped");
            Ok(transport)
        }
        Err(e) => {
            warn!("link failed: {e}");
            Err(e)
        }
    }
}

/// Offer the front of the outbound queue to the transport.
fn write_some(transport: &mut impl Write, shared: &Shared, chunk: usize) -> Result<()> {
    let front = {
        let queue = shared.outbound();
        queue[..queue.len().min(chunk.max(1))].to_vec()
    };
    if front.is_empty() {
        return Ok(());
    }

    match transport.write(&front) {
        Ok(n) => {
            // Only this thread trims, so the front is still the bytes just written.
            let mut queue = shared.outbound();
            queue.drain(..n);
            if queue.is_empty() {
                shared.drained.notify_all();
            }
            trace!("link wrote {n} of {} bytes", front.len());
            Ok(())
        }
        Err(e) if is_transient(&e) => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Read what is available. End-of-file means the far side is gone.
fn read_some(transport: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    match transport.read(buf) {
        Ok(0) => Err(Error::Disconnected),
        Ok(n) => Ok(n),
        Err(e) if is_transient(&e) => Ok(0),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Poll timeout in whole milliseconds, rounded up so a short remainder
/// does not turn into a busy loop.
fn timeout_ms(wait: Duration) -> i32 {
    i32::try_from(wait.as_micros().div_ceil(1000)).unwrap_or(i32::MAX)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

// ─── poll(2) ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
struct Ready {
    readable: bool,
    writable: bool,
    failed: bool,
    woken: bool,
}

/// Wait for the transport (and the wake pipe) with a timeout.
fn poll(fd: RawFd, wake: RawFd, want_write: bool, timeout_ms: i32) -> io::Result<Ready> {
    let mut events = libc::POLLIN;
    if want_write {
        events |= libc::POLLOUT;
    }
    let mut fds = [
        libc::pollfd {
            fd,
            events,
            revents: 0,
        },
        libc::pollfd {
            fd: wake,
            events: libc::POLLIN,
            revents: 0,
        },
    ];

    let n = unsafe { libc::poll(fds.as_mut_ptr(), 2, timeout_ms) };
    if n < 0 {
        let err = io::Error::last_os_error();
        return if err.kind() == io::ErrorKind::Interrupted {
            Ok(Ready::default())
        } else {
            Err(err)
        };
    }

    let revents = fds[0].revents;
    Ok(Ready {
        readable: revents & (libc::POLLIN | libc::POLLHUP) != 0,
        writable: revents & libc::POLLOUT != 0,
        failed: revents & (libc::POLLERR | libc::POLLNVAL) != 0,
        woken: fds[1].revents & libc::POLLIN != 0,
    })
}

fn drain_wake(wake: &File) {
    let mut buf = [0u8; 64];
    while matches!((&*wake).read(&mut buf), Ok(n) if n > 0) {}
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// A non-blocking pipe: `(read end, write end)`.
fn wake_pipe() -> io::Result<(File, File)> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    // Both fds are fresh and owned by nobody else.
    let (rx, tx) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    set_nonblocking(rx.as_raw_fd())?;
    set_nonblocking(tx.as_raw_fd())?;
    Ok((File::from(rx), File::from(tx)))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::os::unix::net::UnixStream;

    const DEADLINE: Duration = Duration::from_secs(5);

    fn fast() -> LinkConfig {
        LinkConfig {
            poll_timeout: Duration::from_millis(20),
            ..LinkConfig::default()
        }
    }

    fn pair() -> (Link<UnixStream>, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (Link::open_with(ours, fast()).unwrap(), theirs)
    }

    /// Wait for the next token (or the closed condition).
    fn next_event(link: &Link<UnixStream>) -> Result<Option<Token>> {
        let deadline = Instant::now() + DEADLINE;
        loop {
            match link.poll_event() {
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(2)),
                other => return other,
            }
        }
    }

    fn read_exact_with_timeout(peer: &mut UnixStream, len: usize) -> Vec<u8> {
        peer.set_read_timeout(Some(DEADLINE)).unwrap();
        let mut buf = vec![0u8; len];
        peer.read_exact(&mut buf).unwrap();
        buf
    }

    #[test]
    fn default_config() {
        let config = LinkConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_millis(500));
        assert_eq!(config.read_chunk, 4096);
        assert_eq!(config.write_chunk, 4096);
    }

    #[test]
    fn empty_queue_is_not_an_error() {
        let (link, _peer) = pair();
        assert_eq!(link.poll_event().unwrap(), None);
    }

    #[test]
    fn tokens_arrive_in_order() {
        let (link, mut peer) = pair();
        peer.write_all(b"A\x9b1B").unwrap();
        assert_eq!(next_event(&link).unwrap(), Some(Token::Byte(b'A')));
        assert_eq!(
            next_event(&link).unwrap(),
            Some(Token::Sequence(b"\x9b1B".to_vec()))
        );
    }

    #[test]
    fn sequence_split_across_writes() {
        let (link, mut peer) = pair();
        peer.write_all(b"\x9b").unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(link.poll_event().unwrap(), None);
        peer.write_all(b"C").unwrap();
        assert_eq!(
            next_event(&link).unwrap(),
            Some(Token::Sequence(b"\x9bC".to_vec()))
        );
    }

    #[test]
    fn lone_escape_released_after_quiet_interval() {
        let (link, mut peer) = pair();
        peer.write_all(b"\x1b").unwrap();
        assert_eq!(next_event(&link).unwrap(), Some(Token::Byte(0x1b)));
    }

    #[test]
    fn lone_escape_released_while_output_flows() {
        let (ours, mut peer) = UnixStream::pair().unwrap();
        let link = Link::open_with(
            ours,
            LinkConfig {
                poll_timeout: Duration::from_millis(50),
                ..LinkConfig::default()
            },
        )
        .unwrap();

        peer.write_all(b"\x1b").unwrap();
        let drain = thread::spawn(move || {
            let mut buf = [0u8; 256];
            peer.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
            while matches!(peer.read(&mut buf), Ok(n) if n > 0) {}
        });

        // Output every 20 ms keeps the poll from ever timing out.
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut got = None;
        while got.is_none() && Instant::now() < deadline {
            link.send_raw(b"x").unwrap();
            thread::sleep(Duration::from_millis(20));
            got = link.poll_event().unwrap();
        }
        assert_eq!(got, Some(Token::Byte(0x1b)));

        drop(link);
        drain.join().unwrap();
    }

    #[test]
    fn sends_fail_once_the_link_is_down() {
        let (link, peer) = pair();
        let outbound = link.outbound();
        let senders: Vec<_> = (0..4)
            .map(|_| {
                let mut out = outbound.clone();
                thread::spawn(move || {
                    let deadline = Instant::now() + DEADLINE;
                    while Instant::now() < deadline {
                        if out.send(b"frame").is_err() {
                            // Nothing may be queued after the first refusal.
                            return Some(out.pending());
                        }
                        thread::yield_now();
                    }
                    None
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        drop(peer);

        let seen: Vec<usize> = senders
            .into_iter()
            .map(|h| h.join().unwrap().expect("link never went down"))
            .collect();
        assert!(!link.is_live());
        let settled = link.pending_output();
        assert!(seen.iter().all(|&pending| pending == settled), "{seen:?} vs {settled}");
    }

    #[test]
    fn wait_drained_returns_when_link_dies() {
        let (link, peer) = pair();
        // Far more than the socket buffers hold while nobody reads.
        link.send_raw(&vec![b'z'; 8 << 20]).unwrap();
        let hang_up = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(peer);
        });

        let started = Instant::now();
        assert!(!link.wait_drained(Duration::from_secs(60)));
        assert!(started.elapsed() < DEADLINE);
        assert!(link.pending_output() > 0);
        hang_up.join().unwrap();
    }

    #[test]
    fn queued_bytes_reach_the_peer() {
        let (link, mut peer) = pair();
        link.send_raw(b"hello ").unwrap();
        link.outbound().send(b"world").unwrap();
        assert_eq!(read_exact_with_timeout(&mut peer, 11), b"hello world");
        assert!(link.wait_drained(DEADLINE));
        assert_eq!(link.pending_output(), 0);
    }

    #[test]
    fn large_output_survives_partial_writes() {
        let (ours, mut peer) = UnixStream::pair().unwrap();
        let link = Link::open_with(
            ours,
            LinkConfig {
                write_chunk: 777,
                ..fast()
            },
        )
        .unwrap();

        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();
        let reader = thread::spawn(move || read_exact_with_timeout(&mut peer, expected.len()));

        for chunk in data.chunks(10_000) {
            link.send_raw(chunk).unwrap();
        }

        assert_eq!(reader.join().unwrap(), data);
    }

    #[test]
    fn close_returns_transport() {
        let (link, _peer) = pair();
        assert!(link.is_live());
        let transport = link.close().unwrap();
        drop(transport);
    }

    #[test]
    fn close_is_prompt_with_long_timeout() {
        let (ours, _peer) = UnixStream::pair().unwrap();
        let link = Link::open_with(
            ours,
            LinkConfig {
                poll_timeout: Duration::from_secs(30),
                ..LinkConfig::default()
            },
        )
        .unwrap();
        let started = Instant::now();
        link.close().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn hang_up_closes_the_link() {
        let (link, peer) = pair();
        drop(peer);
        assert!(matches!(next_event(&link), Err(Error::LinkClosed)));
        assert!(!link.is_live());
        assert!(matches!(link.send_raw(b"x"), Err(Error::LinkClosed)));
        assert!(matches!(link.close(), Err(Error::Disconnected)));
    }

    #[test]
    fn unterminated_tail_is_delivered_on_hang_up() {
        let (link, mut peer) = pair();
        peer.write_all(b"k\x9b12").unwrap();
        drop(peer);
        assert_eq!(next_event(&link).unwrap(), Some(Token::Byte(b'k')));
        assert_eq!(
            next_event(&link).unwrap(),
            Some(Token::Incomplete(b"\x9b12".to_vec()))
        );
        assert!(matches!(next_event(&link), Err(Error::LinkClosed)));
    }

    #[test]
    fn drop_stops_the_thread() {
        let (link, _peer) = pair();
        drop(link); // Must not hang.
    }
}
