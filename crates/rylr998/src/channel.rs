//! Command/reply engine.
//!
//! The protocol allows one command in flight. [`CommandChannel`] owns the
//! transport behind a single mutex; every exchange, and every notification
//! drain, happens while holding it. The lock guard is scoped to the call, so
//! it is released on every return path, including errors.
//!
//! While waiting for a reply the channel decodes frames as they arrive and
//! passes each one through the [`OobDispatcher`] first. A `+RCV` arriving
//! between a command and its `+OK` is therefore queued, not mistaken for
//! the reply and not lost.

use std::io;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use rylr998_protocol::{Command, Frame, LineCodec, Response};
use tracing::{trace, warn};

use crate::error::{DriverError, Result};
use crate::oob::OobDispatcher;
use crate::transport::Transport;

/// Size of the scratch buffer for one transport read.
const READ_CHUNK: usize = 256;

/// Longest single wait handed to the transport.
const MAX_READ_WAIT: Duration = Duration::from_secs(1);

/// When `timeout` from now expires, or `None` if that is too far away to
/// represent, in which case there is no deadline.
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Whether `deadline` has passed at `now`.
pub(crate) fn expired(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|deadline| now >= deadline)
}

/// How long the next read may wait.
pub(crate) fn read_wait(deadline: Option<Instant>, now: Instant) -> Duration {
    deadline.map_or(MAX_READ_WAIT, |deadline| {
        deadline.saturating_duration_since(now).min(MAX_READ_WAIT)
    })
}

/// A transport paired with the codec that splits its bytes into frames.
pub struct FrameStream<T> {
    transport: T,
    codec: LineCodec,
    scratch: [u8; READ_CHUNK],
}

impl<T: Transport> FrameStream<T> {
    pub fn new(transport: T) -> Self {
        FrameStream {
            transport,
            codec: LineCodec::new(),
            scratch: [0; READ_CHUNK],
        }
    }

    /// Next complete frame from already received bytes.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.codec.decode()
    }

    /// Read once from the transport, waiting up to `timeout`.
    ///
    /// Returns the number of bytes added to the codec buffer.
    pub fn fill(&mut self, timeout: Duration) -> io::Result<usize> {
        let n = self.transport.read(&mut self.scratch, timeout)?;
        if n > 0 {
            trace!("<- {:?}", String::from_utf8_lossy(&self.scratch[..n]));
            self.codec.push(&self.scratch[..n]);
        }
        Ok(n)
    }

    /// Whether part of a frame is buffered.
    pub fn has_partial(&self) -> bool {
        !self.codec.is_empty()
    }

    /// Drop a partially received frame.
    pub fn discard_partial(&mut self) {
        if self.has_partial() {
            warn!(
                "discarding {} bytes of incomplete frame: {:?}",
                self.codec.buffered_len(),
                self.codec.buffer_as_str()
            );
            self.codec.clear();
        }
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.transport.write_all(data)
    }

    /// Discard everything received but not yet decoded.
    pub fn flush(&mut self) -> io::Result<()> {
        self.transport.clear_input()?;
        self.codec.clear();
        Ok(())
    }
}

/// State protected by the channel lock.
pub struct ChannelState<T> {
    stream: FrameStream<T>,
    oob: OobDispatcher,
    /// Timeout applied to the next exchange.
    timeout: Duration,
}

/// Restores the channel timeout when dropped.
pub struct ScopedTimeout<'a, T> {
    state: &'a mut ChannelState<T>,
    previous: Duration,
}

impl<T> Deref for ScopedTimeout<'_, T> {
    type Target = ChannelState<T>;

    fn deref(&self) -> &ChannelState<T> {
        &*self.state
    }
}

impl<T> DerefMut for ScopedTimeout<'_, T> {
    fn deref_mut(&mut self) -> &mut ChannelState<T> {
        &mut *self.state
    }
}

impl<T> Drop for ScopedTimeout<'_, T> {
    fn drop(&mut self) {
        self.state.timeout = self.previous;
    }
}

impl<T: Transport> ChannelState<T> {
    /// Send `command` and wait for the reply it expects.
    ///
    /// Notifications received meanwhile are dispatched, other lines are
    /// skipped. A reply with the expected tag that fails to parse ends the
    /// exchange with [`DriverError::PatternMismatch`]. Bytes of an incomplete
    /// frame left at the deadline are discarded.
    pub fn execute(&mut self, command: &Command) -> Result<Response> {
        let expect = command.expected();
        trace!("-> {}", command);
        self.stream.write(&command.encode())?;

        let deadline = deadline_after(self.timeout);
        loop {
            while let Some(frame) = self.stream.next_frame() {
                let Some(frame) = self.oob.dispatch(frame) else {
                    continue;
                };
                match expect.check(&frame) {
                    Some(Ok(response)) => return Ok(response),
                    Some(Err(source)) => {
                        return Err(DriverError::PatternMismatch {
                            command: command.to_command_string(),
                            source,
                        })
                    }
                    None => trace!("skipping {:?} while waiting for {}", frame, expect),
                }
            }

            let now = Instant::now();
            if expired(deadline, now) {
                self.stream.discard_partial();
                warn!("no {} reply to {} within {:?}", expect, command, self.timeout);
                return Err(DriverError::Timeout {
                    command: command.to_command_string(),
                });
            }
            self.stream.fill(read_wait(deadline, now))?;
        }
    }

    /// Dispatch pending notifications; see [`OobDispatcher::drain_pending`].
    pub fn drain_pending(&mut self, timeout: Duration, exhaustive: bool) -> Result<usize> {
        let mut scoped = self.override_timeout(timeout);
        let state = &mut *scoped;
        state.oob.drain_pending(&mut state.stream, state.timeout, exhaustive)
    }

    /// Use `timeout` until the returned guard is dropped.
    pub fn override_timeout(&mut self, timeout: Duration) -> ScopedTimeout<'_, T> {
        let previous = self.timeout;
        self.timeout = timeout;
        ScopedTimeout {
            state: self,
            previous,
        }
    }

    /// Timeout applied to the next exchange.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the timeout used by subsequent exchanges.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn oob(&self) -> &OobDispatcher {
        &self.oob
    }

    pub fn oob_mut(&mut self) -> &mut OobDispatcher {
        &mut self.oob
    }

    /// Discard received input.
    pub fn flush(&mut self) -> Result<()> {
        Ok(self.stream.flush()?)
    }
}

/// Serializes commands to the module.
pub struct CommandChannel<T> {
    state: Mutex<ChannelState<T>>,
}

impl<T: Transport> CommandChannel<T> {
    /// Create a channel with the given default reply timeout.
    pub fn new(transport: T, timeout: Duration, queue_capacity: usize) -> Self {
        CommandChannel {
            state: Mutex::new(ChannelState {
                stream: FrameStream::new(transport),
                oob: OobDispatcher::new(queue_capacity),
                timeout,
            }),
        }
    }

    /// Take exclusive ownership of the channel for several operations.
    pub fn lock(&self) -> MutexGuard<'_, ChannelState<T>> {
        self.state.lock()
    }

    /// Run one command/reply exchange.
    pub fn execute(&self, command: &Command) -> Result<Response> {
        self.lock().execute(command)
    }

    /// Dispatch pending notifications.
    pub fn drain_pending(&self, timeout: Duration, exhaustive: bool) -> Result<usize> {
        self.lock().drain_pending(timeout, exhaustive)
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.lock().set_timeout(timeout);
    }

    pub fn flush(&self) -> Result<()> {
        self.lock().flush()
    }
}
