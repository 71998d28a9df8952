//! Out-of-band notification handling.
//!
//! `+RCV` and `+ERR` frames can arrive at any point in the stream: between
//! commands, or between a command and its reply. Whoever is reading the
//! stream hands every decoded frame to the [`OobDispatcher`] first; it keeps
//! the notifications and gives everything else back.

use std::time::{Duration, Instant};

use rylr998_protocol::Frame;
use tracing::{debug, trace, warn};

use crate::channel::{deadline_after, expired, read_wait, FrameStream};
use crate::error::Result;
use crate::queue::PacketQueue;
use crate::transport::Transport;

/// Routes notifications to the packet queue and the last-error slot.
#[derive(Debug, Default)]
pub struct OobDispatcher {
    queue: PacketQueue,
    last_error: Option<i32>,
}

impl OobDispatcher {
    /// Create a dispatcher whose queue holds at most `queue_capacity`
    /// packets (0 = unbounded).
    pub fn new(queue_capacity: usize) -> Self {
        OobDispatcher {
            queue: PacketQueue::new(queue_capacity),
            last_error: None,
        }
    }

    /// Consume `frame` if it is a notification, otherwise return it.
    pub fn dispatch(&mut self, frame: Frame) -> Option<Frame> {
        match frame {
            Frame::Received(packet) => {
                debug!(
                    "received {} bytes from {} (rssi {}, snr {})",
                    packet.len(),
                    packet.address,
                    packet.rssi,
                    packet.snr
                );
                self.queue.push(packet);
                None
            }
            Frame::Error(code) => {
                warn!("module reported error {}", code);
                self.last_error = Some(code);
                None
            }
            Frame::Malformed(reason) => {
                warn!("dropped malformed notification: {}", reason);
                None
            }
            other => Some(other),
        }
    }

    /// Read and dispatch notifications that are already pending.
    ///
    /// Returns as soon as the stream has nothing more to offer. A frame that
    /// has started arriving is waited for until `timeout` elapses and is
    /// discarded if still incomplete. With `exhaustive` false, returns after
    /// the first notification. Lines that are not notifications are dropped.
    ///
    /// Returns the number of notifications dispatched.
    pub fn drain_pending<T: Transport>(
        &mut self,
        stream: &mut FrameStream<T>,
        timeout: Duration,
        exhaustive: bool,
    ) -> Result<usize> {
        let deadline = deadline_after(timeout);
        let mut handled = 0;

        loop {
            while let Some(frame) = stream.next_frame() {
                match self.dispatch(frame) {
                    Some(other) => trace!("discarding {:?} outside of a command", other),
                    None => {
                        handled += 1;
                        if !exhaustive {
                            return Ok(handled);
                        }
                    }
                }
            }

            let now = Instant::now();
            if expired(deadline, now) {
                stream.discard_partial();
                return Ok(handled);
            }

            let wait = if stream.has_partial() {
                read_wait(deadline, now)
            } else {
                Duration::ZERO
            };
            if stream.fill(wait)? == 0 && !stream.has_partial() {
                return Ok(handled);
            }
        }
    }

    pub fn queue(&self) -> &PacketQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut PacketQueue {
        &mut self.queue
    }

    /// Code of the most recent `+ERR` notification.
    pub fn last_error(&self) -> Option<i32> {
        self.last_error
    }
}
