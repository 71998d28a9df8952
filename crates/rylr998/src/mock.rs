//! Scripted in-memory transport for deterministic tests.
//!
//! [`MockTransport`] is handed to the driver while the paired [`MockHandle`]
//! stays with the test. The handle scripts replies, injects unsolicited
//! bytes, and inspects what was written.
//!
//! # Example
//!
//! ```
//! use rylr998::mock::MockTransport;
//! use rylr998::{DriverConfig, RadioDriver};
//!
//! let (transport, handle) = MockTransport::new();
//! handle.expect(b"AT+ADDRESS?\r\n", b"+ADDRESS=120\r\n");
//!
//! let radio = RadioDriver::new(transport, DriverConfig::default());
//! assert_eq!(radio.get_address().unwrap(), 120);
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::transport::Transport;

/// Something that crossed the mock transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Bytes written by the driver.
    Write(Vec<u8>),
    /// Bytes handed to the driver by one `read()` call.
    Read(Vec<u8>),
}

#[derive(Debug)]
struct MockState {
    /// Bytes waiting to be read by the driver.
    rx: VecDeque<u8>,
    /// Ordered one-shot request/response pairs.
    expectations: VecDeque<(Vec<u8>, Vec<u8>)>,
    /// Persistent replies, matched when no expectation applies.
    replies: Vec<(Vec<u8>, Vec<u8>)>,
    events: Vec<MockEvent>,
    /// Maximum bytes returned by one `read()`.
    chunk_size: usize,
    failed: bool,
}

/// The driver side of the mock.
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// The test side of the mock.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a connected transport/handle pair.
    pub fn new() -> (MockTransport, MockHandle) {
        let state = Arc::new(Mutex::new(MockState {
            rx: VecDeque::new(),
            expectations: VecDeque::new(),
            replies: Vec::new(),
            events: Vec::new(),
            chunk_size: usize::MAX,
            failed: false,
        }));
        (
            MockTransport {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }
}

impl MockHandle {
    /// Queue a one-shot reply.
    ///
    /// When the next unmatched write equals `request`, `response` becomes
    /// readable.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.state
            .lock()
            .expectations
            .push_back((request.to_vec(), response.to_vec()));
    }

    /// Reply with `response` every time `request` is written.
    pub fn reply_to(&self, request: &[u8], response: &[u8]) {
        self.state
            .lock()
            .replies
            .push((request.to_vec(), response.to_vec()));
    }

    /// Make unsolicited bytes readable.
    pub fn inject(&self, data: &[u8]) {
        self.state.lock().rx.extend(data.iter().copied());
    }

    /// Limit how many bytes one `read()` returns, to exercise reassembly.
    pub fn set_chunk_size(&self, size: usize) {
        self.state.lock().chunk_size = size.max(1);
    }

    /// Make every subsequent transport call fail.
    pub fn set_failed(&self, failed: bool) {
        self.state.lock().failed = failed;
    }

    /// All writes, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write(data) => Some(data.clone()),
                MockEvent::Read(_) => None,
            })
            .collect()
    }

    /// All writes and non-empty reads, in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    /// Bytes injected or scripted but not yet read.
    pub fn pending_input(&self) -> usize {
        self.state.lock().rx.len()
    }

    /// One-shot expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.state.lock().expectations.len()
    }
}

fn broken() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "mock transport failed")
}

impl Transport for MockTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.failed {
            return Err(broken());
        }

        state.events.push(MockEvent::Write(data.to_vec()));

        let matches_front = state
            .expectations
            .front()
            .is_some_and(|(request, _)| request.as_slice() == data);
        let response = if matches_front {
            state.expectations.pop_front().map(|(_, response)| response)
        } else {
            state
                .replies
                .iter()
                .find(|(request, _)| request.as_slice() == data)
                .map(|(_, response)| response.clone())
        };

        if let Some(response) = response {
            state.rx.extend(response);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        {
            let state = self.state.lock();
            if state.failed {
                return Err(broken());
            }
            if state.rx.is_empty() {
                if timeout.is_zero() {
                    return Ok(0);
                }
                drop(state);
                std::thread::sleep(timeout.min(Duration::from_millis(1)));
            }
        }

        let mut state = self.state.lock();
        let n = state.rx.len().min(buf.len()).min(state.chunk_size);
        if n == 0 {
            return Ok(0);
        }
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        state.events.push(MockEvent::Read(buf[..n].to_vec()));
        Ok(n)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.failed {
            return Err(broken());
        }
        state.rx.clear();
        Ok(())
    }
}
