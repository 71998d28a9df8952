//! Byte stream and reset line abstractions.
//!
//! The driver never opens devices itself. It is handed a [`Transport`] (and
//! optionally a [`ResetLine`]) at construction, so the same protocol engine
//! runs against a serial port or against the scripted `mock` transport
//! (behind the `mock` feature) in tests.

use std::io;
use std::time::Duration;

/// Blocking byte-level transport to the module.
pub trait Transport: Send {
    /// Write all bytes to the module.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read available bytes into `buf`.
    ///
    /// Waits up to `timeout` for data and returns `Ok(0)` if none arrived.
    /// A zero timeout is a non-blocking poll.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Discard any bytes received but not yet read.
    fn clear_input(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read(buf, timeout)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }
}

/// Output pin wired to the module's active-low `RST` input.
pub trait ResetLine: Send {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

#[cfg(feature = "serial")]
mod serial {
    use std::io::{self, Read, Write};
    use std::time::Duration;

    use serialport::{ClearBuffer, SerialPort};
    use tracing::debug;

    use super::Transport;

    /// [`Transport`] over a serial port (8N1, no flow control).
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
        timeout: Duration,
    }

    impl SerialTransport {
        /// Open a serial device such as `/dev/ttyUSB0` or `COM3`.
        pub fn open(path: &str, baud_rate: u32) -> io::Result<Self> {
            let timeout = Duration::from_millis(100);
            let port = serialport::new(path, baud_rate)
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None)
                .flow_control(serialport::FlowControl::None)
                .timeout(timeout)
                .open()?;
            debug!("opened serial port {} at {} baud", path, baud_rate);
            Ok(SerialTransport { port, timeout })
        }

        /// Wrap an already opened port.
        pub fn from_port(port: Box<dyn SerialPort>) -> Self {
            let timeout = port.timeout();
            SerialTransport { port, timeout }
        }
    }

    impl Transport for SerialTransport {
        fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            self.port.write_all(data)?;
            self.port.flush()
        }

        fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            if timeout.is_zero() {
                if self.port.bytes_to_read()? == 0 {
                    return Ok(0);
                }
            } else if timeout != self.timeout {
                self.port.set_timeout(timeout)?;
                self.timeout = timeout;
            }

            match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(e),
            }
        }

        fn clear_input(&mut self) -> io::Result<()> {
            self.port.clear(ClearBuffer::Input)?;
            Ok(())
        }
    }
}
