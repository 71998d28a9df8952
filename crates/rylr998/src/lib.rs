//! REYAX RYLR998 LoRa Driver
//!
//! Blocking driver for the RYLR998 module over a UART link. It configures
//! the radio, transmits payloads, and buffers received packets until the
//! application asks for them.
//!
//! # Architecture
//!
//! - [`RadioDriver`]: typed operations and the last-known-good configuration cache
//! - [`CommandChannel`]: one command in flight at a time, replies matched to commands
//! - [`OobDispatcher`]: routes unsolicited `+RCV` / `+ERR` notifications
//! - [`PacketQueue`]: FIFO of received packets
//! - [`Transport`] / [`ResetLine`]: the hardware seam
//!
//! Packets are only read from the stream while the channel is held, either
//! during a command or when the application calls
//! [`RadioDriver::get_size`], [`RadioDriver::recv`] or
//! [`RadioDriver::recv_packet`]. There is no background reader.
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use rylr998::{DriverConfig, RadioDriver, RfParameters, SerialTransport};
//!
//! let config = DriverConfig::load("radio.yaml")?;
//! let transport = SerialTransport::open("/dev/ttyUSB0", config.baud_rate)?;
//! let radio = RadioDriver::new(transport, config);
//!
//! radio.at_available()?;
//! radio.set_rf_parameters(RfParameters::new(9, 7, 2, 8)?)?;
//! radio.send(120, b"HELLO 1")?;
//!
//! let mut buf = [0u8; 240];
//! if let Some(packet) = radio.recv(&mut buf)? {
//!     println!("{} bytes from {}", packet.len, packet.address);
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serial"))]
//! # fn main() {}
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod oob;
pub mod queue;
pub mod transport;

pub use channel::{ChannelState, CommandChannel};
pub use config::{ConfigError, DriverConfig};
pub use driver::{ConfigCache, RadioDriver, Received};
pub use error::{DriverError, Result};
pub use oob::OobDispatcher;
pub use queue::{PacketQueue, Pulled};
pub use transport::{ResetLine, Transport};

#[cfg(feature = "serial")]
pub use transport::SerialTransport;

pub use rylr998_protocol::{
    FirmwareVersion, Packet, Payload, ProtocolError, RfParameters, WorkMode, MAX_PAYLOAD_LEN,
};
