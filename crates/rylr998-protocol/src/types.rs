//! Value types shared by commands and replies.

use bytes::Bytes;

use crate::error::{check_range, ProtocolError, ProtocolResult};

/// Maximum payload carried by one `AT+SEND` or `+RCV` frame.
pub const MAX_PAYLOAD_LEN: usize = 240;

/// Length of the module's unique ID string.
pub const UID_LEN: usize = 24;

/// Baud rates accepted by `AT+IPR`.
pub const BAUD_RATES: [u32; 9] = [300, 1200, 4800, 9600, 19200, 28800, 38400, 57600, 115200];

/// Default UART baud rate of the module.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Firmware version reported by `AT+VER?`.
///
/// Every component is `-1` until a version query has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FirmwareVersion {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl FirmwareVersion {
    /// Sentinel for a version that has never been queried.
    pub const UNKNOWN: FirmwareVersion = FirmwareVersion {
        major: -1,
        minor: -1,
        patch: -1,
    };

    pub fn new(major: i32, minor: i32, patch: i32) -> Self {
        FirmwareVersion {
            major,
            minor,
            patch,
        }
    }

    /// Whether this holds a value reported by the module.
    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl Default for FirmwareVersion {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// LoRa physical layer parameters (`AT+PARAMETER`).
///
/// Values are module codes, not physical units: `bandwidth` 7 means 125 kHz,
/// `coding_rate` 1 means 4/5, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RfParameters {
    /// Spreading factor, 7 to 11.
    pub spreading_factor: u8,
    /// Bandwidth code, 0 to 9.
    pub bandwidth: u8,
    /// Coding rate code, 1 to 4.
    pub coding_rate: u8,
    /// Programmed preamble length, 4 to 24.
    pub preamble: u8,
}

impl RfParameters {
    /// Build a parameter set, rejecting values the module would not accept.
    pub fn new(spreading_factor: u8, bandwidth: u8, coding_rate: u8, preamble: u8) -> ProtocolResult<Self> {
        let params = RfParameters {
            spreading_factor,
            bandwidth,
            coding_rate,
            preamble,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every field against the module's accepted ranges.
    pub fn validate(&self) -> ProtocolResult<()> {
        check_range("spreading_factor", self.spreading_factor.into(), 7, 11)?;
        check_range("bandwidth", self.bandwidth.into(), 0, 9)?;
        check_range("coding_rate", self.coding_rate.into(), 1, 4)?;
        check_range("preamble", self.preamble.into(), 4, 24)?;
        Ok(())
    }
}

/// Wireless work mode (`AT+MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkMode {
    /// Transmit and receive.
    #[default]
    Transceiver,
    /// Sleep; wakes on incoming UART data.
    Sleep,
    /// Smart receiving power saving.
    SmartReceive,
}

impl WorkMode {
    /// Numeric code sent on the wire.
    pub fn code(&self) -> u8 {
        match self {
            WorkMode::Transceiver => 0,
            WorkMode::Sleep => 1,
            WorkMode::SmartReceive => 2,
        }
    }

    /// Parse a wire code, rejecting anything outside 0..=2.
    pub fn from_code(code: i64) -> ProtocolResult<Self> {
        match code {
            0 => Ok(WorkMode::Transceiver),
            1 => Ok(WorkMode::Sleep),
            2 => Ok(WorkMode::SmartReceive),
            other => Err(ProtocolError::out_of_range("mode", other, 0, 2)),
        }
    }
}

/// Check a network ID (1 to 255).
pub fn validate_network_id(id: u8) -> ProtocolResult<()> {
    check_range("network_id", id.into(), 1, 255)
}

/// Check an RF output power in dBm (0 to 22).
pub fn validate_output_power(power: u8) -> ProtocolResult<()> {
    check_range("rf_output_power", power.into(), 0, 22)
}

/// Check a UART baud rate against the rates the module supports.
pub fn validate_baud_rate(rate: u32) -> ProtocolResult<()> {
    if BAUD_RATES.contains(&rate) {
        return Ok(());
    }
    Err(ProtocolError::out_of_range(
        "baud_rate",
        rate.into(),
        BAUD_RATES[0].into(),
        BAUD_RATES[BAUD_RATES.len() - 1].into(),
    ))
}

/// A radio payload of at most [`MAX_PAYLOAD_LEN`] bytes.
///
/// The capacity is checked before any bytes are copied in, so a length taken
/// from the wire can never overrun it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Payload(Bytes);

impl Payload {
    /// Copy `data` into a new payload.
    pub fn new(data: &[u8]) -> ProtocolResult<Self> {
        if data.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong {
                max: MAX_PAYLOAD_LEN,
                actual: data.len(),
            });
        }
        Ok(Payload(Bytes::copy_from_slice(data)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Payload {
    type Error = ProtocolError;

    fn try_from(data: &[u8]) -> ProtocolResult<Self> {
        Payload::new(data)
    }
}

impl TryFrom<&str> for Payload {
    type Error = ProtocolError;

    fn try_from(text: &str) -> ProtocolResult<Self> {
        Payload::new(text.as_bytes())
    }
}

/// A packet decoded from a `+RCV` notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Address of the transmitting module.
    pub address: u16,
    /// Received bytes.
    pub payload: Payload,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// Signal-to-noise ratio in dB.
    pub snr: i16,
}

impl Packet {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
