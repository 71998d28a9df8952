//! Reply and notification parsing.
//!
//! Lines received from the module fall into four groups:
//! - Acknowledgments: `+OK`, and `+READY` after a reset
//! - Typed replies: `+<TAG>=<value>[,<value>...]`
//! - Out-of-band packet notifications: `+RCV=<addr>,<len>,<data>,<rssi>,<snr>`
//! - Out-of-band error notifications: `+ERR=<code>`

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{FirmwareVersion, Packet, RfParameters, UID_LEN};

/// Prefix of the version string in `+VER=` replies.
pub const VERSION_PREFIX: &str = "RYLR998_REYAX_V";

/// A frame decoded from the inbound byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Generic acknowledgment (`+OK`).
    Ok,

    /// Module restarted its command interpreter (`+READY`).
    Ready,

    /// Typed reply. The tag is stored without the leading `+`.
    Reply {
        /// Reply name, e.g. `BAND`.
        tag: String,
        /// Text after the `=`.
        value: String,
    },

    /// Unsolicited packet notification.
    Received(Packet),

    /// Unsolicited error notification.
    Error(i32),

    /// An out-of-band frame that was consumed but could not be decoded.
    Malformed(String),

    /// Any other line (noise, echo, unsupported notifications).
    Unknown(String),
}

impl Frame {
    /// Parse a complete line that is not a `+RCV` frame.
    ///
    /// The input should be the line without its terminator.
    pub fn parse_line(line: &str) -> Frame {
        let line = line.trim();

        match line {
            "+OK" => return Frame::Ok,
            "+READY" => return Frame::Ready,
            _ => {}
        }

        if let Some(code) = line.strip_prefix("+ERR=") {
            return match code.trim().parse() {
                Ok(code) => Frame::Error(code),
                Err(_) => Frame::Malformed(line.to_string()),
            };
        }

        if let Some(rest) = line.strip_prefix('+') {
            if let Some((tag, value)) = rest.split_once('=') {
                return Frame::Reply {
                    tag: tag.to_string(),
                    value: value.to_string(),
                };
            }
        }

        Frame::Unknown(line.to_string())
    }

    /// Whether this frame arrived outside the request/reply cycle.
    pub fn is_out_of_band(&self) -> bool {
        matches!(self, Frame::Received(_) | Frame::Error(_) | Frame::Malformed(_))
    }
}

/// Tags of typed replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTag {
    Version,
    Uid,
    Parameter,
    BaudRate,
    Band,
    Address,
    NetworkId,
    OutputPower,
    RxBoost,
}

impl ReplyTag {
    /// The tag as it appears on the wire, without `+` and `=`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyTag::Version => "VER",
            ReplyTag::Uid => "UID",
            ReplyTag::Parameter => "PARAMETER",
            ReplyTag::BaudRate => "IPR",
            ReplyTag::Band => "BAND",
            ReplyTag::Address => "ADDRESS",
            ReplyTag::NetworkId => "NETWORKID",
            ReplyTag::OutputPower => "CRFOP",
            ReplyTag::RxBoost => "RXBOOST",
        }
    }
}

/// A typed, successfully parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Ready,
    Version(FirmwareVersion),
    Uid(String),
    Parameters(RfParameters),
    BaudRate(u32),
    Band(u32),
    Address(u16),
    NetworkId(u8),
    OutputPower(u8),
    RxBoost(bool),
}

impl Response {
    /// Parse the value of a typed reply.
    pub fn parse(tag: ReplyTag, value: &str) -> ProtocolResult<Response> {
        let value = value.trim();
        match tag {
            ReplyTag::Version => parse_version(value).map(Response::Version),
            ReplyTag::Uid => parse_uid(value).map(Response::Uid),
            ReplyTag::Parameter => parse_parameters(value).map(Response::Parameters),
            ReplyTag::BaudRate => parse_number("baud rate", value).map(Response::BaudRate),
            ReplyTag::Band => parse_number("band", value).map(Response::Band),
            ReplyTag::Address => parse_number("address", value).map(Response::Address),
            ReplyTag::NetworkId => parse_number("network id", value).map(Response::NetworkId),
            ReplyTag::OutputPower => parse_number("output power", value).map(Response::OutputPower),
            ReplyTag::RxBoost => parse_number::<u8>("rx boost", value).map(|v| Response::RxBoost(v != 0)),
        }
    }
}

/// The reply that completes a pending command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// `+OK`
    Ok,
    /// `+READY`
    Ready,
    /// `+<TAG>=...`
    Reply(ReplyTag),
}

impl Expect {
    /// Check a decoded frame against this expectation.
    ///
    /// Returns `None` when the frame does not answer the pending command and
    /// scanning should continue, `Some(Ok(_))` on a match, and `Some(Err(_))`
    /// when the frame carries the expected tag but its value does not parse.
    pub fn check(&self, frame: &Frame) -> Option<ProtocolResult<Response>> {
        match (self, frame) {
            (Expect::Ok, Frame::Ok) => Some(Ok(Response::Ok)),
            (Expect::Ready, Frame::Ready) => Some(Ok(Response::Ready)),
            (Expect::Reply(want), Frame::Reply { tag, value }) if tag == want.as_str() => {
                Some(Response::parse(*want, value))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Expect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expect::Ok => write!(f, "+OK"),
            Expect::Ready => write!(f, "+READY"),
            Expect::Reply(tag) => write!(f, "+{}=", tag.as_str()),
        }
    }
}

fn parse_number<T: std::str::FromStr>(what: &str, value: &str) -> ProtocolResult<T> {
    value
        .parse()
        .map_err(|_| ProtocolError::parse(format!("invalid {}: {}", what, value)))
}

/// Format: "RYLR998_REYAX_V1.2.3"
fn parse_version(value: &str) -> ProtocolResult<FirmwareVersion> {
    let digits = value
        .strip_prefix(VERSION_PREFIX)
        .ok_or_else(|| ProtocolError::parse(format!("unexpected version string: {}", value)))?;

    let parts: Vec<&str> = digits.split('.').collect();
    if parts.len() != 3 {
        return Err(ProtocolError::parse(format!(
            "expected 3 version parts, got {}: {}",
            parts.len(),
            value
        )));
    }

    Ok(FirmwareVersion {
        major: parse_number("major version", parts[0])?,
        minor: parse_number("minor version", parts[1])?,
        patch: parse_number("patch version", parts[2])?,
    })
}

fn parse_uid(value: &str) -> ProtocolResult<String> {
    if value.len() != UID_LEN || !value.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ProtocolError::parse(format!("invalid uid: {}", value)));
    }
    Ok(value.to_string())
}

/// Format: "sf,bw,cr,pp" (e.g., "9,7,1,12")
fn parse_parameters(value: &str) -> ProtocolResult<RfParameters> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 4 {
        return Err(ProtocolError::parse(format!(
            "expected 4 parts, got {}: {}",
            parts.len(),
            value
        )));
    }

    Ok(RfParameters {
        spreading_factor: parse_number("spreading factor", parts[0])?,
        bandwidth: parse_number("bandwidth", parts[1])?,
        coding_rate: parse_number("coding rate", parts[2])?,
        preamble: parse_number("preamble", parts[3])?,
    })
}
