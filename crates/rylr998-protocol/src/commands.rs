//! Commands that can be sent to the module.
//!
//! Every command is a single line of the form `AT+<NAME>[=<args>]` (or the
//! bare liveness probe `AT`), terminated by `\r\n`. Queries end in `?`.

use crate::codec::LineCodec;
use crate::responses::{Expect, ReplyTag};
use crate::types::{Payload, RfParameters, WorkMode};

/// Commands understood by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ========== Control ==========
    /// Liveness probe (`AT`).
    Probe,

    /// Software reset (`AT+RESET`).
    Reset,

    // ========== Identity ==========
    /// Query firmware version (`AT+VER?`).
    GetVersion,

    /// Query the 24-character unique ID (`AT+UID?`).
    GetUid,

    // ========== Radio Configuration ==========
    /// Query RF parameters.
    GetParameters,

    /// Set RF parameters.
    SetParameters(RfParameters),

    /// Set the work mode.
    SetMode(WorkMode),

    /// Query the UART baud rate.
    GetBaudRate,

    /// Set the UART baud rate.
    SetBaudRate(u32),

    /// Query the RF frequency in Hz.
    GetBand,

    /// Set the RF frequency in Hz.
    SetBand(u32),

    /// Query the module address.
    GetAddress,

    /// Set the module address.
    SetAddress(u16),

    /// Query the network ID.
    GetNetworkId,

    /// Set the network ID.
    SetNetworkId(u8),

    /// Query the RF output power in dBm.
    GetOutputPower,

    /// Set the RF output power in dBm.
    SetOutputPower(u8),

    /// Query the receive boost setting.
    GetRxBoost,

    /// Enable or disable receive boost.
    SetRxBoost(bool),

    // ========== Data ==========
    /// Transmit a payload to `address` (0 broadcasts).
    Send {
        /// Destination address.
        address: u16,
        /// Bytes to transmit.
        payload: Payload,
    },
}

impl Command {
    /// Encode the command as the bytes to write, including the terminator.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            // The payload is sent raw and may not be valid UTF-8.
            Command::Send { address, payload } => {
                let mut line = format!("AT+SEND={},{},", address, payload.len()).into_bytes();
                line.extend_from_slice(payload.as_bytes());
                LineCodec::encode_command(&line)
            }
            _ => LineCodec::encode_command(self.to_command_string().as_bytes()),
        }
    }

    /// Get the command string without the terminator.
    ///
    /// `Send` payloads are rendered lossily; use [`Command::encode`] for the
    /// exact bytes.
    pub fn to_command_string(&self) -> String {
        match self {
            Command::Probe => "AT".to_string(),
            Command::Reset => "AT+RESET".to_string(),
            Command::GetVersion => "AT+VER?".to_string(),
            Command::GetUid => "AT+UID?".to_string(),

            Command::GetParameters => "AT+PARAMETER?".to_string(),
            Command::SetParameters(p) => format!(
                "AT+PARAMETER={},{},{},{}",
                p.spreading_factor, p.bandwidth, p.coding_rate, p.preamble
            ),
            Command::SetMode(mode) => format!("AT+MODE={}", mode.code()),
            Command::GetBaudRate => "AT+IPR?".to_string(),
            Command::SetBaudRate(rate) => format!("AT+IPR={}", rate),
            Command::GetBand => "AT+BAND?".to_string(),
            Command::SetBand(freq) => format!("AT+BAND={}", freq),
            Command::GetAddress => "AT+ADDRESS?".to_string(),
            Command::SetAddress(addr) => format!("AT+ADDRESS={}", addr),
            Command::GetNetworkId => "AT+NETWORKID?".to_string(),
            Command::SetNetworkId(id) => format!("AT+NETWORKID={}", id),
            Command::GetOutputPower => "AT+CRFOP?".to_string(),
            Command::SetOutputPower(power) => format!("AT+CRFOP={}", power),
            Command::GetRxBoost => "AT+RXBOOST?".to_string(),
            Command::SetRxBoost(on) => format!("AT+RXBOOST={}", u8::from(*on)),

            Command::Send { address, payload } => format!(
                "AT+SEND={},{},{}",
                address,
                payload.len(),
                String::from_utf8_lossy(payload.as_bytes())
            ),
        }
    }

    /// The reply that completes this command.
    pub fn expected(&self) -> Expect {
        match self {
            Command::Reset => Expect::Ready,
            Command::GetVersion => Expect::Reply(ReplyTag::Version),
            Command::GetUid => Expect::Reply(ReplyTag::Uid),
            Command::GetParameters => Expect::Reply(ReplyTag::Parameter),
            // The module echoes the new rate instead of acknowledging.
            Command::GetBaudRate | Command::SetBaudRate(_) => Expect::Reply(ReplyTag::BaudRate),
            Command::GetBand => Expect::Reply(ReplyTag::Band),
            Command::GetAddress => Expect::Reply(ReplyTag::Address),
            Command::GetNetworkId => Expect::Reply(ReplyTag::NetworkId),
            Command::GetOutputPower => Expect::Reply(ReplyTag::OutputPower),
            Command::GetRxBoost => Expect::Reply(ReplyTag::RxBoost),
            Command::Probe
            | Command::SetParameters(_)
            | Command::SetMode(_)
            | Command::SetBand(_)
            | Command::SetAddress(_)
            | Command::SetNetworkId(_)
            | Command::SetOutputPower(_)
            | Command::SetRxBoost(_)
            | Command::Send { .. } => Expect::Ok,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_command_string())
    }
}
