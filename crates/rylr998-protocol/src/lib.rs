//! REYAX RYLR998 AT Command Protocol
//!
//! This crate provides types and utilities for talking to the RYLR998 LoRa
//! module over its UART AT command interface. It performs no I/O: callers
//! feed received bytes into a [`LineCodec`] and write the bytes produced by
//! [`Command::encode`].
//!
//! # Protocol Overview
//!
//! - **Commands** (host → module): `AT+<NAME>[=<args>]` or `AT+<NAME>?`, terminated with `\r\n`
//! - **Replies** (module → host): `+OK`, `+READY`, or `+<NAME>=<value>`
//! - **Notifications** (module → host, unsolicited): `+RCV=...` for received
//!   packets and `+ERR=<code>` for errors. These can arrive at any time,
//!   including between a command and its reply.
//!
//! # Example
//!
//! ```rust
//! use rylr998_protocol::{Command, LineCodec, Response};
//!
//! let line = Command::GetAddress.encode();
//! assert_eq!(line, b"AT+ADDRESS?\r\n");
//!
//! let mut codec = LineCodec::new();
//! codec.push(b"+ADDRESS=120\r\n");
//! let frame = codec.decode().unwrap();
//! let reply = Command::GetAddress.expected().check(&frame).unwrap().unwrap();
//! assert_eq!(reply, Response::Address(120));
//! ```

mod codec;
mod commands;
mod error;
mod responses;
mod types;

pub use codec::*;
pub use commands::*;
pub use error::{ProtocolError, ProtocolResult};
pub use responses::*;
pub use types::*;
