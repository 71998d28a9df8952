//! Line codec for the AT command stream.
//!
//! Everything the module sends is a `\r\n`-terminated line except the data
//! segment of a `+RCV` notification, which is `<len>` raw bytes that may
//! themselves contain terminators. The codec therefore reads the `+RCV`
//! header, takes exactly `<len>` bytes by count, and only then goes back to
//! delimiter scanning for the trailing `,<rssi>,<snr>`.

use bytes::{Buf, BytesMut};
use log::{trace, warn};

use crate::responses::Frame;
use crate::types::{Packet, Payload, MAX_PAYLOAD_LEN};

/// Line terminator used in both directions.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Longest ordinary line accepted before the buffer is treated as garbage.
pub const MAX_LINE_LENGTH: usize = 128;

/// Tag that introduces a packet notification.
pub const RCV_PREFIX: &[u8] = b"+RCV=";

/// Upper bound for `+RCV=<addr>,<len>,`.
const MAX_RCV_HEADER: usize = 24;

/// Upper bound for `,<rssi>,<snr>` after the payload.
const MAX_RCV_TRAILER: usize = 24;

enum Header {
    /// Index just past the second comma, the source address and the
    /// declared payload length.
    Complete { end: usize, address: u16, len: usize },
    Incomplete,
    Invalid,
}

/// A codec that accumulates received bytes and splits them into frames.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH * 4),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next complete frame from the buffer.
    ///
    /// Returns `None` if more data is needed. Bytes belonging to an
    /// incomplete frame stay buffered until more data arrives or the caller
    /// discards them with [`LineCodec::clear`].
    pub fn decode(&mut self) -> Option<Frame> {
        self.skip_terminators();

        if self.buffer.is_empty() {
            return None;
        }

        if self.buffer.starts_with(RCV_PREFIX) {
            return self.decode_packet();
        }

        let Some(end) = self.find_newline(0) else {
            if self.buffer.len() > MAX_LINE_LENGTH {
                self.resync();
                if self.buffer.starts_with(RCV_PREFIX) {
                    return self.decode_packet();
                }
            }
            return None;
        };

        let line = self.buffer.split_to(end + 1);
        let text = String::from_utf8_lossy(&line[..end]);
        trace!("decoded line: {:?}", text);
        Some(Frame::parse_line(&text))
    }

    /// Decode a `+RCV` notification at the start of the buffer.
    fn decode_packet(&mut self) -> Option<Frame> {
        let (header_end, address, len) = match self.scan_header() {
            Header::Complete { end, address, len } => (end, address, len),
            Header::Incomplete => return None,
            Header::Invalid => return self.discard_line("invalid +RCV header"),
        };

        // The payload is taken by count no matter what it contains.
        let payload_end = header_end + len;
        if self.buffer.len() < payload_end {
            return None;
        }

        let Some(newline) = self.find_newline(payload_end) else {
            if self.buffer.len() - payload_end > MAX_RCV_TRAILER {
                self.buffer.advance(payload_end);
                return Some(self.malformed("missing +RCV trailer"));
            }
            return None;
        };

        let frame = self.buffer.split_to(newline + 1);

        if len > MAX_PAYLOAD_LEN {
            return Some(self.malformed(&format!(
                "+RCV payload of {} bytes exceeds {}",
                len, MAX_PAYLOAD_LEN
            )));
        }

        let Some((rssi, snr)) = parse_trailer(&frame[payload_end..newline]) else {
            return Some(self.malformed("invalid +RCV trailer"));
        };

        match Payload::new(&frame[header_end..payload_end]) {
            Ok(payload) => Some(Frame::Received(Packet {
                address,
                payload,
                rssi,
                snr,
            })),
            Err(e) => Some(self.malformed(&e.to_string())),
        }
    }

    /// Locate and parse `+RCV=<addr>,<len>,`.
    fn scan_header(&self) -> Header {
        let mut commas = [0usize; 2];
        let mut found = 0;

        for (i, &byte) in self.buffer.iter().enumerate().skip(RCV_PREFIX.len()) {
            if i >= MAX_RCV_HEADER || byte == b'\n' {
                return Header::Invalid;
            }
            if byte == b',' {
                commas[found] = i;
                found += 1;
                if found == 2 {
                    break;
                }
            }
        }

        if found < 2 {
            return Header::Incomplete;
        }

        let address = parse_ascii::<u16>(&self.buffer[RCV_PREFIX.len()..commas[0]]);
        let len = parse_ascii::<u16>(&self.buffer[commas[0] + 1..commas[1]]);
        match (address, len) {
            (Some(address), Some(len)) => Header::Complete {
                end: commas[1] + 1,
                address,
                len: len.into(),
            },
            _ => Header::Invalid,
        }
    }

    /// Drop everything up to and including the next terminator.
    fn discard_line(&mut self, reason: &str) -> Option<Frame> {
        match self.find_newline(0) {
            Some(end) => {
                self.buffer.advance(end + 1);
                Some(self.malformed(reason))
            }
            None if self.buffer.len() > MAX_LINE_LENGTH => {
                self.resync();
                Some(self.malformed(reason))
            }
            None => None,
        }
    }

    /// Drop unterminated garbage, keeping anything from the last `+` on
    /// since it may be the start of the next frame.
    fn resync(&mut self) {
        let keep_from = self
            .buffer
            .iter()
            .rposition(|&b| b == b'+')
            .filter(|&i| i > 0)
            .unwrap_or(self.buffer.len());
        warn!("discarding {} bytes without a line terminator", keep_from);
        self.buffer.advance(keep_from);
    }

    fn malformed(&self, reason: &str) -> Frame {
        warn!("malformed frame: {}", reason);
        Frame::Malformed(reason.to_string())
    }

    fn skip_terminators(&mut self) {
        let skip = self
            .buffer
            .iter()
            .take_while(|&&b| b == b'\r' || b == b'\n')
            .count();
        self.buffer.advance(skip);
    }

    fn find_newline(&self, from: usize) -> Option<usize> {
        self.buffer[from..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| i + from)
    }

    /// Encode a command for transmission.
    ///
    /// Appends the `\r\n` terminator.
    pub fn encode_command(cmd: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + LINE_TERMINATOR.len());
        buf.extend_from_slice(cmd);
        buf.extend_from_slice(LINE_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether any bytes are waiting to be decoded.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}

fn parse_ascii<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}

/// Parse `,<rssi>,<snr>` with an optional trailing `\r`.
fn parse_trailer(bytes: &[u8]) -> Option<(i16, i16)> {
    let text = std::str::from_utf8(bytes).ok()?.trim_end_matches('\r');
    let (rssi, snr) = text.strip_prefix(',')?.split_once(',')?;
    Some((rssi.trim().parse().ok()?, snr.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(frame: Option<Frame>) -> Packet {
        match frame {
            Some(Frame::Received(packet)) => packet,
            other => panic!("expected packet, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_command() {
        assert_eq!(LineCodec::encode_command(b"AT+BAND?"), b"AT+BAND?\r\n");
    }

    #[test]
    fn test_decode_lines() {
        let mut codec = LineCodec::new();
        codec.push(b"+OK\r\n+BAND=915000000\r\n");

        assert_eq!(codec.decode(), Some(Frame::Ok));
        assert_eq!(
            codec.decode(),
            Some(Frame::Reply {
                tag: "BAND".to_string(),
                value: "915000000".to_string(),
            })
        );
        assert!(codec.decode().is_none());
        assert!(codec.is_empty());
    }

    #[test]
    fn test_partial_line() {
        let mut codec = LineCodec::new();
        codec.push(b"+O");
        assert!(codec.decode().is_none());

        codec.push(b"K\r\n");
        assert_eq!(codec.decode(), Some(Frame::Ok));
    }

    #[test]
    fn test_decode_packet() {
        let mut codec = LineCodec::new();
        codec.push(b"+RCV=121,5,HELLO,-40,9\r\n");

        let packet = packet(codec.decode());
        assert_eq!(packet.address, 121);
        assert_eq!(packet.payload.as_bytes(), b"HELLO");
        assert_eq!(packet.rssi, -40);
        assert_eq!(packet.snr, 9);
        assert!(codec.is_empty());
    }

    #[test]
    fn test_packet_payload_with_terminators() {
        let mut codec = LineCodec::new();
        codec.push(b"+RCV=7,6,A\r\n,B,,-99,-3\r\n+OK\r\n");

        let packet = packet(codec.decode());
        assert_eq!(packet.payload.as_bytes(), b"A\r\n,B,");
        assert_eq!(packet.snr, -3);
        assert_eq!(codec.decode(), Some(Frame::Ok));
    }

    #[test]
    fn test_packet_split_across_pushes() {
        let mut codec = LineCodec::new();
        codec.push(b"+RC");
        assert!(codec.decode().is_none());
        codec.push(b"V=1,4,ab");
        assert!(codec.decode().is_none());
        codec.push(b"cd,-50");
        assert!(codec.decode().is_none());
        codec.push(b",7\r\n");

        let packet = packet(codec.decode());
        assert_eq!(packet.payload.as_bytes(), b"abcd");
    }

    #[test]
    fn test_oversized_packet_is_consumed_by_declared_length() {
        let mut codec = LineCodec::new();
        let mut stream = b"+RCV=1,241,".to_vec();
        stream.extend_from_slice(&[b'x'; 241]);
        stream.extend_from_slice(b",-40,9\r\n+RCV=2,2,OK,-41,8\r\n");
        codec.push(&stream);

        assert!(matches!(codec.decode(), Some(Frame::Malformed(_))));
        let next = packet(codec.decode());
        assert_eq!(next.address, 2);
        assert_eq!(next.payload.as_bytes(), b"OK");
    }

    #[test]
    fn test_bad_trailer_resynchronizes() {
        let mut codec = LineCodec::new();
        codec.push(b"+RCV=1,2,hi,loud,9\r\n+ERR=2\r\n");

        assert!(matches!(codec.decode(), Some(Frame::Malformed(_))));
        assert_eq!(codec.decode(), Some(Frame::Error(2)));
    }

    #[test]
    fn test_bad_header_resynchronizes() {
        let mut codec = LineCodec::new();
        codec.push(b"+RCV=abc,2,hi\r\n+OK\r\n");

        assert!(matches!(codec.decode(), Some(Frame::Malformed(_))));
        assert_eq!(codec.decode(), Some(Frame::Ok));
    }

    #[test]
    fn test_truncated_packet_waits_for_data() {
        let mut codec = LineCodec::new();
        codec.push(b"+RCV=1,50,short,-1,1\r\n");

        assert!(codec.decode().is_none());
        assert!(!codec.is_empty());

        codec.clear();
        codec.push(b"+RCV=2,5,HELLO,-40,9\r\n");
        assert_eq!(packet(codec.decode()).address, 2);
    }

    #[test]
    fn test_unterminated_garbage_is_bounded() {
        let mut codec = LineCodec::new();
        codec.push(&[b'z'; MAX_LINE_LENGTH + 1]);

        assert!(codec.decode().is_none());
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_garbage_keeps_following_packet() {
        let mut codec = LineCodec::new();
        codec.push(&[b'z'; MAX_LINE_LENGTH + 2]);
        codec.push(b"+RCV=3,2,hi");

        assert!(codec.decode().is_none());
        assert_eq!(codec.buffer_as_str(), "+RCV=3,2,hi");

        codec.push(b",-40,9\r\n");
        let packet = packet(codec.decode());
        assert_eq!(packet.address, 3);
        assert_eq!(packet.payload.as_bytes(), b"hi");
    }

    #[test]
    fn test_garbage_before_partial_line_keeps_line() {
        let mut codec = LineCodec::new();
        codec.push(&[b'z'; MAX_LINE_LENGTH + 2]);
        codec.push(b"+ER");

        assert!(codec.decode().is_none());
        codec.push(b"R=4\r\n");
        assert_eq!(codec.decode(), Some(Frame::Error(4)));
    }
}
