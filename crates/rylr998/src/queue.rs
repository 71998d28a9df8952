//! FIFO buffer of received packets.

use std::collections::VecDeque;

use rylr998_protocol::Packet;
use tracing::warn;

/// A packet removed from the queue, with its payload cut to the caller's
/// buffer size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pulled {
    /// Address of the transmitting module.
    pub address: u16,
    /// Payload bytes, at most the requested size.
    pub payload: Vec<u8>,
    /// Length of the payload as received, before any truncation.
    pub original_len: usize,
    pub rssi: i16,
    pub snr: i16,
}

impl Pulled {
    /// Whether bytes were lost because the requested size was too small.
    pub fn is_truncated(&self) -> bool {
        self.payload.len() < self.original_len
    }
}

/// Owns received packets from arrival until a consumer pulls them.
///
/// Insertion order is retrieval order. With a non-zero capacity the oldest
/// packet is evicted to make room for a new one.
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
    capacity: usize,
    dropped: u64,
}

impl PacketQueue {
    /// Create a queue holding at most `capacity` packets (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        PacketQueue {
            packets: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Append a packet.
    pub fn push(&mut self, packet: Packet) {
        if self.capacity > 0 && self.packets.len() >= self.capacity {
            if let Some(evicted) = self.packets.pop_front() {
                self.dropped += 1;
                warn!(
                    "packet queue full ({}), dropped packet from {} ({} bytes)",
                    self.capacity,
                    evicted.address,
                    evicted.len()
                );
            }
        }
        self.packets.push_back(packet);
    }

    /// Remove the oldest packet, copying at most `max_size` payload bytes.
    ///
    /// The packet is removed even when its payload does not fit; check
    /// [`Pulled::is_truncated`].
    pub fn pull(&mut self, max_size: usize) -> Option<Pulled> {
        let packet = self.packets.pop_front()?;
        let bytes = packet.payload.as_bytes();
        let n = bytes.len().min(max_size);
        Some(Pulled {
            address: packet.address,
            payload: bytes[..n].to_vec(),
            original_len: bytes.len(),
            rssi: packet.rssi,
            snr: packet.snr,
        })
    }

    /// Remove the oldest packet whole.
    pub fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    /// Payload length of the oldest packet, or 0 when empty.
    pub fn peek_head_size(&self) -> usize {
        self.packets.front().map_or(0, Packet::len)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Packets evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rylr998_protocol::Payload;

    fn packet(address: u16, data: &[u8]) -> Packet {
        Packet {
            address,
            payload: Payload::new(data).unwrap(),
            rssi: -40,
            snr: 9,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PacketQueue::new(0);
        for i in 0..10u16 {
            queue.push(packet(i, format!("msg {}", i).as_bytes()));
        }

        for i in 0..10u16 {
            let pulled = queue.pull(64).unwrap();
            assert_eq!(pulled.address, i);
            assert_eq!(pulled.payload, format!("msg {}", i).into_bytes());
        }
        assert!(queue.pull(64).is_none());
    }

    #[test]
    fn test_truncating_pull_removes_entry() {
        let mut queue = PacketQueue::new(0);
        queue.push(packet(1, b"HELLO WORLD"));
        queue.push(packet(2, b"NEXT"));

        let pulled = queue.pull(5).unwrap();
        assert_eq!(pulled.payload, b"HELLO");
        assert_eq!(pulled.original_len, 11);
        assert!(pulled.is_truncated());

        let next = queue.pull(5).unwrap();
        assert_eq!(next.address, 2);
        assert!(!next.is_truncated());
    }

    #[test]
    fn test_peek_head_size() {
        let mut queue = PacketQueue::new(0);
        assert_eq!(queue.peek_head_size(), 0);

        queue.push(packet(1, b"abc"));
        queue.push(packet(2, b"abcdefgh"));
        assert_eq!(queue.peek_head_size(), 3);
        assert_eq!(queue.len(), 2);

        queue.pop();
        assert_eq!(queue.peek_head_size(), 8);
    }

    #[test]
    fn test_bounded_queue_drops_oldest() {
        let mut queue = PacketQueue::new(2);
        queue.push(packet(1, b"a"));
        queue.push(packet(2, b"b"));
        queue.push(packet(3, b"c"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop().unwrap().address, 2);
        assert_eq!(queue.pop().unwrap().address, 3);
    }
}
