//! BattlEye RCon datagram encoding and decoding.
//!
//! Every datagram carries a fixed header followed by a type byte and a body:
//!
//! ```text
//! 'B' 'E' | crc32 (LE, 4 bytes) | 0xFF | type | body...
//! ```
//!
//! The checksum covers everything from the `0xFF` terminator onwards. The same
//! three packet types travel in both directions; what the body means depends on
//! who sent it:
//!
//! | type | client → server       | server → client                       |
//! |------|-----------------------|---------------------------------------|
//! | 0x00 | secret                | `0x01` accepted / `0x00` rejected     |
//! | 0x01 | seq, command          | seq, payload (or fragment header)     |
//! | 0x02 | seq (acknowledgement) | seq, unsolicited message              |

use bytes::{BufMut, Bytes, BytesMut};
use crc32fast::Hasher;

use crate::error::{WireError, WireResult};

/// Leading bytes of every datagram.
pub const MAGIC: [u8; 2] = *b"BE";

/// Byte separating the checksum from the packet type.
pub const TERMINATOR: u8 = 0xFF;

/// Magic + checksum + terminator.
pub const HEADER_SIZE: usize = 7;

/// Receive buffer size; BattlEye splits anything larger into fragments.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Packet type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Login = 0x00,
    Command = 0x01,
    Message = 0x02,
}

impl TryFrom<u8> for PacketType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PacketType::Login),
            0x01 => Ok(PacketType::Command),
            0x02 => Ok(PacketType::Message),
            other => Err(WireError::UnknownType(other)),
        }
    }
}

/// A decoded RCon datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Login request (secret) or login response (single status byte).
    Login(Bytes),
    /// Command request or command response, correlated by `seq`.
    Command { seq: u8, payload: Bytes },
    /// Unsolicited server message, or the client's acknowledgement of one.
    Message { seq: u8, payload: Bytes },
}

impl Packet {
    pub fn login(secret: &str) -> Self {
        Packet::Login(Bytes::copy_from_slice(secret.as_bytes()))
    }

    pub fn login_response(accepted: bool) -> Self {
        let status: &'static [u8] = if accepted { &[0x01] } else { &[0x00] };
        Packet::Login(Bytes::from_static(status))
    }

    pub fn command(seq: u8, command: &str) -> Self {
        Packet::Command {
            seq,
            payload: Bytes::copy_from_slice(command.as_bytes()),
        }
    }

    /// An empty command. The server answers it and resets its idle timer.
    pub fn keep_alive(seq: u8) -> Self {
        Packet::Command {
            seq,
            payload: Bytes::new(),
        }
    }

    /// One part of a multi-packet command response.
    pub fn fragment(seq: u8, total: u8, index: u8, data: &[u8]) -> Self {
        let mut payload = BytesMut::with_capacity(3 + data.len());
        payload.put_u8(0x00);
        payload.put_u8(total);
        payload.put_u8(index);
        payload.put_slice(data);
        Packet::Command {
            seq,
            payload: payload.freeze(),
        }
    }

    pub fn message(seq: u8, text: &str) -> Self {
        Packet::Message {
            seq,
            payload: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    /// Acknowledgement the client owes for every server message.
    pub fn ack(seq: u8) -> Self {
        Packet::Message {
            seq,
            payload: Bytes::new(),
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Login(_) => PacketType::Login,
            Packet::Command { .. } => PacketType::Command,
            Packet::Message { .. } => PacketType::Message,
        }
    }

    /// Encodes the packet into a complete datagram.
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::with_capacity(64);
        body.put_u8(TERMINATOR);
        body.put_u8(self.packet_type() as u8);

        match self {
            Packet::Login(payload) => body.put_slice(payload),
            Packet::Command { seq, payload } | Packet::Message { seq, payload } => {
                body.put_u8(*seq);
                body.put_slice(payload);
            }
        }

        let mut datagram = BytesMut::with_capacity(HEADER_SIZE - 1 + body.len());
        datagram.put_slice(&MAGIC);
        datagram.put_u32_le(compute_checksum(&body));
        datagram.put_slice(&body);
        datagram.freeze()
    }

    /// Decodes one datagram, verifying magic, terminator and checksum.
    pub fn decode(data: &[u8]) -> WireResult<Self> {
        if data.len() < HEADER_SIZE + 1 {
            return Err(WireError::Truncated {
                needed: HEADER_SIZE + 1,
                available: data.len(),
            });
        }

        let magic = [data[0], data[1]];
        if magic != MAGIC {
            return Err(WireError::InvalidMagic(magic));
        }

        let expected = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        let actual = compute_checksum(&data[HEADER_SIZE - 1..]);
        if expected != actual {
            return Err(WireError::ChecksumMismatch { expected, actual });
        }

        if data[HEADER_SIZE - 1] != TERMINATOR {
            return Err(WireError::InvalidTerminator(data[HEADER_SIZE - 1]));
        }

        let packet_type = PacketType::try_from(data[HEADER_SIZE])?;
        let body = &data[HEADER_SIZE + 1..];

        match packet_type {
            PacketType::Login => Ok(Packet::Login(Bytes::copy_from_slice(body))),
            PacketType::Command | PacketType::Message => {
                let (&seq, payload) = body.split_first().ok_or(WireError::Truncated {
                    needed: HEADER_SIZE + 2,
                    available: data.len(),
                })?;
                let payload = Bytes::copy_from_slice(payload);

                if packet_type == PacketType::Command {
                    Ok(Packet::Command { seq, payload })
                } else {
                    Ok(Packet::Message { seq, payload })
                }
            }
        }
    }
}

/// Interpretation of a command response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The whole response fit into one datagram.
    Complete(Bytes),
    /// Part `index` of `total` parts sharing one sequence number.
    Fragment { total: u8, index: u8, data: Bytes },
}

impl Reply {
    pub fn parse(payload: Bytes) -> Self {
        if payload.len() >= 3 && payload[0] == 0x00 {
            let total = payload[1];
            let index = payload[2];
            Reply::Fragment {
                total,
                index,
                data: payload.slice(3..),
            }
        } else {
            Reply::Complete(payload)
        }
    }
}

fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
