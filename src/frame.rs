//! Provides types representing the yamux wire format as well as utilities
//! for encoding and decoding frames from a byte buffer.
//!
//! Every frame starts with a 12-byte big-endian header:
//!
//! ```text
//! version(1) | type(1) | flags(2) | stream_id(4) | length(4)
//! ```
//!
//! DATA frames are followed by `length` payload bytes. WINDOW_UPDATE and
//! GO_AWAY frames carry a 4-byte `u32` payload (zero-length WINDOW_UPDATE
//! frames are accepted as pure flag carriers). PING frames have no payload;
//! the opaque token travels in the `stream_id` field and is echoed in the
//! ACK.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use core::fmt;
use num_enum::TryFromPrimitive;
use std::io::Cursor;
use thiserror::Error;

/// The only protocol version this engine speaks.
pub const PROTOCOL_VERSION: u8 = 0;

/// Frame type octet (header byte 1).
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Stream payload bytes; also carries FIN/RST flags
    Data = 0,
    /// Flow-control credit; also opens (SYN) and acknowledges (ACK) streams
    WindowUpdate = 1,
    /// Session round-trip probe
    Ping = 2,
    /// Session teardown announcement
    GoAway = 3,
}

impl FrameType {
    fn name(self) -> &'static str {
        match self {
            FrameType::Data => "DATA",
            FrameType::WindowUpdate => "WINDOW_UPDATE",
            FrameType::Ping => "PING",
            FrameType::GoAway => "GO_AWAY",
        }
    }
}

/// Reason codes carried in a GO_AWAY payload.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GoAwayCode {
    /// Normal session termination
    Normal = 0,
    /// The peer detected a protocol violation
    ProtocolViolation = 1,
    /// The peer hit an internal error
    InternalError = 2,
}

/// Flag bitset (header bytes 2-3). Unknown bits are preserved by the
/// codec and ignored by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(u16);

impl Flags {
    /// Opens a new stream
    pub const SYN: Flags = Flags(0x1);
    /// Acknowledges a SYN
    pub const ACK: Flags = Flags(0x2);
    /// Half-closes the sender's direction
    pub const FIN: Flags = Flags(0x4);
    /// Aborts the stream immediately
    pub const RST: Flags = Flags(0x8);

    /// The empty flag set.
    pub fn empty() -> Flags {
        Flags(0)
    }

    /// Reconstitute a flag set from its wire representation.
    pub fn from_bits(bits: u16) -> Flags {
        Flags(bits)
    }

    /// The wire representation of this flag set.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(fmt, "-");
        }
        let mut first = true;
        for (bit, name) in [
            (Flags::SYN, "SYN"),
            (Flags::ACK, "ACK"),
            (Flags::FIN, "FIN"),
            (Flags::RST, "RST"),
        ] {
            if self.contains(bit) {
                if !first {
                    write!(fmt, "|")?;
                }
                write!(fmt, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// The fixed 12-byte frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub frame_type: FrameType,
    pub flags: Flags,
    pub stream_id: u32,
    pub length: u32,
}

impl Header {
    pub const SIZE: usize = 12;

    /// Encode the header to `buf`. Encoding is total: every `Header`
    /// value has a wire representation.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(self.frame_type as u8);
        buf.put_u16(self.flags.bits());
        buf.put_u32(self.stream_id);
        buf.put_u32(self.length);
    }

    /// Decode a header from `buf`.
    ///
    /// Fails with a protocol error on an unknown version or type octet.
    /// Flags and length are never rejected here; the session validates
    /// them per frame type.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Header, FrameDecodeError> {
        if buf.remaining() < Self::SIZE {
            return Err(FrameDecodeError::Incomplete);
        }

        let version = buf.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(FrameDecodeError::UnsupportedVersion(version));
        }

        let type_raw = buf.get_u8();
        let frame_type = FrameType::try_from(type_raw)
            .map_err(|_| FrameDecodeError::UnknownFrameType(type_raw))?;
        let flags = Flags::from_bits(buf.get_u16());
        let stream_id = buf.get_u32();
        let length = buf.get_u32();

        Ok(Header {
            frame_type,
            flags,
            stream_id,
            length,
        })
    }

    /// Payload bytes that follow this header on the wire.
    pub fn payload_len(&self) -> usize {
        match self.frame_type {
            FrameType::Data => self.length as usize,
            // WINDOW_UPDATE may be length 0 (pure flags) or 4; GO_AWAY is 4.
            FrameType::WindowUpdate | FrameType::GoAway => self.length as usize,
            // PING carries its token in the stream_id field.
            FrameType::Ping => 0,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{}(id={}, flags={}, len={})",
            self.frame_type.name(),
            self.stream_id,
            self.flags,
            self.length
        )
    }
}

/// A fully decoded frame: the header plus its typed payload.
///
/// The session dispatches on this sum type, so handling is exhaustive at
/// compile time, so a new frame type cannot be half-wired in.
#[derive(Clone, Debug)]
pub enum Frame {
    Data { header: Header, body: Bytes },
    WindowUpdate { header: Header, delta: u32 },
    Ping { header: Header, token: u32 },
    GoAway { header: Header, code: u32 },
}

/// Errors produced while decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameDecodeError {
    /// Not enough data is available to decode
    #[error("not enough data to decode a frame")]
    Incomplete,

    /// The version octet was not 0
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// The type octet was outside the four defined frame types
    #[error("unknown frame type {0:#04x}")]
    UnknownFrameType(u8),

    /// The length field is invalid for the frame type
    #[error("length {length} is invalid for a {frame_type} frame")]
    LengthMismatch {
        frame_type: &'static str,
        length: u32,
    },
}

impl Frame {
    /// A DATA frame owning `body`.
    pub fn data(stream_id: u32, flags: Flags, body: Bytes) -> Frame {
        Frame::Data {
            header: Header {
                frame_type: FrameType::Data,
                flags,
                stream_id,
                length: body.len() as u32,
            },
            body,
        }
    }

    /// A window-bearing WINDOW_UPDATE frame (length 4).
    pub fn window_update(stream_id: u32, flags: Flags, delta: u32) -> Frame {
        Frame::WindowUpdate {
            header: Header {
                frame_type: FrameType::WindowUpdate,
                flags,
                stream_id,
                length: 4,
            },
            delta,
        }
    }

    /// A pure flag frame: WINDOW_UPDATE with length 0 and no payload.
    pub fn flags_only(stream_id: u32, flags: Flags) -> Frame {
        Frame::WindowUpdate {
            header: Header {
                frame_type: FrameType::WindowUpdate,
                flags,
                stream_id,
                length: 0,
            },
            delta: 0,
        }
    }

    /// A PING frame. The token rides in the stream_id field.
    pub fn ping(flags: Flags, token: u32) -> Frame {
        Frame::Ping {
            header: Header {
                frame_type: FrameType::Ping,
                flags,
                stream_id: token,
                length: 0,
            },
            token,
        }
    }

    /// A GO_AWAY frame carrying `code` in its 4-byte payload.
    pub fn go_away(code: GoAwayCode) -> Frame {
        Frame::GoAway {
            header: Header {
                frame_type: FrameType::GoAway,
                flags: Flags::empty(),
                stream_id: 0,
                length: 4,
            },
            code: code as u32,
        }
    }

    /// Assemble a frame from a decoded header and its payload bytes.
    ///
    /// `payload` must hold exactly `header.payload_len()` bytes; the
    /// caller (the session accumulator) guarantees this. Per-type length
    /// rules are validated here, above the pure header codec.
    pub fn parse(header: Header, mut payload: Bytes) -> Result<Frame, FrameDecodeError> {
        match header.frame_type {
            FrameType::Data => Ok(Frame::Data {
                header,
                body: payload,
            }),
            FrameType::WindowUpdate => match header.length {
                // Length 0 carries flags only; the reference implementation
                // emits these and ingress must accept them.
                0 => Ok(Frame::WindowUpdate { header, delta: 0 }),
                4 => Ok(Frame::WindowUpdate {
                    header,
                    delta: payload.get_u32(),
                }),
                other => Err(FrameDecodeError::LengthMismatch {
                    frame_type: "WINDOW_UPDATE",
                    length: other,
                }),
            },
            FrameType::Ping => {
                if header.length != 0 {
                    return Err(FrameDecodeError::LengthMismatch {
                        frame_type: "PING",
                        length: header.length,
                    });
                }
                Ok(Frame::Ping {
                    header,
                    token: header.stream_id,
                })
            }
            FrameType::GoAway => {
                if header.length != 4 {
                    return Err(FrameDecodeError::LengthMismatch {
                        frame_type: "GO_AWAY",
                        length: header.length,
                    });
                }
                Ok(Frame::GoAway {
                    header,
                    code: payload.get_u32(),
                })
            }
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Frame::Data { header, .. } => header,
            Frame::WindowUpdate { header, .. } => header,
            Frame::Ping { header, .. } => header,
            Frame::GoAway { header, .. } => header,
        }
    }

    /// Serialize the whole frame (header and payload) to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        self.header().encode(buf);
        match self {
            Frame::Data { body, .. } => buf.put_slice(body),
            Frame::WindowUpdate { header, delta } => {
                if header.length == 4 {
                    buf.put_u32(*delta);
                }
            }
            Frame::Ping { .. } => {}
            Frame::GoAway { code, .. } => buf.put_u32(*code),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.header().fmt(fmt)
    }
}

impl From<FrameDecodeError> for ProtocolError {
    fn from(src: FrameDecodeError) -> ProtocolError {
        match src {
            // The accumulator never hands out short buffers; reaching this
            // arm means the session's parser state is corrupt.
            FrameDecodeError::Incomplete => ProtocolError::LengthMismatch {
                frame_type: "HEADER",
                length: 0,
            },
            FrameDecodeError::UnsupportedVersion(v) => ProtocolError::UnsupportedVersion(v),
            FrameDecodeError::UnknownFrameType(t) => ProtocolError::UnknownFrameType(t),
            FrameDecodeError::LengthMismatch { frame_type, length } => {
                ProtocolError::LengthMismatch { frame_type, length }
            }
        }
    }
}
