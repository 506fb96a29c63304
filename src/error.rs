// ABOUTME: Error taxonomy for the yamux engine covering embedder-facing failures
// ABOUTME: Maps transport would-block signals and codec violations into one structured enum

use std::io;
use thiserror::Error;

/// Error type for every operation surfaced to the embedder.
///
/// The engine never panics on peer misbehavior or transport trouble; each
/// failure mode is one of these variants. `WouldBlock` is an expected
/// runtime condition: the embedder re-invokes [`progress`] to make
/// forward progress and retries the blocked operation afterwards.
///
/// [`progress`]: crate::session::Session::progress
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed arguments (zero-length buffer where disallowed, etc.)
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    /// Allocation failure while growing a receive buffer
    #[error("out of memory")]
    NoMemory,

    /// Fatal transport read/write failure
    #[error("transport i/o error: {0}")]
    Io(io::Error),

    /// Stream or session is past its final state
    #[error("stream or session is closed")]
    Closed,

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,

    /// Peer violated the framing or state rules
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invariant violation; should not occur
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// Operation on a stream id that was never issued by this session
    #[error("unknown stream id {0}")]
    InvalidStream(u32),

    /// Operation cannot progress without more I/O or window credit
    #[error("operation would block")]
    WouldBlock,

    /// Stream limit reached; no new stream can be opened or accepted
    #[error("too many concurrent streams")]
    TooManyStreams,
}

/// Session-level protocol violations detected while decoding or
/// dispatching inbound frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The version octet was not 0
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// The type octet was outside the four defined frame types
    #[error("unknown frame type {0:#04x}")]
    UnknownFrameType(u8),

    /// The length field is not valid for the frame type carrying it
    #[error("length {length} is invalid for a {frame_type} frame")]
    LengthMismatch {
        frame_type: &'static str,
        length: u32,
    },

    /// A stream-addressed frame used the reserved session id 0
    #[error("stream id 0 is reserved for session frames")]
    ReservedStreamId,

    /// A window update pushed a stream's send window past u32::MAX
    #[error("send window overflow on stream {0}")]
    WindowOverflow(u32),
}

/// A specialized `Result` for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Error {
        if src.kind() == io::ErrorKind::WouldBlock {
            Error::WouldBlock
        } else {
            Error::Io(src)
        }
    }
}
