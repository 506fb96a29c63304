// ABOUTME: The session engine: one transport, many streams, credit-based flow control
// ABOUTME: Single-threaded cooperative; progress() handles at most one inbound frame per call

//! Session engine and embedder surface.
//!
//! A [`Session`] owns the transport and every stream multiplexed over
//! it. The embedder drives the engine by calling [`Session::progress`],
//! which pulls bytes from the transport, decodes at most one frame, and
//! dispatches it; all other operations (`open_stream`, `accept_stream`,
//! `read`, `write`, `close`, `ping`, ...) never perform inbound I/O and
//! never block internally. Suspension is signalled with
//! [`Error::WouldBlock`] and resolved by calling `progress` again.
//!
//! The transport is anything implementing [`std::io::Read`] and
//! [`std::io::Write`]: a blocking socket, a nonblocking socket whose
//! would-block errors become [`Error::WouldBlock`], a pipe, a UART. A
//! partial frame received from a nonblocking transport is accumulated
//! across `progress` calls; a transport that blocks mid-write is
//! reported as an I/O error because the engine keeps no write queue.

pub mod keepalive;
pub mod stream;
pub(crate) mod table;

use crate::config::Config;
use crate::error::{Error, ProtocolError, Result};
use crate::frame::{Flags, Frame, FrameType, GoAwayCode, Header};
use crate::session::keepalive::{Keepalive, PingStats};
use crate::session::stream::{State, Stream};
use crate::session::table::StreamTable;
use bytes::{Buf, Bytes, BytesMut};
use std::io::{self, Cursor, Read, Write};
use std::time::Duration;
use tracing::{debug, trace, warn};

pub use crate::session::stream::StreamHandle;

/// Which side of the transport this session is.
///
/// The client allocates odd stream ids, the server even ones, so the
/// two sides can open streams concurrently without coordination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Client,
    Server,
}

/// A yamux session over a single reliable, ordered byte transport.
pub struct Session<T> {
    transport: T,
    mode: Mode,
    config: Config,
    /// Next id for a locally opened stream; steps by 2 to keep parity.
    next_stream_id: u32,
    /// Highest peer-initiated id seen; used to tell a finished stream
    /// from an id that never existed.
    highest_remote_id: u32,
    table: StreamTable,
    /// Inbound byte accumulator. Partial frames survive across
    /// progress calls here.
    inbound: BytesMut,
    /// Parser state: a decoded header whose payload has not fully
    /// arrived yet.
    pending_header: Option<Header>,
    local_go_away: bool,
    remote_go_away: bool,
    closed: bool,
    keepalive: Keepalive,
    /// Egress serialization scratch, reused across frames.
    scratch: BytesMut,
}

impl<T: Read + Write> Session<T> {
    /// Create the client side of a session over `transport`.
    pub fn client(transport: T, config: Config) -> Session<T> {
        Session::new(transport, config, Mode::Client)
    }

    /// Create the server side of a session over `transport`.
    pub fn server(transport: T, config: Config) -> Session<T> {
        Session::new(transport, config, Mode::Server)
    }

    fn new(transport: T, config: Config, mode: Mode) -> Session<T> {
        let keepalive = Keepalive::new(config.enable_keepalive, config.keepalive_interval);
        Session {
            transport,
            mode,
            next_stream_id: match mode {
                Mode::Client => 1,
                Mode::Server => 2,
            },
            highest_remote_id: 0,
            table: StreamTable::new(),
            inbound: BytesMut::with_capacity(4 * 1024),
            pending_header: None,
            local_go_away: false,
            remote_go_away: false,
            closed: false,
            keepalive,
            scratch: BytesMut::with_capacity(Header::SIZE + config.max_frame_size as usize),
            config,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether this session has been shut down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the peer announced GO_AWAY. New opens fail once set;
    /// existing streams run to completion.
    pub fn go_away_received(&self) -> bool {
        self.remote_go_away
    }

    /// Number of live streams in the table.
    pub fn num_streams(&self) -> usize {
        self.table.len()
    }

    /// Round-trip time of the most recently acknowledged PING.
    pub fn last_rtt(&self) -> Option<Duration> {
        self.keepalive.last_rtt()
    }

    /// PING traffic counters for this session.
    pub fn ping_stats(&self) -> PingStats {
        self.keepalive.stats()
    }

    // ------------------------------------------------------------------
    // Progress: inbound frame pump
    // ------------------------------------------------------------------

    /// Drive the engine: read from the transport, decode and dispatch
    /// at most one frame, and emit any responses it requires.
    ///
    /// Returns `Ok(())` after handling one frame. `WouldBlock` means no
    /// complete frame is available yet; call again once the transport
    /// is readable. A protocol error reports the violation without
    /// tearing the session down; the embedder decides whether to send
    /// GO_AWAY and shut down.
    pub fn progress(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }

        self.maybe_keepalive()?;

        loop {
            if let Some(frame) = self.extract_frame()? {
                return self.dispatch(frame);
            }
            self.fill_inbound()?;
        }
    }

    /// Try to cut one complete frame out of the accumulator.
    fn extract_frame(&mut self) -> Result<Option<Frame>> {
        if self.pending_header.is_none() {
            if self.inbound.len() < Header::SIZE {
                return Ok(None);
            }
            let mut cursor = Cursor::new(&self.inbound[..]);
            let header = Header::decode(&mut cursor).map_err(ProtocolError::from)?;
            self.inbound.advance(Header::SIZE);
            self.validate_length(&header)?;
            self.pending_header = Some(header);
        }

        let header = match self.pending_header {
            Some(header) => header,
            None => return Err(Error::Internal("parser state lost")),
        };
        let need = header.payload_len();
        if self.inbound.len() < need {
            return Ok(None);
        }

        let payload = self.inbound.split_to(need).freeze();
        self.pending_header = None;
        let frame = Frame::parse(header, payload).map_err(ProtocolError::from)?;
        trace!(%frame, "recv");
        Ok(Some(frame))
    }

    /// Bound the length field before committing to buffer the payload,
    /// so a hostile header cannot make the accumulator grow without
    /// limit.
    fn validate_length(&self, header: &Header) -> Result<()> {
        let bad = match header.frame_type {
            FrameType::Data => header.length > self.config.max_stream_window_size,
            FrameType::WindowUpdate => !matches!(header.length, 0 | 4),
            FrameType::Ping => header.length != 0,
            FrameType::GoAway => header.length != 4,
        };
        if bad {
            return Err(ProtocolError::LengthMismatch {
                frame_type: match header.frame_type {
                    FrameType::Data => "DATA",
                    FrameType::WindowUpdate => "WINDOW_UPDATE",
                    FrameType::Ping => "PING",
                    FrameType::GoAway => "GO_AWAY",
                },
                length: header.length,
            }
            .into());
        }
        Ok(())
    }

    /// Pull more bytes from the transport into the accumulator.
    fn fill_inbound(&mut self) -> Result<()> {
        let mut chunk = [0u8; 4096];
        match self.transport.read(&mut chunk) {
            Ok(0) => {
                // End-of-stream is an I/O failure to the engine, even at
                // a clean frame boundary.
                let detail = if self.inbound.is_empty() && self.pending_header.is_none() {
                    "transport closed"
                } else {
                    "transport closed mid-frame"
                };
                Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    detail,
                )))
            }
            Ok(n) => {
                self.inbound.extend_from_slice(&chunk[..n]);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn maybe_keepalive(&mut self) -> Result<()> {
        if self.keepalive.should_ping() {
            let token = self.keepalive.next_token();
            self.send_frame(&Frame::ping(Flags::SYN, token))?;
            self.keepalive.on_ping_sent(token);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inbound frame handlers
    // ------------------------------------------------------------------

    fn dispatch(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Data { header, body } => self.on_data(header, body),
            Frame::WindowUpdate { header, delta } => self.on_window_update(header, delta),
            Frame::Ping { header, token } => self.on_ping(header, token),
            Frame::GoAway { code, .. } => self.on_go_away(code),
        }
    }

    fn on_data(&mut self, header: Header, body: Bytes) -> Result<()> {
        let id = header.stream_id;
        if id == 0 {
            return Err(ProtocolError::ReservedStreamId.into());
        }
        if header.flags.contains(Flags::RST) {
            self.on_remote_reset(id);
            return Ok(());
        }

        enum Action {
            Delivered,
            UnknownStream,
            Violation(&'static str),
            NoMemory,
        }

        let fin = header.flags.contains(Flags::FIN);
        let action = match self.table.get_mut(id) {
            None => Action::UnknownStream,
            Some(stream) if !stream.state.can_recv_data() => Action::Violation("data after fin"),
            Some(stream) if (body.len() as u32) > stream.recv_window => {
                Action::Violation("receive window exceeded")
            }
            Some(stream) => {
                if stream.buffer.write(&body).is_err() {
                    Action::NoMemory
                } else {
                    stream.recv_window -= body.len() as u32;
                    if fin {
                        stream.on_recv_fin();
                    }
                    Action::Delivered
                }
            }
        };

        match action {
            Action::Delivered => Ok(()),
            Action::UnknownStream => {
                // Reference tolerance: the payload is already consumed
                // from the accumulator; tell the peer to stop.
                warn!(stream = id, "data for unknown stream, answering rst");
                self.send_frame(&Frame::flags_only(id, Flags::RST))
            }
            Action::Violation(what) => {
                warn!(stream = id, what, "resetting stream");
                self.reset_stream_local(id)
            }
            Action::NoMemory => {
                let _ = self.reset_stream_local(id);
                Err(Error::NoMemory)
            }
        }
    }

    fn on_window_update(&mut self, header: Header, delta: u32) -> Result<()> {
        let id = header.stream_id;
        if id == 0 {
            return Err(ProtocolError::ReservedStreamId.into());
        }
        let flags = header.flags;
        if flags.contains(Flags::RST) {
            self.on_remote_reset(id);
            return Ok(());
        }
        if flags.contains(Flags::SYN) && !flags.contains(Flags::ACK) {
            return self.on_inbound_open(id, delta, flags);
        }

        enum Action {
            Done,
            Unknown,
            Overflow,
        }

        let action = match self.table.get_mut(id) {
            None => Action::Unknown,
            Some(stream) => {
                if flags.contains(Flags::SYN) && flags.contains(Flags::ACK) {
                    // Handshake completion: the payload is the peer's
                    // actual receive window, replacing our assumption.
                    stream.on_syn_ack(delta);
                    if flags.contains(Flags::FIN) {
                        stream.on_recv_fin();
                    }
                    Action::Done
                } else if delta > 0 && stream.grow_send_window(delta).is_err() {
                    Action::Overflow
                } else {
                    if flags.contains(Flags::FIN) {
                        stream.on_recv_fin();
                    }
                    Action::Done
                }
            }
        };

        match action {
            Action::Done => Ok(()),
            Action::Unknown => {
                // A credit for a stream we already dropped is harmless.
                trace!(stream = id, "window update for unknown stream ignored");
                Ok(())
            }
            Action::Overflow => {
                warn!(stream = id, "send window overflow, resetting stream");
                self.reset_stream_local(id)
            }
        }
    }

    /// A peer SYN: allocate the inbound stream, acknowledge it, queue
    /// it for `accept_stream`.
    fn on_inbound_open(&mut self, id: u32, peer_window: u32, flags: Flags) -> Result<()> {
        let remote_parity = match self.mode {
            Mode::Client => 0,
            Mode::Server => 1,
        };
        if id % 2 != remote_parity {
            warn!(stream = id, "syn with local id parity, answering rst");
            return self.send_frame(&Frame::flags_only(id, Flags::RST));
        }

        self.highest_remote_id = self.highest_remote_id.max(id);

        if self.table.contains(id) {
            warn!(stream = id, "syn for an id already in use, answering rst");
            return self.send_frame(&Frame::flags_only(id, Flags::RST));
        }
        if self.local_go_away {
            debug!(stream = id, "syn after local go-away, answering rst");
            return self.send_frame(&Frame::flags_only(id, Flags::RST));
        }
        if self.table.len() >= self.config.max_num_streams {
            warn!(stream = id, "stream limit reached, answering rst");
            return self.send_frame(&Frame::flags_only(id, Flags::RST));
        }
        if self.table.accept_pending() >= self.config.accept_backlog {
            warn!(
                stream = id,
                backlog = self.config.accept_backlog,
                "accept backlog full, answering rst"
            );
            return self.send_frame(&Frame::flags_only(id, Flags::RST));
        }

        let our_window = self.config.max_stream_window_size;
        let mut stream = Stream::inbound(id, peer_window, our_window);
        debug!(stream = id, peer_window, "inbound stream");

        // Acknowledge immediately, advertising our receive window. The
        // stream is established before the embedder accepts it.
        self.send_frame(&Frame::window_update(id, Flags::SYN | Flags::ACK, our_window))?;
        stream.on_ack_sent();
        if flags.contains(Flags::FIN) {
            stream.on_recv_fin();
        }
        self.table.insert(stream);
        self.table.push_accept(id);
        Ok(())
    }

    fn on_ping(&mut self, header: Header, token: u32) -> Result<()> {
        if header.flags.contains(Flags::ACK) {
            self.keepalive.on_pong(token);
            Ok(())
        } else {
            trace!(token, "ping, echoing ack");
            self.send_frame(&Frame::ping(Flags::ACK, token))
        }
    }

    fn on_go_away(&mut self, code: u32) -> Result<()> {
        match GoAwayCode::try_from(code) {
            Ok(reason) => debug!(?reason, "peer sent go-away"),
            Err(_) => debug!(code, "peer sent go-away with unknown code"),
        }
        self.remote_go_away = true;
        Ok(())
    }

    /// The peer aborted `id`. Buffered bytes stay readable; the stream
    /// never reaches a clean EOF.
    fn on_remote_reset(&mut self, id: u32) {
        if let Some(stream) = self.table.get_mut(id) {
            debug!(stream = id, "reset by peer");
            stream.on_reset();
        }
    }

    // ------------------------------------------------------------------
    // Embedder operations
    // ------------------------------------------------------------------

    /// Open a new outbound stream, emitting its SYN immediately.
    ///
    /// Data may be written before the peer's acknowledgement arrives;
    /// until then the send window is the locally configured default.
    pub fn open_stream(&mut self) -> Result<StreamHandle> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.local_go_away || self.remote_go_away {
            return Err(Error::Closed);
        }
        if self.table.len() >= self.config.max_num_streams {
            return Err(Error::TooManyStreams);
        }
        let id = self.next_stream_id;
        let next = match id.checked_add(2) {
            Some(next) => next,
            // The 31-bit id space for this side is spent.
            None => return Err(Error::TooManyStreams),
        };

        let window = self.config.max_stream_window_size;
        self.send_frame(&Frame::window_update(id, Flags::SYN, window))?;
        self.next_stream_id = next;
        self.table.insert(Stream::outbound(id, window));
        debug!(stream = id, "opened stream");
        Ok(StreamHandle::new(id))
    }

    /// Dequeue the oldest inbound stream the peer has opened.
    ///
    /// `WouldBlock` when none is pending; `Closed` once the peer has
    /// gone away and the queue is empty.
    pub fn accept_stream(&mut self) -> Result<StreamHandle> {
        if self.closed {
            return Err(Error::Closed);
        }
        match self.table.pop_accept() {
            Some(id) => {
                debug!(stream = id, "accepted stream");
                Ok(StreamHandle::new(id))
            }
            None if self.remote_go_away => Err(Error::Closed),
            None => Err(Error::WouldBlock),
        }
    }

    /// Read from a stream's receive buffer into `dst`.
    ///
    /// `Ok(0)` signals a clean end-of-stream after the peer's FIN.
    /// `WouldBlock` means no data is buffered yet; drive `progress` and
    /// retry. A reset stream drains its remaining bytes and then fails
    /// `Closed`.
    pub fn read(&mut self, stream: StreamHandle, dst: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        if dst.is_empty() {
            return Err(Error::Invalid("read buffer is empty"));
        }
        let id = stream.id();

        enum After {
            Nothing,
            Remove,
            Replenish(u32),
        }

        let (result, after) = match self.table.get_mut(id) {
            None => return Err(self.gone(id)),
            Some(stream) => {
                if !stream.buffer.is_empty() {
                    let n = stream.buffer.read(dst);
                    trace!(stream = id, bytes = n, "read");
                    // Replenish the peer's credit once at least half
                    // the window has been consumed, provided its
                    // sending half is still open.
                    let max = self.config.max_stream_window_size;
                    let delta = stream.window_update_delta(max);
                    let peer_may_send = !stream.reset && stream.state.can_recv_data();
                    if peer_may_send && delta >= max / 2 {
                        stream.recv_window += delta;
                        (Ok(n), After::Replenish(delta))
                    } else {
                        (Ok(n), After::Nothing)
                    }
                } else if stream.reset {
                    (Err(Error::Closed), After::Remove)
                } else {
                    match stream.state {
                        State::FinRecv => {
                            stream.eof_delivered = true;
                            (Ok(0), After::Nothing)
                        }
                        State::Closed => {
                            // The at-most-one final read: deliver EOF,
                            // then release the stream.
                            stream.eof_delivered = true;
                            (Ok(0), After::Remove)
                        }
                        _ => (Err(Error::WouldBlock), After::Nothing),
                    }
                }
            }
        };

        match after {
            After::Nothing => {}
            After::Remove => {
                self.table.remove(id);
                debug!(stream = id, "stream released");
            }
            After::Replenish(delta) => {
                trace!(stream = id, delta, "window update");
                self.send_frame(&Frame::window_update(id, Flags::empty(), delta))?;
            }
        }
        result
    }

    /// Write `src` to a stream, splitting it into DATA frames within
    /// the peer's window. Returns the number of bytes accepted, which
    /// may be less than `src.len()` when the window is short; zero
    /// credit fails `WouldBlock` until the peer replenishes.
    pub fn write(&mut self, stream: StreamHandle, src: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        if src.is_empty() {
            return Err(Error::Invalid("write buffer is empty"));
        }
        let id = stream.id();

        let budget = match self.table.get_mut(id) {
            None => return Err(self.gone(id)),
            Some(stream) => {
                if !stream.state.can_write() {
                    return Err(Error::Closed);
                }
                if stream.send_window == 0 {
                    return Err(Error::WouldBlock);
                }
                src.len().min(stream.send_window as usize)
            }
        };

        let max_frame = self.config.max_frame_size as usize;
        let mut sent = 0;
        let mut failure = None;
        while sent < budget {
            let chunk_len = (budget - sent).min(max_frame);
            let chunk = Bytes::copy_from_slice(&src[sent..sent + chunk_len]);
            match self.send_frame(&Frame::data(id, Flags::empty(), chunk)) {
                Ok(()) => sent += chunk_len,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(stream) = self.table.get_mut(id) {
            stream.send_window -= sent as u32;
        }
        match failure {
            None => {
                trace!(stream = id, bytes = sent, "write");
                Ok(sent)
            }
            Some(e) => Err(e),
        }
    }

    /// Gracefully close our half of a stream by sending FIN. Reads
    /// continue to drain inbound data until the peer's FIN arrives.
    /// Idempotent: closing an already-finished stream is a no-op.
    pub fn close(&mut self, stream: StreamHandle) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        let id = stream.id();

        enum CloseAction {
            Nothing,
            SendFin { merge_delta: u32 },
        }

        let action = match self.table.get_mut(id) {
            None => {
                return match self.gone(id) {
                    Error::Closed => Ok(()),
                    other => Err(other),
                };
            }
            Some(stream) => match stream.state {
                State::FinSent | State::Closed => CloseAction::Nothing,
                _ => {
                    // Tie-break rule: a due replenishment rides the FIN
                    // frame instead of being emitted separately.
                    let max = self.config.max_stream_window_size;
                    let delta = stream.window_update_delta(max);
                    let merge_delta = if stream.state.can_recv_data() && delta >= max / 2 {
                        delta
                    } else {
                        0
                    };
                    CloseAction::SendFin { merge_delta }
                }
            },
        };

        match action {
            CloseAction::Nothing => Ok(()),
            CloseAction::SendFin { merge_delta } => {
                let frame = if merge_delta > 0 {
                    Frame::window_update(id, Flags::FIN, merge_delta)
                } else {
                    Frame::data(id, Flags::FIN, Bytes::new())
                };
                self.send_frame(&frame)?;

                let mut remove = false;
                if let Some(stream) = self.table.get_mut(id) {
                    if merge_delta > 0 {
                        stream.recv_window += merge_delta;
                    }
                    stream.on_send_fin();
                    remove = stream.state == State::Closed
                        && stream.buffer.is_empty()
                        && stream.eof_delivered;
                }
                if remove {
                    self.table.remove(id);
                    debug!(stream = id, "stream closed");
                }
                Ok(())
            }
        }
    }

    /// Abort a stream: send RST and drop it immediately. Pending
    /// buffered bytes on our side are discarded. Idempotent.
    pub fn reset(&mut self, stream: StreamHandle) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        let id = stream.id();
        if !self.table.contains(id) {
            return match self.gone(id) {
                Error::Closed => Ok(()),
                other => Err(other),
            };
        }
        debug!(stream = id, "reset by us");
        self.reset_stream_local(id)
    }

    /// Drop `id` from the table and tell the peer with RST.
    fn reset_stream_local(&mut self, id: u32) -> Result<()> {
        self.table.remove(id);
        self.send_frame(&Frame::flags_only(id, Flags::RST))
    }

    /// Send a PING now, regardless of the keepalive schedule. The ACK
    /// is matched by a later `progress` call and recorded as
    /// [`Session::last_rtt`].
    pub fn ping(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        let token = self.keepalive.next_token();
        self.send_frame(&Frame::ping(Flags::SYN, token))?;
        self.keepalive.on_ping_sent(token);
        Ok(())
    }

    /// Announce that this session will open no further streams.
    /// Existing streams continue until naturally closed.
    pub fn go_away(&mut self, code: GoAwayCode) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.local_go_away {
            return Ok(());
        }
        self.send_frame(&Frame::go_away(code))?;
        self.local_go_away = true;
        Ok(())
    }

    /// Shut the session down: GO_AWAY if not yet announced, RST every
    /// live stream (transport errors ignored), release all stream
    /// storage. Every later operation fails `Closed`. Idempotent.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if !self.local_go_away {
            let _ = self.send_frame(&Frame::go_away(GoAwayCode::Normal));
            self.local_go_away = true;
        }
        for stream in self.table.drain() {
            if stream.state != State::Closed {
                let _ = self.send_frame(&Frame::flags_only(stream.id, Flags::RST));
            }
        }
        self.closed = true;
        debug!("session shut down");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Classify an id that is not in the table: a stream this session
    /// once issued (either side) is merely closed; anything else was
    /// never a valid handle.
    fn gone(&self, id: u32) -> Error {
        if id == 0 {
            return Error::InvalidStream(id);
        }
        let local_parity = match self.mode {
            Mode::Client => 1,
            Mode::Server => 0,
        };
        let existed = if id % 2 == local_parity {
            id < self.next_stream_id
        } else {
            id <= self.highest_remote_id
        };
        if existed {
            Error::Closed
        } else {
            Error::InvalidStream(id)
        }
    }

    /// Serialize and write one frame atomically. The engine keeps no
    /// write queue, so a transport that stalls mid-frame is a fatal
    /// I/O error rather than a retryable would-block.
    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        trace!(%frame, "send");
        self.scratch.clear();
        frame.encode(&mut self.scratch);

        let mut remaining = &self.scratch[..];
        while !remaining.is_empty() {
            match self.transport.write(remaining) {
                Ok(0) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "transport refused the frame",
                    )));
                }
                Ok(n) => remaining = &remaining[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Deliberately covers would-block too: a frame already
                // half-written cannot be parked and resumed.
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }
}
