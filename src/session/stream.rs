// ABOUTME: Per-stream lifecycle: the seven-state machine, window accounting, EOF and reset rules
// ABOUTME: Streams are owned by the session; the embedder only ever holds a StreamHandle

use crate::buffer::ReceiveBuffer;
use crate::error::ProtocolError;
use tracing::trace;

/// The state of a yamux stream.
///
/// ```text
/// Idle ──send SYN──▶ SynSent ──recv SYN|ACK──▶ Established
/// Idle ──recv SYN──▶ SynRecv ──send ACK─────▶ Established
/// Established ──send FIN──▶ FinSent ──recv FIN──▶ Closed
/// Established ──recv FIN──▶ FinRecv ──send FIN──▶ Closed
/// any (non-Closed) ──send or recv RST──▶ Closed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    Idle,
    SynSent,
    SynRecv,
    Established,
    FinSent,
    FinRecv,
    Closed,
}

impl State {
    /// Can the embedder write on a stream in this state?
    ///
    /// `SynSent` is writable: the opener may send data before the
    /// peer's SYN-ACK returns. `FinRecv` is writable: the peer
    /// half-closed its direction, ours is still open.
    pub(crate) fn can_write(self) -> bool {
        matches!(self, State::SynSent | State::Established | State::FinRecv)
    }

    /// Can the peer still deliver DATA to a stream in this state?
    /// Data after the peer's own FIN (`FinRecv`) or on a closed stream
    /// is a violation answered with RST.
    pub(crate) fn can_recv_data(self) -> bool {
        !matches!(self, State::FinRecv | State::Closed)
    }
}

/// An opaque, copyable handle to one stream of a session.
///
/// A handle is only meaningful together with the session that issued
/// it; every operation re-validates it against the stream table.
/// Handles survive the stream (operations on a finished stream fail
/// with `closed`), and a handle that this session never issued fails
/// with `invalid-stream`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    id: u32,
}

impl StreamHandle {
    pub(crate) fn new(id: u32) -> StreamHandle {
        StreamHandle { id }
    }

    /// The wire-level stream id behind this handle.
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// One bidirectional byte channel within a session.
#[derive(Debug)]
pub(crate) struct Stream {
    pub(crate) id: u32,
    pub(crate) state: State,
    /// The send window assumed at open time, needed to reconcile the
    /// peer's SYN-ACK advertisement with bytes already in flight.
    initial_send_window: u32,
    /// Bytes we may still transmit before the peer must send credit.
    pub(crate) send_window: u32,
    /// Bytes the peer may still transmit before we owe it credit.
    pub(crate) recv_window: u32,
    pub(crate) buffer: ReceiveBuffer,
    /// Closed by RST (either direction). Reset streams drain buffered
    /// bytes but never deliver a clean EOF.
    pub(crate) reset: bool,
    /// The one final EOF read has been handed to the embedder.
    pub(crate) eof_delivered: bool,
}

impl Stream {
    fn idle(id: u32, send_window: u32, recv_window: u32) -> Stream {
        Stream {
            id,
            state: State::Idle,
            initial_send_window: send_window,
            send_window,
            recv_window,
            buffer: ReceiveBuffer::new(),
            reset: false,
            eof_delivered: false,
        }
    }

    /// A locally opened stream; its SYN goes out with the open call.
    /// The send window starts at our own configured window: the
    /// handshake has not told us the peer's yet, and both sides
    /// advertise symmetric defaults. The SYN-ACK payload replaces the
    /// assumption with the peer's actual value.
    pub(crate) fn outbound(id: u32, window: u32) -> Stream {
        let mut stream = Stream::idle(id, window, window);
        stream.set_state(State::SynSent);
        stream
    }

    /// A peer-opened stream. The SYN payload is the peer's receive
    /// window, which is our send window.
    pub(crate) fn inbound(id: u32, peer_window: u32, our_window: u32) -> Stream {
        let mut stream = Stream::idle(id, peer_window, our_window);
        stream.set_state(State::SynRecv);
        stream
    }

    fn set_state(&mut self, next: State) {
        if self.state != next {
            trace!(stream = self.id, from = ?self.state, to = ?next, "stream state");
            self.state = next;
        }
    }

    /// The peer acknowledged our SYN and advertised its window.
    ///
    /// Data written before the acknowledgement arrived has already
    /// consumed part of the peer's window, so the advertisement is
    /// reduced by what was spent against the assumed default.
    pub(crate) fn on_syn_ack(&mut self, window: u32) {
        if self.state == State::SynSent {
            let spent = self.initial_send_window.saturating_sub(self.send_window);
            self.send_window = window.saturating_sub(spent);
            self.set_state(State::Established);
        }
    }

    /// Our SYN-ACK for this inbound stream went out on the wire.
    pub(crate) fn on_ack_sent(&mut self) {
        if self.state == State::SynRecv {
            self.set_state(State::Established);
        }
    }

    /// The peer half-closed its direction.
    pub(crate) fn on_recv_fin(&mut self) {
        match self.state {
            State::Idle | State::SynSent | State::SynRecv | State::Established => {
                self.set_state(State::FinRecv)
            }
            State::FinSent => self.set_state(State::Closed),
            State::FinRecv | State::Closed => {}
        }
    }

    /// Our FIN went out on the wire.
    pub(crate) fn on_send_fin(&mut self) {
        match self.state {
            State::Idle | State::SynSent | State::SynRecv | State::Established => {
                self.set_state(State::FinSent)
            }
            State::FinRecv => self.set_state(State::Closed),
            State::FinSent | State::Closed => {}
        }
    }

    /// A RST was sent or received. Buffered bytes stay readable; the
    /// stream never reaches a clean EOF.
    pub(crate) fn on_reset(&mut self) {
        self.reset = true;
        self.set_state(State::Closed);
    }

    /// Add credit from a bare WINDOW_UPDATE. Overflow past u32::MAX is
    /// a protocol violation by the peer.
    pub(crate) fn grow_send_window(&mut self, delta: u32) -> Result<(), ProtocolError> {
        self.send_window = self
            .send_window
            .checked_add(delta)
            .ok_or(ProtocolError::WindowOverflow(self.id))?;
        Ok(())
    }

    /// Credit we owe the peer: the configured window minus what is
    /// still buffered unread and what the peer may already spend.
    /// Replenishment is skipped while this stays under half the window
    /// to avoid a chatty stream of tiny updates.
    pub(crate) fn window_update_delta(&self, max_window: u32) -> u32 {
        let buffered = u32::try_from(self.buffer.len()).unwrap_or(u32::MAX);
        max_window
            .saturating_sub(buffered)
            .saturating_sub(self.recv_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn established(id: u32, window: u32) -> Stream {
        let mut stream = Stream::outbound(id, window);
        stream.on_syn_ack(window);
        stream
    }

    #[test]
    fn outbound_handshake_reaches_established() {
        let mut stream = Stream::outbound(1, 1024);
        assert_eq!(stream.state, State::SynSent);
        assert!(stream.state.can_write());

        stream.on_syn_ack(4096);
        assert_eq!(stream.state, State::Established);
        assert_eq!(stream.send_window, 4096);
    }

    #[test]
    fn inbound_handshake_reaches_established() {
        let mut stream = Stream::inbound(2, 512, 1024);
        assert_eq!(stream.state, State::SynRecv);
        assert_eq!(stream.send_window, 512);
        assert_eq!(stream.recv_window, 1024);

        stream.on_ack_sent();
        assert_eq!(stream.state, State::Established);
    }

    #[test]
    fn fin_exchange_local_first() {
        let mut stream = established(1, 1024);
        stream.on_send_fin();
        assert_eq!(stream.state, State::FinSent);
        assert!(!stream.state.can_write());

        stream.on_recv_fin();
        assert_eq!(stream.state, State::Closed);
    }

    #[test]
    fn fin_exchange_peer_first() {
        let mut stream = established(1, 1024);
        stream.on_recv_fin();
        assert_eq!(stream.state, State::FinRecv);
        // Peer half-closed; our direction is still open.
        assert!(stream.state.can_write());
        assert!(!stream.state.can_recv_data());

        stream.on_send_fin();
        assert_eq!(stream.state, State::Closed);
    }

    #[test]
    fn fin_transitions_are_idempotent() {
        let mut stream = established(1, 1024);
        stream.on_send_fin();
        stream.on_send_fin();
        assert_eq!(stream.state, State::FinSent);

        stream.on_recv_fin();
        stream.on_recv_fin();
        assert_eq!(stream.state, State::Closed);
    }

    #[test]
    fn reset_closes_from_any_state() {
        let makers: [fn(u32) -> Stream; 3] = [
            |id| Stream::outbound(id, 64),
            |id| Stream::inbound(id, 64, 64),
            |id| established(id, 64),
        ];
        for make in makers {
            let mut stream = make(5);
            stream.on_reset();
            assert_eq!(stream.state, State::Closed);
            assert!(stream.reset);
        }
    }

    #[test]
    fn syn_ack_accounts_for_bytes_sent_in_flight() {
        let mut stream = Stream::outbound(1, 1024);
        // 1024 bytes went out before the handshake completed.
        stream.send_window = 0;

        stream.on_syn_ack(1024);
        assert_eq!(stream.state, State::Established);
        assert_eq!(stream.send_window, 0);

        // An asymmetric peer window still nets out the spent bytes.
        let mut stream = Stream::outbound(3, 1024);
        stream.send_window = 824;
        stream.on_syn_ack(4096);
        assert_eq!(stream.send_window, 4096 - 200);
    }

    #[test]
    fn window_overflow_is_a_protocol_error() {
        let mut stream = established(3, 1024);
        stream.send_window = u32::MAX - 10;
        assert!(stream.grow_send_window(10).is_ok());
        assert_eq!(
            stream.grow_send_window(1),
            Err(ProtocolError::WindowOverflow(3))
        );
    }

    #[test]
    fn update_delta_accounts_for_buffered_bytes() {
        let mut stream = established(1, 1024);
        // Peer spent 600 bytes of credit; we buffered them all.
        stream.recv_window = 424;
        stream.buffer.write(&[0u8; 600]).unwrap();
        assert_eq!(stream.window_update_delta(1024), 0);

        // Embedder drains 500 of them.
        let mut dst = [0u8; 500];
        stream.buffer.read(&mut dst);
        assert_eq!(stream.window_update_delta(1024), 500);
    }
}
