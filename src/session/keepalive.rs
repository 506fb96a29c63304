// ABOUTME: Keepalive scheduling for long-lived sessions via periodic PING frames
// ABOUTME: Polling model driven from progress(); no background task, no internal timer

use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Statistics about PING traffic on a session.
///
/// The success rate is `acked / sent`; a growing gap indicates a peer
/// that has stopped servicing its end of the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingStats {
    /// Total PING frames sent (automatic and manual).
    pub sent: u64,
    /// Total PING ACKs matched to an outstanding token.
    pub acked: u64,
    /// Outstanding pings that were never acknowledged before the next
    /// ping became due.
    pub expired: u64,
}

/// Tracks when a keepalive PING is due and matches ACK tokens back to
/// the ping that produced them.
///
/// The session integrates it the same way on every `progress` call:
/// ask `should_ping`, emit the frame, record it with `on_ping_sent`,
/// and feed inbound ACK tokens to `on_pong`. Manual pings use the same
/// bookkeeping, so statistics and RTT cover both.
#[derive(Debug)]
pub(crate) struct Keepalive {
    enabled: bool,
    interval: Duration,
    last_ping: Option<Instant>,
    /// Outstanding ping, at most one at a time: (token, send instant).
    pending: Option<(u32, Instant)>,
    next_token: u32,
    last_rtt: Option<Duration>,
    stats: PingStats,
}

impl Keepalive {
    pub(crate) fn new(enabled: bool, interval: Duration) -> Keepalive {
        Keepalive {
            enabled,
            interval,
            last_ping: None,
            pending: None,
            next_token: 1,
            last_rtt: None,
            stats: PingStats::default(),
        }
    }

    /// Whether an automatic PING should be emitted now.
    ///
    /// An outstanding ping suppresses new ones until it is acknowledged
    /// or outlives a full interval, in which case it is written off as
    /// expired and the next ping goes out.
    pub(crate) fn should_ping(&mut self) -> bool {
        if !self.enabled {
            return false;
        }

        if let Some((token, sent_at)) = self.pending {
            if sent_at.elapsed() < self.interval {
                return false;
            }
            warn!(token, "keepalive ping expired without an ack");
            self.pending = None;
            self.stats.expired += 1;
        }

        match self.last_ping {
            None => true,
            Some(last) => last.elapsed() >= self.interval,
        }
    }

    /// Allocate the token for the next PING. Tokens are an opaque
    /// wrapping counter; zero is skipped so a blank header never
    /// matches a real ping.
    pub(crate) fn next_token(&mut self) -> u32 {
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1);
        if self.next_token == 0 {
            self.next_token = 1;
        }
        token
    }

    /// Record that a PING with `token` went out on the wire.
    pub(crate) fn on_ping_sent(&mut self, token: u32) {
        let now = Instant::now();
        self.last_ping = Some(now);
        self.pending = Some((token, now));
        self.stats.sent += 1;
        debug!(token, total = self.stats.sent, "ping sent");
    }

    /// Match an inbound PING ACK to the outstanding ping. Returns the
    /// round-trip time when the token matches.
    pub(crate) fn on_pong(&mut self, token: u32) -> Option<Duration> {
        match self.pending {
            Some((expected, sent_at)) if expected == token => {
                let rtt = sent_at.elapsed();
                self.pending = None;
                self.last_rtt = Some(rtt);
                self.stats.acked += 1;
                debug!(token, ?rtt, "ping acknowledged");
                Some(rtt)
            }
            _ => {
                debug!(token, "unmatched ping ack ignored");
                None
            }
        }
    }

    /// Round-trip time of the most recently acknowledged ping.
    pub(crate) fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }

    pub(crate) fn stats(&self) -> PingStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pings_immediately_then_waits_for_the_interval() {
        let mut ka = Keepalive::new(true, Duration::from_millis(40));
        assert!(ka.should_ping());

        let token = ka.next_token();
        ka.on_ping_sent(token);
        ka.on_pong(token);
        assert!(!ka.should_ping());

        std::thread::sleep(Duration::from_millis(50));
        assert!(ka.should_ping());
    }

    #[test]
    fn disabled_never_pings() {
        let mut ka = Keepalive::new(false, Duration::from_millis(0));
        assert!(!ka.should_ping());
    }

    #[test]
    fn outstanding_ping_suppresses_the_next_one() {
        let mut ka = Keepalive::new(true, Duration::from_secs(60));
        let token = ka.next_token();
        ka.on_ping_sent(token);
        assert!(!ka.should_ping());
    }

    #[test]
    fn matching_ack_yields_an_rtt() {
        let mut ka = Keepalive::new(true, Duration::from_secs(60));
        let token = ka.next_token();
        ka.on_ping_sent(token);

        assert!(ka.last_rtt().is_none());
        assert!(ka.on_pong(token).is_some());
        assert!(ka.last_rtt().is_some());
        assert_eq!(ka.stats().acked, 1);
    }

    #[test]
    fn mismatched_ack_is_ignored() {
        let mut ka = Keepalive::new(true, Duration::from_secs(60));
        let token = ka.next_token();
        ka.on_ping_sent(token);

        assert!(ka.on_pong(token.wrapping_add(7)).is_none());
        assert_eq!(ka.stats().acked, 0);
        // The real ack still matches afterwards.
        assert!(ka.on_pong(token).is_some());
    }

    #[test]
    fn expired_ping_is_written_off() {
        let mut ka = Keepalive::new(true, Duration::from_millis(10));
        let token = ka.next_token();
        ka.on_ping_sent(token);

        std::thread::sleep(Duration::from_millis(20));
        assert!(ka.should_ping());
        assert_eq!(ka.stats().expired, 1);
        // The stale token no longer matches.
        assert!(ka.on_pong(token).is_none());
    }

    #[test]
    fn tokens_skip_zero_on_wrap() {
        let mut ka = Keepalive::new(true, Duration::from_secs(1));
        ka.next_token = u32::MAX;
        assert_eq!(ka.next_token(), u32::MAX);
        assert_eq!(ka.next_token(), 1);
    }
}
