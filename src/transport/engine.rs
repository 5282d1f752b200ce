//! The stop-and-wait engine.
//!
//! [`StopAndWait`] owns the peer table, the timer registry and the node-wide
//! admission gate. It is driven by three entry points, one per event class:
//!
//! - [`StopAndWait::send_message`]: the application has a message ready
//! - [`StopAndWait::on_frame_received`]: a segment arrived from the network
//! - [`StopAndWait::on_timer_expired`]: a retransmission timer fired
//!
//! Each call is a bounded, synchronous state transition. Side effects go
//! through the [`TransportContext`] passed in by the caller.
//!
//! # Admission
//!
//! Only one application message is in flight per node, not per peer. The
//! gate closes on every send and reopens on the matching ACK, so at most one
//! peer record holds an outstanding frame at any time.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::error::{TransportError, TransportResult};
use super::frame::{Frame, FrameError, FrameKind, MAX_PAYLOAD, Seq};
use super::peer::{Outstanding, PeerRecord, PeerTable};
use super::timer::TimerRegistry;
use crate::core::{
    DEFAULT_RETRANSMIT_TIMEOUT, MIN_RETRANSMIT_TIMEOUT, NetAddr, SendStatus, TimerId, TransportContext,
};

/// What happened to a received segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// New in-order DATA; payload delivered upward and ACKed.
    Delivered {
        /// Sending peer.
        source: NetAddr,
        /// Sequence number of the frame.
        seq: Seq,
    },
    /// Repeat of the previously accepted DATA; re-ACKed, not delivered.
    Duplicate {
        /// Sending peer.
        source: NetAddr,
        /// Sequence number of the frame.
        seq: Seq,
    },
    /// ACK matched the outstanding frame; timer cancelled, gate reopened.
    Acknowledged {
        /// Acknowledging peer.
        peer: NetAddr,
        /// Acknowledged sequence number.
        seq: Seq,
    },
    /// ACK that matches nothing outstanding; ignored.
    StaleAck {
        /// Acknowledging peer.
        peer: NetAddr,
        /// Sequence number carried by the ACK.
        seq: Seq,
    },
    /// Segment failed validation and was dropped.
    Discarded(FrameError),
    /// Segment was addressed to another node and was dropped.
    Misaddressed {
        /// Destination carried by the frame.
        destination: NetAddr,
    },
}

impl ReceiveOutcome {
    /// Why the segment was dropped, if it was.
    pub fn error(&self) -> Option<TransportError> {
        match self {
            ReceiveOutcome::Discarded(error) => Some(TransportError::Frame(error.clone())),
            ReceiveOutcome::Misaddressed { destination } => {
                Some(TransportError::Misaddressed(*destination))
            }
            _ => None,
        }
    }
}

/// Stop-and-wait reliable delivery engine.
#[derive(Debug)]
pub struct StopAndWait {
    peers: PeerTable,
    timers: TimerRegistry,
    admission_open: bool,
    retransmit_timeout: Duration,
}

impl Default for StopAndWait {
    fn default() -> Self {
        Self::new(DEFAULT_RETRANSMIT_TIMEOUT)
    }
}

impl StopAndWait {
    /// Create an engine with the given fixed retransmission timeout.
    ///
    /// Timeouts below [`MIN_RETRANSMIT_TIMEOUT`] are raised to it, so a
    /// resend is never due at the instant it is armed.
    pub fn new(retransmit_timeout: Duration) -> Self {
        if retransmit_timeout < MIN_RETRANSMIT_TIMEOUT {
            warn!(
                requested = ?retransmit_timeout,
                min = ?MIN_RETRANSMIT_TIMEOUT,
                "retransmission timeout raised to minimum"
            );
        }
        Self {
            peers: PeerTable::new(),
            timers: TimerRegistry::new(),
            admission_open: true,
            retransmit_timeout: retransmit_timeout.max(MIN_RETRANSMIT_TIMEOUT),
        }
    }

    /// Whether a new application message may be admitted.
    pub fn can_send(&self) -> bool {
        self.admission_open
    }

    /// Fixed retransmission timeout.
    pub fn retransmit_timeout(&self) -> Duration {
        self.retransmit_timeout
    }

    /// The peer table.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Record for `peer`, if it has been seen.
    pub fn peer(&self, peer: NetAddr) -> Option<&PeerRecord> {
        self.peers.get(peer)
    }

    /// The peer currently holding the outstanding frame, if any.
    pub fn outstanding_peer(&self) -> Option<NetAddr> {
        self.peers
            .iter()
            .find(|record| record.has_outstanding())
            .map(|record| record.peer)
    }

    /// Number of live retransmission timers.
    pub fn live_timers(&self) -> usize {
        self.timers.len()
    }

    /// Admit a new application message for `destination`.
    ///
    /// Builds a DATA frame with the peer's `next_frame_to_send`, arms the
    /// retransmission timer, transmits once and closes the admission gate.
    /// Fails without any state change if the gate is closed or the payload
    /// is too large.
    pub fn send_message<C>(
        &mut self,
        ctx: &mut C,
        destination: NetAddr,
        payload: Vec<u8>,
    ) -> TransportResult<()>
    where
        C: TransportContext + ?Sized,
    {
        if !self.admission_open {
            return Err(TransportError::AdmissionClosed);
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            }
            .into());
        }

        let local = ctx.local_addr();
        let record = self.peers.lookup_or_create(destination);
        let seq = record.next_frame_to_send;

        let timer = ctx.start_timer(self.retransmit_timeout);
        self.timers.register(timer, destination);

        let frame = Frame::data(seq, local, destination, payload.clone());
        record.outstanding = Some(Outstanding {
            payload,
            timer,
            transmissions: 1,
        });
        record.next_frame_to_send.toggle();
        self.admission_open = false;

        debug!(peer = %destination, seq = ?seq, timer = %timer, "DATA transmitted");
        transmit(ctx, destination, &frame);
        Ok(())
    }

    /// Process a raw transport segment from the packet delivery service.
    pub fn on_frame_received<C>(&mut self, ctx: &mut C, segment: &[u8]) -> ReceiveOutcome
    where
        C: TransportContext + ?Sized,
    {
        let outcome = self.receive(ctx, segment);
        if let Some(error) = outcome.error() {
            if error.is_corruption() {
                debug!(%error, "corrupted frame ignored");
            } else if error.is_silent_drop() {
                trace!(%error, "frame ignored");
            } else {
                warn!(%error, "frame rejected");
            }
        }
        outcome
    }

    fn receive<C>(&mut self, ctx: &mut C, segment: &[u8]) -> ReceiveOutcome
    where
        C: TransportContext + ?Sized,
    {
        let frame = match Frame::decode(segment) {
            Ok(frame) => frame,
            Err(error) => return ReceiveOutcome::Discarded(error),
        };

        if frame.header.destination != ctx.local_addr() {
            return ReceiveOutcome::Misaddressed {
                destination: frame.header.destination,
            };
        }

        let source = frame.header.source;
        match frame.kind() {
            FrameKind::Ack => self.on_ack(ctx, source, frame.seq()),
            FrameKind::Data => self.on_data(ctx, source, frame.seq(), &frame.payload),
        }
    }

    fn on_ack<C>(&mut self, ctx: &mut C, peer: NetAddr, seq: Seq) -> ReceiveOutcome
    where
        C: TransportContext + ?Sized,
    {
        let record = self.peers.lookup_or_create(peer);
        let matched = if seq == record.ack_expected {
            record.outstanding.take()
        } else {
            None
        };

        let Some(outstanding) = matched else {
            debug!(peer = %peer, seq = ?seq, "ACK received, ignored");
            return ReceiveOutcome::StaleAck { peer, seq };
        };

        ctx.stop_timer(outstanding.timer);
        self.timers.take(outstanding.timer);
        record.ack_expected.toggle();
        self.admission_open = true;

        debug!(
            peer = %peer,
            seq = ?seq,
            transmissions = outstanding.transmissions,
            "ACK received"
        );
        ReceiveOutcome::Acknowledged { peer, seq }
    }

    fn on_data<C>(&mut self, ctx: &mut C, source: NetAddr, seq: Seq, payload: &[u8]) -> ReceiveOutcome
    where
        C: TransportContext + ?Sized,
    {
        let local = ctx.local_addr();
        let record = self.peers.lookup_or_create(source);

        let outcome = if seq == record.frame_expected {
            record.frame_expected.toggle();
            debug!(peer = %source, seq = ?seq, len = payload.len(), "DATA received, up to application");
            ctx.deliver(source, payload);
            ReceiveOutcome::Delivered { source, seq }
        } else {
            debug!(peer = %source, seq = ?seq, "DATA received, duplicate ignored");
            ReceiveOutcome::Duplicate { source, seq }
        };

        // Duplicates are re-ACKed too, in case our previous ACK was lost.
        let ack = Frame::ack(seq, local, source);
        trace!(peer = %source, seq = ?seq, "ACK transmitted");
        transmit(ctx, source, &ack);
        outcome
    }

    /// Handle an expired retransmission timer.
    ///
    /// Resends the outstanding frame with `seq = ack_expected` and arms a
    /// fresh timer. Returns `false` if the timer no longer guards anything
    /// (it was cancelled by an ACK, or belongs to a previous boot).
    pub fn on_timer_expired<C>(&mut self, ctx: &mut C, timer: TimerId) -> bool
    where
        C: TransportContext + ?Sized,
    {
        let Some(peer) = self.timers.take(timer) else {
            trace!(timer = %timer, "stale timer ignored");
            return false;
        };
        let Some(record) = self.peers.get_mut(peer) else {
            warn!(timer = %timer, peer = %peer, "timer owner has no peer record");
            return false;
        };
        let seq = record.ack_expected;
        let Some(outstanding) = record.outstanding.as_mut() else {
            warn!(timer = %timer, peer = %peer, "timer fired with nothing outstanding");
            return false;
        };
        if outstanding.timer != timer {
            warn!(timer = %timer, peer = %peer, "timer does not match outstanding frame");
            return false;
        }

        let next = ctx.start_timer(self.retransmit_timeout);
        outstanding.timer = next;
        outstanding.transmissions += 1;
        self.timers.register(next, peer);

        let local = ctx.local_addr();
        let frame = Frame::data(seq, local, peer, outstanding.payload.clone());
        debug!(
            peer = %peer,
            seq = ?seq,
            timer = %timer,
            transmissions = outstanding.transmissions,
            "timeout, DATA retransmitted"
        );
        transmit(ctx, peer, &frame);
        true
    }

    /// Forget all peers and reopen the gate, as after a reboot.
    ///
    /// Returns the timers that were still armed so the caller can cancel
    /// them with its timer service.
    pub fn reset(&mut self) -> Vec<TimerId> {
        let live: Vec<TimerId> = self.peers.iter().filter_map(PeerRecord::timer).collect();
        self.peers.clear();
        self.timers.clear();
        self.admission_open = true;
        live
    }
}

fn transmit<C>(ctx: &mut C, destination: NetAddr, frame: &Frame)
where
    C: TransportContext + ?Sized,
{
    let segment = match frame.encode() {
        Ok(segment) => segment,
        Err(error) => {
            warn!(%error, peer = %destination, "failed to encode frame");
            return;
        }
    };
    if ctx.transmit(destination, segment) == SendStatus::Unresolved {
        debug!(peer = %destination, "destination unresolved, segment dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const A: NetAddr = NetAddr(1);
    const B: NetAddr = NetAddr(2);
    const C: NetAddr = NetAddr(3);

    struct MockContext {
        local: NetAddr,
        sent: Vec<(NetAddr, Vec<u8>)>,
        delivered: Vec<(NetAddr, Vec<u8>)>,
        armed: BTreeSet<TimerId>,
        next_timer: u64,
        status: Option<SendStatus>,
    }

    impl MockContext {
        fn at(local: NetAddr) -> Self {
            Self {
                local,
                sent: Vec::new(),
                delivered: Vec::new(),
                armed: BTreeSet::new(),
                next_timer: 0,
                status: None,
            }
        }

        fn take_frames(&mut self) -> Vec<Frame> {
            self.sent
                .drain(..)
                .map(|(_, bytes)| Frame::decode(&bytes).unwrap())
                .collect()
        }

        fn take_segments(&mut self) -> Vec<Vec<u8>> {
            self.sent.drain(..).map(|(_, bytes)| bytes).collect()
        }

        fn only_timer(&self) -> TimerId {
            assert_eq!(self.armed.len(), 1);
            *self.armed.iter().next().unwrap()
        }
    }

    impl TransportContext for MockContext {
        fn local_addr(&self) -> NetAddr {
            self.local
        }

        fn transmit(&mut self, destination: NetAddr, segment: Vec<u8>) -> SendStatus {
            self.sent.push((destination, segment));
            self.status.unwrap_or(SendStatus::Sent)
        }

        fn start_timer(&mut self, _after: Duration) -> TimerId {
            self.next_timer += 1;
            let id = TimerId(self.next_timer);
            self.armed.insert(id);
            id
        }

        fn stop_timer(&mut self, id: TimerId) {
            self.armed.remove(&id);
        }

        fn deliver(&mut self, source: NetAddr, payload: &[u8]) {
            self.delivered.push((source, payload.to_vec()));
        }
    }

    fn ack_bytes(seq: Seq, from: NetAddr, to: NetAddr) -> Vec<u8> {
        Frame::ack(seq, from, to).encode().unwrap()
    }

    fn data_bytes(seq: Seq, from: NetAddr, to: NetAddr, payload: &[u8]) -> Vec<u8> {
        Frame::data(seq, from, to, payload.to_vec()).encode().unwrap()
    }

    #[test]
    fn test_hello_world_exchange() {
        let mut a = StopAndWait::default();
        let mut b = StopAndWait::default();
        let mut ctx_a = MockContext::at(A);
        let mut ctx_b = MockContext::at(B);

        a.send_message(&mut ctx_a, B, b"hello".to_vec()).unwrap();
        assert!(!a.can_send());
        let segment = ctx_a.take_segments().remove(0);

        let outcome = b.on_frame_received(&mut ctx_b, &segment);
        assert_eq!(outcome, ReceiveOutcome::Delivered { source: A, seq: Seq::Zero });
        assert_eq!(ctx_b.delivered, vec![(A, b"hello".to_vec())]);

        let ack = ctx_b.take_segments().remove(0);
        assert_eq!(Frame::decode(&ack).unwrap().kind(), FrameKind::Ack);

        let outcome = a.on_frame_received(&mut ctx_a, &ack);
        assert_eq!(outcome, ReceiveOutcome::Acknowledged { peer: B, seq: Seq::Zero });
        assert!(a.can_send());
        assert!(ctx_a.armed.is_empty());
        assert_eq!(a.live_timers(), 0);

        a.send_message(&mut ctx_a, B, b"world".to_vec()).unwrap();
        let frame = ctx_a.take_frames().remove(0);
        assert_eq!(frame.seq(), Seq::One);
        assert_eq!(frame.payload, b"world");
    }

    #[test]
    fn test_send_arms_timer_and_records_pending() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"hello".to_vec()).unwrap();

        let record = engine.peer(B).unwrap();
        assert_eq!(record.next_frame_to_send, Seq::One);
        assert_eq!(record.ack_expected, Seq::Zero);
        let outstanding = record.outstanding.as_ref().unwrap();
        assert_eq!(outstanding.payload, b"hello");
        assert_eq!(outstanding.transmissions, 1);
        assert_eq!(Some(ctx.only_timer()), record.timer());
        assert_eq!(engine.outstanding_peer(), Some(B));
    }

    #[test]
    fn test_admission_gate_is_node_wide() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"one".to_vec()).unwrap();
        assert_eq!(
            engine.send_message(&mut ctx, C, b"two".to_vec()),
            Err(TransportError::AdmissionClosed)
        );
        assert!(engine.peer(C).is_none());
        assert_eq!(ctx.sent.len(), 1);

        engine.on_frame_received(&mut ctx, &ack_bytes(Seq::Zero, B, A));
        assert!(engine.can_send());

        engine.send_message(&mut ctx, C, b"two".to_vec()).unwrap();
        assert!(!engine.can_send());
        assert_eq!(engine.outstanding_peer(), Some(C));
    }

    #[test]
    fn test_oversized_payload_rejected_without_state_change() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        let result = engine.send_message(&mut ctx, B, vec![0u8; MAX_PAYLOAD + 1]);
        assert!(matches!(
            result,
            Err(TransportError::Frame(FrameError::PayloadTooLarge { .. }))
        ));
        assert!(engine.can_send());
        assert!(ctx.sent.is_empty());
        assert!(ctx.armed.is_empty());
    }

    #[test]
    fn test_timeout_resends_same_frame() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"hello".to_vec()).unwrap();
        let first = ctx.take_segments().remove(0);
        let timer = ctx.only_timer();

        // The network lost it; the timer fires.
        ctx.armed.remove(&timer);
        assert!(engine.on_timer_expired(&mut ctx, timer));

        let resent = ctx.take_segments().remove(0);
        assert_eq!(resent, first);
        let next = ctx.only_timer();
        assert_ne!(next, timer);
        assert_eq!(engine.peer(B).unwrap().timer(), Some(next));
        assert_eq!(
            engine.peer(B).unwrap().outstanding.as_ref().unwrap().transmissions,
            2
        );
        assert!(!engine.can_send());
    }

    #[test]
    fn test_resend_uses_ack_expected_not_next_frame() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"first".to_vec()).unwrap();
        engine.on_frame_received(&mut ctx, &ack_bytes(Seq::Zero, B, A));
        engine.send_message(&mut ctx, B, b"second".to_vec()).unwrap();
        ctx.sent.clear();

        let timer = ctx.only_timer();
        engine.on_timer_expired(&mut ctx, timer);
        let frame = ctx.take_frames().remove(0);
        assert_eq!(frame.seq(), Seq::One);
        assert_eq!(frame.payload, b"second");
        assert_eq!(engine.peer(B).unwrap().next_frame_to_send, Seq::Zero);
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"hello".to_vec()).unwrap();
        let timer = ctx.only_timer();
        engine.on_frame_received(&mut ctx, &ack_bytes(Seq::Zero, B, A));
        ctx.sent.clear();

        assert!(!engine.on_timer_expired(&mut ctx, timer));
        assert!(!engine.on_timer_expired(&mut ctx, TimerId(999)));
        assert!(ctx.sent.is_empty());
    }

    #[test]
    fn test_duplicate_data_delivered_once_acked_twice() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(B);
        let segment = data_bytes(Seq::Zero, A, B, b"hello");

        let first = engine.on_frame_received(&mut ctx, &segment);
        let second = engine.on_frame_received(&mut ctx, &segment);

        assert_eq!(first, ReceiveOutcome::Delivered { source: A, seq: Seq::Zero });
        assert_eq!(second, ReceiveOutcome::Duplicate { source: A, seq: Seq::Zero });
        assert_eq!(ctx.delivered.len(), 1);

        let acks = ctx.take_frames();
        assert_eq!(acks.len(), 2);
        for ack in acks {
            assert_eq!(ack.kind(), FrameKind::Ack);
            assert_eq!(ack.seq(), Seq::Zero);
            assert_eq!(ack.header.destination, A);
            assert_eq!(ack.header.source, B);
        }
        assert_eq!(engine.peer(A).unwrap().frame_expected, Seq::One);
    }

    #[test]
    fn test_stale_ack_ignored() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"hello".to_vec()).unwrap();
        let outcome = engine.on_frame_received(&mut ctx, &ack_bytes(Seq::One, B, A));

        assert_eq!(outcome, ReceiveOutcome::StaleAck { peer: B, seq: Seq::One });
        assert!(!engine.can_send());
        assert_eq!(engine.peer(B).unwrap().ack_expected, Seq::Zero);
        assert_eq!(ctx.armed.len(), 1);
    }

    #[test]
    fn test_ack_with_nothing_outstanding_ignored() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        let outcome = engine.on_frame_received(&mut ctx, &ack_bytes(Seq::Zero, B, A));

        assert_eq!(outcome, ReceiveOutcome::StaleAck { peer: B, seq: Seq::Zero });
        assert_eq!(engine.peer(B).unwrap().ack_expected, Seq::Zero);
        assert!(engine.can_send());
    }

    #[test]
    fn test_ack_from_other_peer_does_not_release() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"hello".to_vec()).unwrap();
        let outcome = engine.on_frame_received(&mut ctx, &ack_bytes(Seq::Zero, C, A));

        assert_eq!(outcome, ReceiveOutcome::StaleAck { peer: C, seq: Seq::Zero });
        assert!(!engine.can_send());
    }

    #[test]
    fn test_corrupted_frame_causes_no_state_change() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(B);
        let mut segment = data_bytes(Seq::Zero, A, B, b"hello");
        let last = segment.len() - 1;
        segment[last] ^= 0x01;

        let outcome = engine.on_frame_received(&mut ctx, &segment);

        assert!(matches!(
            outcome,
            ReceiveOutcome::Discarded(FrameError::ChecksumMismatch { .. })
        ));
        assert!(ctx.delivered.is_empty());
        assert!(ctx.sent.is_empty());
        assert!(engine.peers().is_empty());
    }

    #[test]
    fn test_misaddressed_frame_dropped() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(B);

        let outcome = engine.on_frame_received(&mut ctx, &data_bytes(Seq::Zero, A, C, b"x"));

        assert_eq!(outcome, ReceiveOutcome::Misaddressed { destination: C });
        assert!(ctx.delivered.is_empty());
        assert!(ctx.sent.is_empty());

        let error = outcome.error().unwrap();
        assert_eq!(error, TransportError::Misaddressed(C));
        assert!(error.is_silent_drop());
        assert!(!error.is_corruption());
    }

    #[test]
    fn test_drop_reasons_classified() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(B);
        let mut segment = data_bytes(Seq::Zero, A, B, b"hello");
        segment[0] ^= 0x80;

        let error = engine.on_frame_received(&mut ctx, &segment).error().unwrap();
        assert!(error.is_corruption());
        assert!(error.is_silent_drop());

        let delivered = engine.on_frame_received(&mut ctx, &data_bytes(Seq::Zero, A, B, b"hello"));
        assert_eq!(delivered.error(), None);
    }

    #[test]
    fn test_zero_timeout_raised_to_minimum() {
        let engine = StopAndWait::new(Duration::ZERO);
        assert_eq!(engine.retransmit_timeout(), MIN_RETRANSMIT_TIMEOUT);

        let engine = StopAndWait::new(Duration::from_millis(250));
        assert_eq!(engine.retransmit_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_sender_and_receiver_bits_are_independent() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"out".to_vec()).unwrap();
        engine.on_frame_received(&mut ctx, &ack_bytes(Seq::Zero, B, A));
        engine.send_message(&mut ctx, B, b"out again".to_vec()).unwrap();

        // B's own first message arrives with seq 0 while we wait on our seq 1.
        let outcome = engine.on_frame_received(&mut ctx, &data_bytes(Seq::Zero, B, A, b"in"));
        assert_eq!(outcome, ReceiveOutcome::Delivered { source: B, seq: Seq::Zero });

        let record = engine.peer(B).unwrap();
        assert_eq!(record.ack_expected, Seq::One);
        assert_eq!(record.next_frame_to_send, Seq::Zero);
        assert_eq!(record.frame_expected, Seq::One);
        assert!(!engine.can_send());
    }

    #[test]
    fn test_unresolved_send_still_arms_timer() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);
        ctx.status = Some(SendStatus::Unresolved);

        engine.send_message(&mut ctx, B, b"hello".to_vec()).unwrap();

        assert_eq!(ctx.armed.len(), 1);
        assert!(engine.peer(B).unwrap().has_outstanding());
    }

    #[test]
    fn test_reset_reopens_gate() {
        let mut engine = StopAndWait::default();
        let mut ctx = MockContext::at(A);

        engine.send_message(&mut ctx, B, b"hello".to_vec()).unwrap();
        let timer = ctx.only_timer();

        let live = engine.reset();
        assert_eq!(live, vec![timer]);
        assert!(engine.can_send());
        assert!(engine.peers().is_empty());
        assert_eq!(engine.live_timers(), 0);
    }
}
