//! Deterministic simulation of a shared, lossy segment.
//!
//! [`SimNetwork`] attaches any number of nodes to one broadcast medium and
//! drives them in virtual time. Every transmitted frame is seen by every
//! other station after a fixed latency, unless the [`FaultModel`] loses or
//! corrupts it. All randomness comes from a seeded [`StdRng`], so a run is
//! fully reproducible from its seed.
//!
//! ```
//! use stopwait_protocol::core::NetAddr;
//! use stopwait_protocol::sim::{FaultModel, SimNetwork};
//!
//! let mut net = SimNetwork::new(FaultModel::default(), 7);
//! net.add_node(NetAddr(1));
//! net.add_node(NetAddr(2));
//!
//! net.send(NetAddr(1), NetAddr(2), b"hello".to_vec()).unwrap();
//! assert!(net.run_until_idle(std::time::Duration::from_secs(10)));
//! assert_eq!(net.node(NetAddr(2)).unwrap().inbox().payloads(), vec![b"hello".to_vec()]);
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::core::{
    Application, DEFAULT_RETRANSMIT_TIMEOUT, ETHERTYPE_IP, MacAddr, NetAddr, StopWaitError,
    StopWaitResult,
};
use crate::network::{ethernet, ip};
use crate::node::Node;
use crate::timer::TimerQueue;

/// Channel impairments applied to every transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultModel {
    /// Probability that a frame is lost.
    pub loss_rate: f64,
    /// Probability that a surviving frame has one bit flipped.
    pub corrupt_rate: f64,
    /// One-way propagation delay.
    pub latency: Duration,
}

impl Default for FaultModel {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            latency: Duration::from_millis(10),
        }
    }
}

impl FaultModel {
    /// A channel that loses and corrupts frames at the given rates.
    pub fn lossy(loss_rate: f64, corrupt_rate: f64) -> Self {
        Self {
            loss_rate,
            corrupt_rate,
            ..Self::default()
        }
    }
}

/// Recording application: keeps every delivered message in order.
#[derive(Debug, Default, Clone)]
pub struct Inbox {
    messages: Vec<(NetAddr, Vec<u8>)>,
}

impl Inbox {
    /// Every delivery so far, oldest first.
    pub fn messages(&self) -> &[(NetAddr, Vec<u8>)] {
        &self.messages
    }

    /// Just the payloads.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.messages.iter().map(|(_, p)| p.clone()).collect()
    }

    /// Payloads received from `source`.
    pub fn from_source(&self, source: NetAddr) -> Vec<Vec<u8>> {
        self.messages
            .iter()
            .filter(|(s, _)| *s == source)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Number of deliveries.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if nothing was delivered.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Application for Inbox {
    fn deliver(&mut self, source: NetAddr, payload: &[u8]) {
        self.messages.push((source, payload.to_vec()));
    }
}

/// The node type the simulator drives.
pub type SimStack = Node<Vec<Vec<u8>>, TimerQueue, Inbox>;

/// One station on the simulated segment.
#[derive(Debug)]
pub struct SimNode {
    node: SimStack,
    queue: VecDeque<(NetAddr, Vec<u8>)>,
}

impl SimNode {
    /// Network address.
    pub fn address(&self) -> NetAddr {
        self.node.address()
    }

    /// The wrapped node.
    pub fn node(&self) -> &SimStack {
        &self.node
    }

    /// Messages delivered to this node's application.
    pub fn inbox(&self) -> &Inbox {
        self.node.application()
    }

    /// Messages waiting for the admission gate to open.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn admit(&mut self) {
        while self.node.can_send() {
            let Some((destination, payload)) = self.queue.pop_front() else {
                break;
            };
            if let Err(error) = self.node.on_application_ready(destination, payload) {
                warn!(%error, node = %self.address(), "message rejected");
            }
        }
    }
}

/// Counters over a simulation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimStats {
    /// Frames written to the medium.
    pub transmitted: u64,
    /// Frames lost by the fault model.
    pub lost: u64,
    /// Frames corrupted by the fault model.
    pub corrupted: u64,
    /// Frames dropped on request via [`SimNetwork::drop_next`].
    pub dropped: u64,
}

/// A simulated broadcast segment.
#[derive(Debug)]
pub struct SimNetwork {
    now: Duration,
    nodes: Vec<SimNode>,
    in_flight: BTreeMap<(Duration, u64), (usize, Vec<u8>)>,
    next_frame: u64,
    faults: FaultModel,
    retransmit_timeout: Duration,
    rng: StdRng,
    drop_next: usize,
    stats: SimStats,
}

impl SimNetwork {
    /// Create an empty segment.
    pub fn new(faults: FaultModel, seed: u64) -> Self {
        Self {
            now: Duration::ZERO,
            nodes: Vec::new(),
            in_flight: BTreeMap::new(),
            next_frame: 0,
            faults,
            retransmit_timeout: DEFAULT_RETRANSMIT_TIMEOUT,
            rng: StdRng::seed_from_u64(seed),
            drop_next: 0,
            stats: SimStats::default(),
        }
    }

    /// Retransmission timeout for nodes added after this call.
    pub fn with_retransmit_timeout(mut self, timeout: Duration) -> Self {
        self.retransmit_timeout = timeout;
        self
    }

    /// Attach a node. Its delivery address is derived from `address`.
    pub fn add_node(&mut self, address: NetAddr) {
        let [a, b, c, d] = address.0.to_be_bytes();
        let mac = MacAddr::new([0x02, 0x00, a, b, c, d]);
        let mut timers = TimerQueue::new();
        timers.advance_to(self.now);
        let node = Node::new(
            address,
            mac,
            self.retransmit_timeout,
            Vec::new(),
            timers,
            Inbox::default(),
        );
        self.nodes.push(SimNode {
            node,
            queue: VecDeque::new(),
        });
    }

    /// Install every node's mapping in every other node's ARP cache.
    pub fn prime_arp(&mut self) {
        let mappings: Vec<(NetAddr, MacAddr)> = self
            .nodes
            .iter()
            .map(|n| (n.node.address(), n.node.mac()))
            .collect();
        for sim in &mut self.nodes {
            for &(address, mac) in &mappings {
                if address != sim.node.address() {
                    sim.node.arp_mut().learn(address, mac);
                }
            }
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run counters.
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Replace the fault model.
    pub fn set_faults(&mut self, faults: FaultModel) {
        self.faults = faults;
    }

    /// Drop the next `count` frames written to the medium.
    pub fn drop_next(&mut self, count: usize) {
        self.drop_next = count;
    }

    /// The node with network address `address`.
    pub fn node(&self, address: NetAddr) -> Option<&SimNode> {
        self.nodes.iter().find(|n| n.address() == address)
    }

    /// Queue a message at `from` for `to`. It is handed to the transport
    /// as soon as `from`'s admission gate is open.
    pub fn send(&mut self, from: NetAddr, to: NetAddr, payload: Vec<u8>) -> StopWaitResult<()> {
        let index = self.index_of(from)?;
        self.nodes[index].queue.push_back((to, payload));
        self.settle(index);
        Ok(())
    }

    /// Restart the node at `address`. Queued messages are kept.
    pub fn reboot(&mut self, address: NetAddr) -> StopWaitResult<()> {
        let index = self.index_of(address)?;
        self.nodes[index].node.reboot();
        self.settle(index);
        Ok(())
    }

    /// True when nothing is in flight, queued, or awaiting acknowledgment.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
            && self
                .nodes
                .iter()
                .all(|n| n.queue.is_empty() && n.node.can_send())
    }

    /// Time of the next scheduled event.
    pub fn next_event(&self) -> Option<Duration> {
        let frame = self.in_flight.keys().next().map(|(at, _)| *at);
        let timer = self
            .nodes
            .iter()
            .filter_map(|n| n.node.timers().next_deadline())
            .min();
        match (frame, timer) {
            (Some(f), Some(t)) => Some(f.min(t)),
            (f, t) => f.or(t),
        }
    }

    /// Process every event scheduled at the earliest pending time.
    ///
    /// Returns `false` if nothing was scheduled.
    pub fn step(&mut self) -> bool {
        let Some(at) = self.next_event() else {
            return false;
        };
        self.advance_clock(at);

        // Frames first: an ACK arriving exactly at the deadline wins.
        while let Some(entry) = self.in_flight.first_entry() {
            if entry.key().0 > at {
                break;
            }
            let (sender, frame) = entry.remove();
            for index in 0..self.nodes.len() {
                if index != sender {
                    self.nodes[index].node.on_physical_ready(&frame);
                    self.settle(index);
                }
            }
        }

        for index in 0..self.nodes.len() {
            let expired = self.nodes[index].node.timers_mut().pop_expired();
            for id in expired {
                self.nodes[index].node.on_timer_expired(id);
            }
            self.settle(index);
        }
        true
    }

    /// Process events up to and including `deadline`, then move the clock
    /// to `deadline`.
    pub fn run_until(&mut self, deadline: Duration) {
        while self.next_event().is_some_and(|at| at <= deadline) {
            self.step();
        }
        self.advance_clock(deadline);
    }

    /// Process events until the segment is idle or `limit` is reached.
    ///
    /// Returns whether the segment went idle.
    pub fn run_until_idle(&mut self, limit: Duration) -> bool {
        loop {
            if self.is_idle() {
                return true;
            }
            match self.next_event() {
                Some(at) if at <= limit => {
                    self.step();
                }
                _ => {
                    self.advance_clock(limit);
                    return self.is_idle();
                }
            }
        }
    }

    fn index_of(&self, address: NetAddr) -> StopWaitResult<usize> {
        self.nodes
            .iter()
            .position(|n| n.address() == address)
            .ok_or(StopWaitError::UnknownNode(address))
    }

    fn advance_clock(&mut self, now: Duration) {
        self.now = self.now.max(now);
        for sim in &mut self.nodes {
            sim.node.timers_mut().advance_to(self.now);
        }
    }

    /// Admit queued messages and put the node's output on the medium.
    fn settle(&mut self, index: usize) {
        self.nodes[index].admit();
        let frames: Vec<Vec<u8>> = self.nodes[index].node.link_mut().drain(..).collect();
        for frame in frames {
            self.schedule(index, frame);
        }
    }

    fn schedule(&mut self, sender: usize, mut frame: Vec<u8>) {
        self.stats.transmitted += 1;

        if self.drop_next > 0 {
            self.drop_next -= 1;
            self.stats.dropped += 1;
            debug!(sender, len = frame.len(), "frame dropped");
            return;
        }
        if self.rng.gen_bool(self.faults.loss_rate.clamp(0.0, 1.0)) {
            self.stats.lost += 1;
            debug!(sender, len = frame.len(), "frame lost");
            return;
        }
        if self.rng.gen_bool(self.faults.corrupt_rate.clamp(0.0, 1.0)) && self.corrupt(&mut frame) {
            self.stats.corrupted += 1;
            debug!(sender, len = frame.len(), "frame corrupted");
        }

        let at = self.now + self.faults.latency;
        self.next_frame += 1;
        self.in_flight.insert((at, self.next_frame), (sender, frame));
    }

    /// Flip one bit inside the transport segment of a packet frame.
    fn corrupt(&mut self, frame: &mut [u8]) -> bool {
        let Some(range) = transport_segment(frame) else {
            return false;
        };
        let bit = self.rng.gen_range(range.start * 8..range.end * 8);
        frame[bit / 8] ^= 1 << (bit % 8);
        true
    }
}

/// Byte range of the transport segment within an encoded link frame.
fn transport_segment(frame: &[u8]) -> Option<std::ops::Range<usize>> {
    let packet_start = ethernet::HEADER_LEN;
    let segment_start = packet_start + ip::HEADER_LEN;
    if frame.len() < segment_start {
        return None;
    }
    if u16::from_be_bytes([frame[12], frame[13]]) != ETHERTYPE_IP {
        return None;
    }
    let total = u16::from_le_bytes([frame[packet_start + 2], frame[packet_start + 3]]) as usize;
    let end = (packet_start + total).min(frame.len());
    (end > segment_start).then_some(segment_start..end)
}
