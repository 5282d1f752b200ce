//! Collaborator traits.
//!
//! The transport engine and the node are sans-IO: every side effect (writing
//! to the physical channel, arming a timer, handing data to the application)
//! goes through one of these traits. The simulator, the tokio runtime and the
//! tests each provide their own implementations.

use std::fmt;
use std::time::Duration;

use super::address::NetAddr;

/// Identifier of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of handing a segment to the packet delivery service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The packet was framed and written to the link.
    Sent,
    /// The destination has no known delivery address yet. A resolution
    /// request was broadcast and the packet was dropped.
    Unresolved,
}

/// Upward interface: receives accepted, in-order application messages.
pub trait Application {
    /// Called exactly once per newly accepted DATA frame.
    fn deliver(&mut self, source: NetAddr, payload: &[u8]);
}

/// One-shot timer scheduling.
pub trait TimerService {
    /// Arm a timer that expires after `after`.
    fn start(&mut self, after: Duration) -> TimerId;

    /// Cancel an armed timer. Unknown ids are ignored.
    fn stop(&mut self, id: TimerId);
}

/// Physical channel: writes a complete link frame onto the segment.
pub trait Link {
    /// Transmit a link frame. Delivery is not guaranteed.
    fn transmit(&mut self, frame: Vec<u8>);
}

/// Everything the transport engine needs from the rest of the node.
pub trait TransportContext {
    /// Network address of this node.
    fn local_addr(&self) -> NetAddr;

    /// Hand a transport segment to the packet delivery service.
    fn transmit(&mut self, destination: NetAddr, segment: Vec<u8>) -> SendStatus;

    /// Arm a retransmission timer.
    fn start_timer(&mut self, after: Duration) -> TimerId;

    /// Cancel a retransmission timer.
    fn stop_timer(&mut self, id: TimerId);

    /// Deliver an accepted payload upward.
    fn deliver(&mut self, source: NetAddr, payload: &[u8]);
}

impl Link for Vec<Vec<u8>> {
    fn transmit(&mut self, frame: Vec<u8>) {
        self.push(frame);
    }
}
