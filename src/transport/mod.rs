//! Stop-and-wait transport layer.
//!
//! Reliable, in-order, duplicate-free delivery of discrete messages between
//! any pair of nodes on a shared segment. One frame is in flight per node;
//! every DATA frame is acknowledged and retransmitted on a fixed timeout
//! until the matching ACK arrives.
//!
//! - **Frame codec**: [`Frame`], [`FrameHeader`], CRC-32 integrity check
//! - **Peer state**: [`PeerTable`] of one-bit sequence counters per peer
//! - **Timer ownership**: [`TimerRegistry`] mapping timers back to peers
//! - **Engine**: [`StopAndWait`], driven through [`TransportContext`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Application                  │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   seq bits, ACKs, retransmission        │
//! ├─────────────────────────────────────────┤
//! │     Packet delivery (IP + ARP)          │
//! ├─────────────────────────────────────────┤
//! │         Link framing                    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! [`TransportContext`]: crate::core::TransportContext

mod engine;
mod error;
mod frame;
mod peer;
mod timer;

pub use engine::{ReceiveOutcome, StopAndWait};
pub use error::*;
pub use frame::*;
pub use peer::{Outstanding, PeerRecord, PeerTable};
pub use timer::TimerRegistry;
