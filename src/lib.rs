//! # stopwait-protocol
//!
//! Reliable, in-order, duplicate-free delivery of discrete messages over a
//! lossy, corrupting, shared network segment, using the alternating-bit
//! (stop-and-wait) protocol:
//!
//! - **One frame in flight**: a node-wide admission gate admits a new
//!   message only after the previous one is acknowledged
//! - **One-bit sequencing**: independent sender and receiver bits per peer
//! - **Integrity**: CRC-32 over the whole frame; corrupted frames are
//!   dropped silently and recovered by retransmission
//! - **Fixed timeout**: every unacknowledged frame is resent after the
//!   same interval, forever
//!
//! ## Feature Flags
//!
//! - `sim` (default): deterministic lossy segment simulator
//! - `runtime` (default): tokio task driving a node over UDP
//!
//! ## Modules
//!
//! - [`core`]: addresses, constants, collaborator traits, errors
//! - [`transport`]: frame codec and the [`StopAndWait`] engine
//! - [`network`]: link framing, packet delivery, address resolution
//! - [`timer`]: deadline queue implementing [`TimerService`]
//! - [`node`]: the full stack behind one set of event entry points
//! - [`config`]: node configuration
//! - [`sim`]: simulator (requires `sim` feature)
//! - [`runtime`]: tokio runtime (requires `runtime` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use stopwait_protocol::prelude::*;
//!
//! let mut net = SimNetwork::new(FaultModel::lossy(0.2, 0.1), 1);
//! net.add_node(NetAddr(1));
//! net.add_node(NetAddr(2));
//!
//! net.send(NetAddr(1), NetAddr(2), b"hello".to_vec()).unwrap();
//! net.send(NetAddr(1), NetAddr(2), b"world".to_vec()).unwrap();
//! assert!(net.run_until_idle(Duration::from_secs(120)));
//!
//! let inbox = net.node(NetAddr(2)).unwrap().inbox();
//! assert_eq!(inbox.payloads(), vec![b"hello".to_vec(), b"world".to_vec()]);
//! ```
//!
//! [`StopAndWait`]: transport::StopAndWait
//! [`TimerService`]: crate::core::TimerService

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod config;
pub mod network;
pub mod node;
pub mod timer;
pub mod transport;

// Simulator (feature-gated)
#[cfg(feature = "sim")]
#[cfg_attr(docsrs, doc(cfg(feature = "sim")))]
pub mod sim;

// Tokio runtime (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use crate::config::{NodeConfig, NodeConfigBuilder};
    pub use crate::node::{Node, NodeEvent, PhysicalOutcome};
    pub use crate::timer::TimerQueue;
    pub use crate::transport::{
        Frame, FrameError, FrameKind, ReceiveOutcome, Seq, StopAndWait, TransportError,
        TransportResult,
    };

    #[cfg(feature = "sim")]
    pub use crate::sim::{FaultModel, Inbox, SimNetwork};

    #[cfg(feature = "runtime")]
    pub use crate::runtime::{Delivery, NodeHandle, UdpSegment, spawn_node};
}

// Re-export commonly used items at crate root
pub use crate::core::{MacAddr, NetAddr, StopWaitError, StopWaitResult};
pub use crate::node::{Node, NodeEvent};
pub use crate::transport::{ReceiveOutcome, StopAndWait};
