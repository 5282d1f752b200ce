//! Network collaborators beneath the transport.
//!
//! - **Link framing**: [`EthernetFrame`] with minimum-size padding and
//!   station filtering
//! - **Packet delivery**: [`IpLayer`] encapsulating segments in [`IpPacket`]s
//! - **Address resolution**: [`ArpCache`] learning from every [`ArpPacket`]
//!
//! These are intentionally minimal: one segment, no routing, no
//! fragmentation.

pub mod arp;
mod error;
pub mod ethernet;
pub mod ip;

pub use arp::{ArpCache, ArpOp, ArpPacket};
pub use error::*;
pub use ethernet::{EtherType, EthernetFrame};
pub use ip::{IpLayer, IpPacket, Protocol};
