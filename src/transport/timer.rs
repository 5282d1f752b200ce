//! Retransmission timer ownership.
//!
//! Maps every armed retransmission timer back to the peer whose frame it
//! guards. The map holds exactly the live timers: entries are added when a
//! timer is armed and removed when it is cancelled or fires.

use std::collections::HashMap;

use crate::core::{NetAddr, TimerId};

/// Reverse lookup from timer to owning peer.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    owners: HashMap<TimerId, NetAddr>,
}

impl TimerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `timer` guards the outstanding frame to `peer`.
    pub fn register(&mut self, timer: TimerId, peer: NetAddr) {
        self.owners.insert(timer, peer);
    }

    /// Remove `timer`, returning its owner if it was live.
    pub fn take(&mut self, timer: TimerId) -> Option<NetAddr> {
        self.owners.remove(&timer)
    }

    /// Number of live timers.
    pub(crate) fn len(&self) -> usize {
        self.owners.len()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.owners.clear();
    }
}
