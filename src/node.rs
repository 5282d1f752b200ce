//! A complete node: transport, packet delivery, resolution and link.
//!
//! [`Node`] wires the [`StopAndWait`] engine to the network collaborators
//! and exposes one entry point per event class. Each call runs to
//! completion before the next begins; whoever owns the node (the simulator,
//! the tokio runtime, a test) is responsible for serialising events.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::config::NodeConfig;
use crate::core::{
    Application, Link, MacAddr, NetAddr, SendStatus, StopWaitResult, TimerId, TimerService,
    TransportContext,
};
use crate::network::{
    ArpCache, ArpPacket, EtherType, EthernetFrame, IpLayer, NetworkError, Protocol,
};
use crate::transport::{ReceiveOutcome, StopAndWait, TransportResult};

/// Events a node reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// The application has a message for `destination`.
    ApplicationReady {
        /// Destination node.
        destination: NetAddr,
        /// Message body.
        payload: Vec<u8>,
    },
    /// A link frame arrived from the physical channel.
    PhysicalReady(Vec<u8>),
    /// A timer armed by this node expired.
    TimerExpired(TimerId),
    /// The node restarts, losing all protocol state.
    Reboot,
}

/// What happened to a frame read off the physical channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalOutcome {
    /// A transport segment was processed.
    Transport(ReceiveOutcome),
    /// An address resolution packet was processed.
    Arp {
        /// Whether a reply was sent.
        replied: bool,
    },
    /// A packet for a protocol this node does not run.
    UnhandledProtocol(u8),
    /// The frame was addressed to another station.
    NotForThisStation,
    /// The frame or packet failed to parse or was misaddressed.
    Dropped(NetworkError),
}

/// A node on the segment.
#[derive(Debug)]
pub struct Node<L, T, A> {
    engine: StopAndWait,
    arp: ArpCache,
    ip: IpLayer,
    link: L,
    timers: T,
    app: A,
}

impl<L, T, A> Node<L, T, A>
where
    L: Link,
    T: TimerService,
    A: Application,
{
    /// Create a node.
    pub fn new(
        address: NetAddr,
        mac: MacAddr,
        retransmit_timeout: Duration,
        link: L,
        timers: T,
        app: A,
    ) -> Self {
        Self {
            engine: StopAndWait::new(retransmit_timeout),
            arp: ArpCache::new(),
            ip: IpLayer::new(address, mac),
            link,
            timers,
            app,
        }
    }

    /// Create a node from its configuration.
    pub fn from_config(config: &NodeConfig, link: L, timers: T, app: A) -> Self {
        Self::new(
            config.address,
            config.mac,
            config.retransmit_timeout(),
            link,
            timers,
            app,
        )
    }

    /// Network address.
    pub fn address(&self) -> NetAddr {
        self.ip.local_addr()
    }

    /// Delivery address.
    pub fn mac(&self) -> MacAddr {
        self.ip.local_mac()
    }

    /// Whether the application may hand over a new message.
    pub fn can_send(&self) -> bool {
        self.engine.can_send()
    }

    /// The transport engine.
    pub fn engine(&self) -> &StopAndWait {
        &self.engine
    }

    /// The address resolution cache.
    pub fn arp(&self) -> &ArpCache {
        &self.arp
    }

    /// Mutable access to the address resolution cache, for static entries.
    pub fn arp_mut(&mut self) -> &mut ArpCache {
        &mut self.arp
    }

    /// The physical link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable access to the physical link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// The timer service.
    pub fn timers(&self) -> &T {
        &self.timers
    }

    /// Mutable access to the timer service.
    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    /// The application.
    pub fn application(&self) -> &A {
        &self.app
    }

    /// Mutable access to the application.
    pub fn application_mut(&mut self) -> &mut A {
        &mut self.app
    }

    /// Dispatch one event.
    pub fn handle(&mut self, event: NodeEvent) -> StopWaitResult<()> {
        match event {
            NodeEvent::ApplicationReady {
                destination,
                payload,
            } => self.on_application_ready(destination, payload)?,
            NodeEvent::PhysicalReady(frame) => {
                self.on_physical_ready(&frame);
            }
            NodeEvent::TimerExpired(id) => {
                self.on_timer_expired(id);
            }
            NodeEvent::Reboot => self.reboot(),
        }
        Ok(())
    }

    /// Hand a new application message to the transport.
    pub fn on_application_ready(&mut self, destination: NetAddr, payload: Vec<u8>) -> TransportResult<()> {
        let (engine, mut ctx) = self.split();
        engine.send_message(&mut ctx, destination, payload)
    }

    /// Process a link frame read from the physical channel.
    pub fn on_physical_ready(&mut self, bytes: &[u8]) -> PhysicalOutcome {
        let frame = match EthernetFrame::decode(bytes) {
            Ok(frame) => frame,
            Err(error) => {
                report(&error, "link frame");
                return PhysicalOutcome::Dropped(error);
            }
        };
        if !frame.accepts(self.mac()) {
            trace!(destination = %frame.destination, "link frame for another station");
            return PhysicalOutcome::NotForThisStation;
        }

        match frame.ether_type {
            EtherType::Arp => self.on_arp(&frame.payload),
            EtherType::Ip => self.on_packet(&frame.payload),
        }
    }

    /// React to an expired timer. Returns whether a frame was resent.
    pub fn on_timer_expired(&mut self, id: TimerId) -> bool {
        let (engine, mut ctx) = self.split();
        engine.on_timer_expired(&mut ctx, id)
    }

    /// Restart: forget all peers, timers and resolved addresses.
    pub fn reboot(&mut self) {
        for id in self.engine.reset() {
            self.timers.stop(id);
        }
        self.arp.clear();
        info!(node = %self.address(), "node rebooted");
    }

    fn on_arp(&mut self, payload: &[u8]) -> PhysicalOutcome {
        let packet = match ArpPacket::decode(payload) {
            Ok(packet) => packet,
            Err(error) => {
                report(&error, "ARP packet");
                return PhysicalOutcome::Dropped(error);
            }
        };

        let reply = self.arp.handle(&packet, self.ip.local_addr(), self.ip.local_mac());
        let replied = reply.is_some();
        if let Some(reply) = reply {
            self.ip.send_arp(&mut self.link, reply.target_mac, reply.encode());
        }
        PhysicalOutcome::Arp { replied }
    }

    fn on_packet(&mut self, payload: &[u8]) -> PhysicalOutcome {
        let packet = match self.ip.accept(payload) {
            Ok(packet) => packet,
            Err(error) => {
                report(&error, "packet");
                return PhysicalOutcome::Dropped(error);
            }
        };

        match packet.protocol {
            Protocol::StopAndWait => {
                let (engine, mut ctx) = self.split();
                PhysicalOutcome::Transport(engine.on_frame_received(&mut ctx, &packet.payload))
            }
            Protocol::Other(tag) => {
                debug!(protocol = tag, source = %packet.source, "unhandled protocol");
                PhysicalOutcome::UnhandledProtocol(tag)
            }
        }
    }

    fn split(&mut self) -> (&mut StopAndWait, StackContext<'_, L, T, A>) {
        (
            &mut self.engine,
            StackContext {
                ip: &self.ip,
                arp: &self.arp,
                link: &mut self.link,
                timers: &mut self.timers,
                app: &mut self.app,
            },
        )
    }
}

/// The node's collaborators as seen by the transport engine.
struct StackContext<'a, L, T, A> {
    ip: &'a IpLayer,
    arp: &'a ArpCache,
    link: &'a mut L,
    timers: &'a mut T,
    app: &'a mut A,
}

impl<L, T, A> TransportContext for StackContext<'_, L, T, A>
where
    L: Link,
    T: TimerService,
    A: Application,
{
    fn local_addr(&self) -> NetAddr {
        self.ip.local_addr()
    }

    fn transmit(&mut self, destination: NetAddr, segment: Vec<u8>) -> SendStatus {
        match self
            .ip
            .send(self.arp, &mut *self.link, destination, Protocol::StopAndWait, &segment)
        {
            Ok(status) => status,
            Err(error) => {
                report(&error, "outbound packet");
                SendStatus::Unresolved
            }
        }
    }

    fn start_timer(&mut self, after: Duration) -> TimerId {
        self.timers.start(after)
    }

    fn stop_timer(&mut self, id: TimerId) {
        self.timers.stop(id)
    }

    fn deliver(&mut self, source: NetAddr, payload: &[u8]) {
        self.app.deliver(source, payload)
    }
}

/// Log a network error at the level its class calls for.
fn report(error: &NetworkError, stage: &'static str) {
    if error.is_silent_drop() {
        debug!(%error, stage, "dropped");
    } else {
        warn!(%error, stage, "rejected");
    }
}
