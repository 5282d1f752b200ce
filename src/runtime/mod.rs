//! Tokio runtime for a node.
//!
//! [`spawn_node`] starts one task that exclusively owns a [`Node`] and
//! serialises its three event sources with `tokio::select!`:
//!
//! - control commands and new messages from the [`NodeHandle`]
//! - link frames from the [`UdpSegment`]
//! - the earliest armed retransmission timer
//!
//! Each event runs to completion before the next is polled, so protocol
//! state needs no locking. Messages handed to [`NodeHandle::send`] wait in
//! a bounded channel and are only taken while the admission gate is open.
//! Deliveries go out through a bounded channel too: while the application
//! is not reading, the task stops reading the segment and unacknowledged
//! peers keep retransmitting.

mod segment;

pub use segment::*;

use std::collections::VecDeque;
use std::net::SocketAddr;

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{self, Permit};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::core::{Application, NetAddr, StopWaitError, StopWaitResult};
use crate::node::Node;
use crate::timer::TimerQueue;
use crate::transport::{FrameError, MAX_PAYLOAD, TransportError};

/// Capacity of the outgoing message channel.
const COMMAND_CHANNEL_SIZE: usize = 256;

/// Capacity of the delivery channel.
const DELIVERY_CHANNEL_SIZE: usize = 256;

/// Capacity of the control channel.
const CONTROL_CHANNEL_SIZE: usize = 8;

/// A message delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Originating node.
    pub source: NetAddr,
    /// Message body.
    pub payload: Vec<u8>,
}

#[derive(Debug)]
enum Command {
    Reboot(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Debug)]
struct Outgoing {
    destination: NetAddr,
    payload: Vec<u8>,
}

/// Holds deliveries until the delivery channel has room.
///
/// A single received frame delivers at most one message, and the segment
/// is not read while anything is pending.
#[derive(Debug, Default)]
struct ChannelApp {
    pending: VecDeque<Delivery>,
}

impl ChannelApp {
    fn is_backlogged(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Application for ChannelApp {
    fn deliver(&mut self, source: NetAddr, payload: &[u8]) {
        self.pending.push_back(Delivery {
            source,
            payload: payload.to_vec(),
        });
    }
}

type RuntimeNode = Node<Vec<Vec<u8>>, TimerQueue, ChannelApp>;

/// Handle to a running node task.
#[derive(Debug)]
pub struct NodeHandle {
    address: NetAddr,
    local_addr: SocketAddr,
    control: mpsc::Sender<Command>,
    outgoing: mpsc::Sender<Outgoing>,
    deliveries: mpsc::Receiver<Delivery>,
    task: JoinHandle<()>,
}

impl NodeHandle {
    /// Network address of the node.
    pub fn address(&self) -> NetAddr {
        self.address
    }

    /// UDP address the node's segment socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queue a message for `destination`.
    pub async fn send(&self, destination: NetAddr, payload: Vec<u8>) -> StopWaitResult<()> {
        if payload.len() > MAX_PAYLOAD {
            return Err(TransportError::from(FrameError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            })
            .into());
        }
        self.outgoing
            .send(Outgoing {
                destination,
                payload,
            })
            .await
            .map_err(|_| StopWaitError::NodeStopped)
    }

    /// Next message delivered to this node. `None` once the task stopped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }

    /// Restart the node, losing all protocol state. Queued messages stay.
    ///
    /// Returns once the node has rebooted.
    pub async fn reboot(&self) -> StopWaitResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.control
            .send(Command::Reboot(done_tx))
            .await
            .map_err(|_| StopWaitError::NodeStopped)?;
        done_rx.await.map_err(|_| StopWaitError::NodeStopped)
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) -> StopWaitResult<()> {
        // The task may already be gone; joining below reports that.
        let _ = self.control.send(Command::Shutdown).await;
        self.task.await.map_err(|_| StopWaitError::NodeStopped)
    }
}

/// Bind the configured segment socket and start a node task.
pub async fn spawn_node(config: NodeConfig) -> StopWaitResult<NodeHandle> {
    config.validate()?;
    let segment = UdpSegment::bind(config.bind_addr, config.segment_peers.clone()).await?;
    spawn_with_segment(&config, segment)
}

/// Start a node task on an already attached segment.
///
/// `config.bind_addr` and `config.segment_peers` are ignored.
pub fn spawn_with_segment(config: &NodeConfig, segment: UdpSegment) -> StopWaitResult<NodeHandle> {
    config.validate()?;
    let local_addr = segment.local_addr()?;

    let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);
    let (outgoing_tx, outgoing_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (delivery_tx, delivery_rx) = mpsc::channel(DELIVERY_CHANNEL_SIZE);

    let node = Node::from_config(config, Vec::new(), TimerQueue::new(), ChannelApp::default());
    let task = NodeTask {
        node,
        segment,
        deliveries: delivery_tx,
        started: Instant::now(),
    };

    info!(node = %config.address, mac = %config.mac, socket = %local_addr, "node started");
    let task = tokio::spawn(task.run(control_rx, outgoing_rx));

    Ok(NodeHandle {
        address: config.address,
        local_addr,
        control: control_tx,
        outgoing: outgoing_tx,
        deliveries: delivery_rx,
        task,
    })
}

enum Wake<'a> {
    Control(Option<Command>),
    Outgoing(Option<Outgoing>),
    Frame(std::io::Result<(Vec<u8>, SocketAddr)>),
    Deliver(Result<Permit<'a, Delivery>, SendError<()>>),
    Timer,
}

struct NodeTask {
    node: RuntimeNode,
    segment: UdpSegment,
    deliveries: mpsc::Sender<Delivery>,
    started: Instant,
}

impl NodeTask {
    async fn run(
        mut self,
        mut control: mpsc::Receiver<Command>,
        mut outgoing: mpsc::Receiver<Outgoing>,
    ) {
        loop {
            self.flush().await;

            let admitting = self.node.can_send();
            let backlogged = self.node.application().is_backlogged();
            let deadline = self.node.timers().next_deadline().map(|d| self.started + d);
            let wake = tokio::select! {
                command = control.recv() => Wake::Control(command),
                message = outgoing.recv(), if admitting => Wake::Outgoing(message),
                permit = self.deliveries.reserve(), if backlogged => Wake::Deliver(permit),
                frame = self.segment.recv_frame(), if !backlogged => Wake::Frame(frame),
                _ = sleep_until(deadline) => Wake::Timer,
            };

            self.node.timers_mut().advance_to(self.started.elapsed());
            match wake {
                Wake::Control(Some(Command::Reboot(done))) => {
                    self.node.reboot();
                    let _ = done.send(());
                }
                Wake::Control(Some(Command::Shutdown)) | Wake::Control(None) => break,
                Wake::Outgoing(Some(Outgoing {
                    destination,
                    payload,
                })) => {
                    if let Err(error) = self.node.on_application_ready(destination, payload) {
                        warn!(%error, destination = %destination, "message rejected");
                    }
                }
                Wake::Outgoing(None) => break,
                Wake::Deliver(Ok(permit)) => {
                    if let Some(delivery) = self.node.application_mut().pending.pop_front() {
                        permit.send(delivery);
                    }
                }
                Wake::Deliver(Err(_)) => {
                    let dropped = self.node.application_mut().pending.len();
                    debug!(dropped, "deliveries dropped, handle closed");
                    self.node.application_mut().pending.clear();
                }
                Wake::Frame(Ok((frame, from))) => {
                    let outcome = self.node.on_physical_ready(&frame);
                    debug!(from = %from, ?outcome, "frame processed");
                }
                Wake::Frame(Err(error)) => warn!(%error, "segment receive failed"),
                Wake::Timer => {
                    for id in self.node.timers_mut().pop_expired() {
                        self.node.on_timer_expired(id);
                    }
                }
            }
        }

        info!(node = %self.node.address(), "node stopped");
    }

    async fn flush(&mut self) {
        let frames: Vec<Vec<u8>> = self.node.link_mut().drain(..).collect();
        for frame in frames {
            self.segment.broadcast(&frame).await;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfigBuilder;
    use crate::core::MacAddr;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let config = NodeConfigBuilder::new()
            .bind_addr("127.0.0.1:0".parse().unwrap())
            .build();
        let handle = spawn_node(config).await.unwrap();
        assert_eq!(handle.address(), NetAddr(1));
        assert!(handle.local_addr().port() != 0);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = NodeConfigBuilder::new().mac(MacAddr::BROADCAST).build();
        assert!(matches!(
            spawn_node(config).await,
            Err(StopWaitError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let handle = spawn_node(NodeConfig::default()).await.unwrap();
        let result = handle.send(NetAddr(2), vec![0; MAX_PAYLOAD + 1]).await;
        assert!(matches!(result, Err(StopWaitError::Transport(_))));
        handle.shutdown().await.unwrap();
    }

    async fn loopback_pair() -> (NodeHandle, NodeHandle) {
        let mut seg_a = UdpSegment::bind("127.0.0.1:0".parse().unwrap(), Vec::new())
            .await
            .unwrap();
        let mut seg_b = UdpSegment::bind("127.0.0.1:0".parse().unwrap(), Vec::new())
            .await
            .unwrap();
        seg_a.add_peer(seg_b.local_addr().unwrap());
        seg_b.add_peer(seg_a.local_addr().unwrap());

        let config_a = NodeConfigBuilder::new()
            .address(NetAddr(1))
            .mac(MacAddr::new([2, 0, 0, 0, 0, 1]))
            .retransmit_timeout(Duration::from_millis(100))
            .build();
        let config_b = NodeConfigBuilder::new()
            .address(NetAddr(2))
            .mac(MacAddr::new([2, 0, 0, 0, 0, 2]))
            .retransmit_timeout(Duration::from_millis(100))
            .build();

        (
            spawn_with_segment(&config_a, seg_a).unwrap(),
            spawn_with_segment(&config_b, seg_b).unwrap(),
        )
    }

    async fn next(handle: &mut NodeHandle) -> Delivery {
        tokio::time::timeout(Duration::from_secs(5), handle.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_loopback_pair() {
        let (a, mut b) = loopback_pair().await;

        a.send(NetAddr(2), b"hello".to_vec()).await.unwrap();
        a.send(NetAddr(2), b"world".to_vec()).await.unwrap();

        let first = next(&mut b).await;
        let second = next(&mut b).await;

        assert_eq!(first.source, NetAddr(1));
        assert_eq!(first.payload, b"hello");
        assert_eq!(second.payload, b"world");

        a.shutdown().await.unwrap();
        b.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stalled_reader_loses_nothing() {
        let (a, mut b) = loopback_pair().await;
        let total = DELIVERY_CHANNEL_SIZE + 8;

        for i in 0..total {
            let payload = (i as u32).to_be_bytes().to_vec();
            a.send(NetAddr(2), payload).await.unwrap();
        }
        // Let the delivery channel fill while nobody reads it.
        tokio::time::sleep(Duration::from_millis(500)).await;

        for i in 0..total {
            let delivery = next(&mut b).await;
            assert_eq!(delivery.payload, (i as u32).to_be_bytes().to_vec());
        }

        a.shutdown().await.unwrap();
        b.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_with_full_delivery_channel() {
        let (a, b) = loopback_pair().await;

        for i in 0..DELIVERY_CHANNEL_SIZE + 2 {
            a.send(NetAddr(2), vec![i as u8]).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        tokio::time::timeout(Duration::from_secs(5), b.shutdown())
            .await
            .unwrap()
            .unwrap();
        a.shutdown().await.unwrap();
    }
}
