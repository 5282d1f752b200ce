//! Shared segment emulated over UDP.
//!
//! Each station binds one UDP socket. A link frame "written to the wire" is
//! sent as one datagram to every other station's socket, so all stations
//! see it and filter on the link destination, as on a real broadcast
//! medium.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{trace, warn};

/// Default receive buffer size.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// One station's attachment to the emulated segment.
#[derive(Debug)]
pub struct UdpSegment {
    socket: UdpSocket,
    peers: Vec<SocketAddr>,
    recv_buffer: Vec<u8>,
}

impl UdpSegment {
    /// Bind to `addr` and attach to the stations at `peers`.
    pub async fn bind(addr: SocketAddr, peers: Vec<SocketAddr>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket, peers))
    }

    /// Use an already bound socket.
    pub fn from_socket(socket: UdpSocket, peers: Vec<SocketAddr>) -> Self {
        Self {
            socket,
            peers,
            recv_buffer: vec![0u8; DEFAULT_RECV_BUFFER_SIZE],
        }
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Attach another station.
    pub fn add_peer(&mut self, addr: SocketAddr) {
        if !self.peers.contains(&addr) {
            self.peers.push(addr);
        }
    }

    /// Stations this one transmits to.
    pub fn peers(&self) -> &[SocketAddr] {
        &self.peers
    }

    /// Put a link frame on the segment.
    ///
    /// The segment is unreliable: a failed send to one station is logged
    /// and the others are still attempted.
    pub async fn broadcast(&self, frame: &[u8]) {
        for peer in &self.peers {
            match self.socket.send_to(frame, peer).await {
                Ok(_) => trace!(peer = %peer, len = frame.len(), "frame sent"),
                Err(error) => warn!(peer = %peer, %error, "frame send failed"),
            }
        }
    }

    /// Receive the next link frame.
    pub async fn recv_frame(&mut self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let (len, from) = self.socket.recv_from(&mut self.recv_buffer).await?;
        Ok((self.recv_buffer[..len].to_vec(), from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bind_local() -> UdpSegment {
        UdpSegment::bind("127.0.0.1:0".parse().unwrap(), Vec::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_segment_bind() {
        let segment = bind_local().await;
        let addr = segment.local_addr().unwrap();
        assert!(addr.port() != 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_peer() {
        let mut left = bind_local().await;
        let mut right = bind_local().await;
        let mut sender = bind_local().await;
        sender.add_peer(left.local_addr().unwrap());
        sender.add_peer(right.local_addr().unwrap());
        sender.add_peer(left.local_addr().unwrap());
        assert_eq!(sender.peers().len(), 2);

        sender.broadcast(b"frame").await;

        let (received, from) = left.recv_frame().await.unwrap();
        assert_eq!(received, b"frame");
        assert_eq!(from, sender.local_addr().unwrap());
        let (received, _) = right.recv_frame().await.unwrap();
        assert_eq!(received, b"frame");
    }
}
