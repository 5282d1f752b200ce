//! Nodes running as tokio tasks over a loopback UDP segment.

#![cfg(feature = "runtime")]

use std::time::Duration;

use stopwait_protocol::config::NodeConfigBuilder;
use stopwait_protocol::core::{MacAddr, NetAddr};
use stopwait_protocol::runtime::{Delivery, NodeHandle, UdpSegment, spawn_with_segment};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn segment(n: usize) -> Vec<UdpSegment> {
    let mut segments = Vec::new();
    for _ in 0..n {
        segments.push(
            UdpSegment::bind("127.0.0.1:0".parse().unwrap(), Vec::new())
                .await
                .unwrap(),
        );
    }
    let addrs: Vec<_> = segments.iter().map(|s| s.local_addr().unwrap()).collect();
    for (i, seg) in segments.iter_mut().enumerate() {
        for (j, addr) in addrs.iter().enumerate() {
            if i != j {
                seg.add_peer(*addr);
            }
        }
    }
    segments
}

fn start(segments: Vec<UdpSegment>) -> Vec<NodeHandle> {
    start_with_timeout(segments, Duration::from_millis(100))
}

fn start_with_timeout(segments: Vec<UdpSegment>, timeout: Duration) -> Vec<NodeHandle> {
    segments
        .into_iter()
        .enumerate()
        .map(|(i, seg)| {
            let n = i as u8 + 1;
            let config = NodeConfigBuilder::new()
                .address(NetAddr(n as u32))
                .mac(MacAddr::new([0x02, 0, 0, 0, 0, n]))
                .retransmit_timeout(timeout)
                .build();
            spawn_with_segment(&config, seg).unwrap()
        })
        .collect()
}

async fn recv(handle: &mut NodeHandle) -> Delivery {
    tokio::time::timeout(RECV_TIMEOUT, handle.recv())
        .await
        .expect("delivery timed out")
        .expect("node stopped")
}

#[tokio::test]
async fn bidirectional_exchange() {
    let mut nodes = start(segment(2).await);

    for i in 0..5u8 {
        nodes[0].send(NetAddr(2), vec![b'a', i]).await.unwrap();
        nodes[1].send(NetAddr(1), vec![b'b', i]).await.unwrap();
    }

    for i in 0..5u8 {
        let at_b = recv(&mut nodes[1]).await;
        assert_eq!(at_b.source, NetAddr(1));
        assert_eq!(at_b.payload, vec![b'a', i]);

        let at_a = recv(&mut nodes[0]).await;
        assert_eq!(at_a.source, NetAddr(2));
        assert_eq!(at_a.payload, vec![b'b', i]);
    }

    for node in nodes {
        node.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn third_station_sees_nothing_addressed_to_others() {
    let mut nodes = start(segment(3).await);

    nodes[0].send(NetAddr(2), b"private".to_vec()).await.unwrap();
    let delivery = recv(&mut nodes[1]).await;
    assert_eq!(delivery.payload, b"private");

    let quiet = tokio::time::timeout(Duration::from_millis(300), nodes[2].recv()).await;
    assert!(quiet.is_err());

    for node in nodes {
        node.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn single_node_shuts_down_cleanly() {
    let mut nodes = start(segment(1).await);
    let node = nodes.remove(0);
    let address = node.address();
    node.shutdown().await.unwrap();
    assert_eq!(address, NetAddr(1));
}

#[tokio::test]
async fn reboot_then_fresh_exchange() {
    // Long enough that no retransmission of "one" is still in flight.
    let mut nodes = start_with_timeout(segment(2).await, Duration::from_millis(500));

    nodes[0].send(NetAddr(2), b"one".to_vec()).await.unwrap();
    assert_eq!(recv(&mut nodes[1]).await.payload, b"one");
    tokio::time::sleep(Duration::from_millis(50)).await;

    nodes[0].reboot().await.unwrap();
    nodes[1].reboot().await.unwrap();

    nodes[0].send(NetAddr(2), b"two".to_vec()).await.unwrap();
    nodes[1].send(NetAddr(1), b"back".to_vec()).await.unwrap();

    let at_b = recv(&mut nodes[1]).await;
    assert_eq!((at_b.source, at_b.payload), (NetAddr(1), b"two".to_vec()));
    let at_a = recv(&mut nodes[0]).await;
    assert_eq!((at_a.source, at_a.payload), (NetAddr(2), b"back".to_vec()));

    for node in nodes {
        node.shutdown().await.unwrap();
    }
}
