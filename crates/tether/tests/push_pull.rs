// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Push/Pull and Pub/Sub integration tests over the in-process transport.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tether::{Endpoint, EndpointConfig, InprocTransport, Transport};

const RECV_DEADLINE: Duration = Duration::from_secs(5);

fn endpoint(
    transport: &InprocTransport,
    pattern: &str,
    address: &str,
    connect: bool,
    buffer: usize,
) -> Endpoint {
    let config = EndpointConfig::builder()
        .pattern(pattern)
        .address(address)
        .attach(connect)
        .buffer_size(buffer)
        .reconnect_interval(Duration::from_millis(20))
        .exit_wait_timeout(Duration::from_secs(2))
        .build();
    let transport: Arc<dyn Transport> = Arc::new(transport.clone());
    Endpoint::new(config, transport).expect("valid endpoint")
}

async fn wait_bound(transport: &InprocTransport, address: &str) {
    for _ in 0..200 {
        if transport.bound_addresses().iter().any(|a| a == address) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{address} never bound");
}

async fn recv(ep: &Endpoint) -> Vec<u8> {
    tokio::time::timeout(RECV_DEADLINE, ep.recv_outbound())
        .await
        .expect("frame in time")
        .expect("endpoint open")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_push_pull_preserves_order() {
    let transport = InprocTransport::new();
    let pull = endpoint(&transport, "pull", "inproc://ordered", false, 256);
    let push = endpoint(&transport, "push", "inproc://ordered", true, 256);

    pull.start_consumer().unwrap();
    wait_bound(&transport, "inproc://ordered").await;
    push.start_publisher().unwrap();

    for i in 0..100u32 {
        push.send(i.to_be_bytes().to_vec()).await.unwrap();
    }
    for i in 0..100u32 {
        assert_eq!(recv(&pull).await, i.to_be_bytes().to_vec());
    }

    assert_eq!(push.stats().sent, 100);
    assert_eq!(pull.stats().received, 100);
    assert_eq!(push.stats().dropped, 0);

    assert!(push.shutdown().await.is_ok());
    assert!(pull.shutdown().await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_thousand_messages_arrive_once() {
    let transport = InprocTransport::new();
    let pull = endpoint(&transport, "pull", "inproc://thousand", false, 1000);
    let push = endpoint(&transport, "push", "inproc://thousand", true, 1000);

    pull.start_consumer().unwrap();
    wait_bound(&transport, "inproc://thousand").await;
    push.start_publisher().unwrap();

    let producer = {
        let push = push.clone();
        tokio::spawn(async move {
            for i in 0..1000 {
                push.send(i.to_string().into_bytes()).await.unwrap();
            }
        })
    };

    let mut seen = HashSet::new();
    for _ in 0..1000 {
        let frame = recv(&pull).await;
        assert!(seen.insert(String::from_utf8(frame).unwrap()));
    }
    producer.await.unwrap();

    let expected: HashSet<String> = (0..1000).map(|i| i.to_string()).collect();
    assert_eq!(seen, expected);

    assert!(push.shutdown().await.is_ok());
    assert!(pull.shutdown().await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_push_started_before_pull_recovers() {
    let transport = InprocTransport::new();
    let push = endpoint(&transport, "push", "inproc://late", true, 16);
    let pull = endpoint(&transport, "pull", "inproc://late", false, 16);

    // nothing bound yet: connect fails and the supervisor keeps retrying
    push.start_publisher().unwrap();
    push.send(b"early".to_vec()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(push.stats().restarts >= 1);

    pull.start_consumer().unwrap();
    assert_eq!(recv(&pull).await, b"early".to_vec());

    assert!(push.shutdown().await.is_ok());
    assert!(pull.shutdown().await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pub_sub_fan_out() {
    let transport = InprocTransport::new();
    let publisher = endpoint(&transport, "pub", "inproc://ticks", false, 64);
    let sub_a = endpoint(&transport, "sub", "inproc://ticks", true, 64);
    let sub_b = endpoint(&transport, "sub", "inproc://ticks", true, 64);

    publisher.start_publisher().unwrap();
    wait_bound(&transport, "inproc://ticks").await;
    sub_a.start_consumer().unwrap();
    sub_b.start_consumer().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    for i in 0..10u8 {
        publisher.send(vec![i]).await.unwrap();
    }

    for sub in [&sub_a, &sub_b] {
        for i in 0..10u8 {
            assert_eq!(recv(sub).await, vec![i]);
        }
    }
    assert_eq!(publisher.stats().sent, 10);

    assert!(publisher.shutdown().await.is_ok());
    assert!(sub_a.shutdown().await.is_ok());
    assert!(sub_b.shutdown().await.is_ok());
}
