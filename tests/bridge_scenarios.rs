mod common;

use common::{test_config, Harness, WAIT};
use std::collections::BTreeSet;
use std::time::Duration;
use tcp2serial::MockSerialOpener;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Read until the bridge closes our connection. A reset counts as closed.
async fn expect_closed(client: &mut TcpStream) {
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(WAIT, client.read(&mut buf))
        .await
        .expect("bridge should close the connection");
    assert!(matches!(read, Ok(0) | Err(_)), "unexpected data from bridge");
}

#[allow(deprecated)]
fn reset_on_close(client: &TcpStream) {
    client.set_linger(Some(Duration::ZERO)).unwrap();
}

#[tokio::test]
async fn test_clean_disconnect_forwards_and_returns_to_idle() {
    let mut bridge = Harness::start(MockSerialOpener::new()).await;

    let mut client = TcpStream::connect(bridge.addr).await.unwrap();
    client.write_all(b"AB").await.unwrap();
    drop(client);

    let status = bridge.wait_for(|s| s.teardowns == 1 && s.link.is_idle()).await;
    assert_eq!(status.bytes_forwarded, 2);
    assert_eq!(bridge.opener.received(), vec![b"AB".to_vec()]);
    assert_eq!(bridge.opener.open_handles(), 0);

    // Next client is served
    let mut client = TcpStream::connect(bridge.addr).await.unwrap();
    client.write_all(b"CD").await.unwrap();
    drop(client);

    bridge.wait_for(|s| s.teardowns == 2 && s.link.is_idle()).await;
    assert_eq!(
        bridge.opener.received(),
        vec![b"AB".to_vec(), b"CD".to_vec()]
    );

    bridge.stop().await;
}

#[tokio::test]
async fn test_unavailable_serial_rejects_then_recovers() {
    let opener = MockSerialOpener::new();
    opener.set_available(false);
    let mut bridge = Harness::start(opener).await;

    let mut client = TcpStream::connect(bridge.addr).await.unwrap();
    expect_closed(&mut client).await;

    let status = bridge.wait_for(|s| s.connections_rejected == 1).await;
    assert!(status.link.is_idle());
    assert_eq!(bridge.opener.open_handles(), 0);

    bridge.opener.set_available(true);

    let mut client = TcpStream::connect(bridge.addr).await.unwrap();
    client.write_all(b"hello").await.unwrap();
    drop(client);

    let status = bridge.wait_for(|s| s.teardowns == 1 && s.link.is_idle()).await;
    assert_eq!(status.connections_accepted, 2);
    assert_eq!(status.connections_rejected, 1);
    assert_eq!(bridge.opener.received(), vec![b"hello".to_vec()]);

    bridge.stop().await;
}

#[tokio::test]
async fn test_serial_write_failure_closes_connection_and_resumes() {
    let opener = MockSerialOpener::new();
    opener.fail_writes_after(10);
    let mut bridge = Harness::start(opener).await;

    let mut client = TcpStream::connect(bridge.addr).await.unwrap();
    client.write_all(b"0123456789").await.unwrap();
    bridge.wait_for(|s| s.bytes_forwarded == 10).await;

    // The 11th byte exceeds what the device takes
    client.write_all(b"X").await.unwrap();
    expect_closed(&mut client).await;

    let status = bridge.wait_for(|s| s.teardowns == 1 && s.link.is_idle()).await;
    assert_eq!(status.bytes_forwarded, 10);
    assert_eq!(bridge.opener.open_handles(), 0);
    assert_eq!(bridge.opener.received(), vec![b"0123456789".to_vec()]);

    bridge.opener.clear_write_failure();

    let mut client = TcpStream::connect(bridge.addr).await.unwrap();
    client.write_all(b"ok").await.unwrap();
    drop(client);

    bridge.wait_for(|s| s.teardowns == 2 && s.link.is_idle()).await;
    assert_eq!(bridge.opener.received()[1], b"ok".to_vec());

    bridge.stop().await;
}

#[tokio::test]
async fn test_second_client_waits_until_first_disconnects() {
    let mut bridge = Harness::start(MockSerialOpener::new()).await;

    let mut first = TcpStream::connect(bridge.addr).await.unwrap();
    bridge.wait_for(|s| !s.link.is_idle()).await;

    // Completes the TCP handshake from the backlog but is not accepted yet
    let mut second = TcpStream::connect(bridge.addr).await.unwrap();
    second.write_all(b"B1").await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = bridge.current();
    assert_eq!(status.connections_accepted, 1);
    assert_eq!(bridge.opener.open_attempts(), 1);

    first.write_all(b"A1").await.unwrap();
    drop(first);

    let status = bridge
        .wait_for(|s| s.connections_accepted == 2 && s.bytes_forwarded == 4)
        .await;
    assert!(!status.link.is_idle());
    assert_eq!(
        bridge.opener.received(),
        vec![b"A1".to_vec(), b"B1".to_vec()]
    );
    assert_eq!(bridge.opener.max_open_handles(), 1);

    drop(second);
    bridge.wait_for(|s| s.teardowns == 2 && s.link.is_idle()).await;
    bridge.stop().await;
}

#[tokio::test]
async fn test_idle_client_is_dropped_after_read_timeout() {
    let mut config = test_config();
    config.listen.read_timeout_ms = 100;
    let mut bridge = Harness::start_with(MockSerialOpener::new(), config).await;

    let mut stuck = TcpStream::connect(bridge.addr).await.unwrap();
    expect_closed(&mut stuck).await;
    bridge.wait_for(|s| s.teardowns == 1 && s.link.is_idle()).await;

    let mut client = TcpStream::connect(bridge.addr).await.unwrap();
    client.write_all(b"next").await.unwrap();
    drop(client);

    bridge.wait_for(|s| s.teardowns == 2).await;
    assert_eq!(bridge.opener.received()[1], b"next".to_vec());
    bridge.stop().await;
}

#[tokio::test]
async fn test_every_ending_leaves_bridge_idle() {
    let mut bridge = Harness::start(MockSerialOpener::new()).await;

    for cycle in 0..30u64 {
        let payload = format!("cycle-{}", cycle).into_bytes();

        match cycle % 3 {
            // Clean close
            0 => {
                let mut client = TcpStream::connect(bridge.addr).await.unwrap();
                client.write_all(&payload).await.unwrap();
                drop(client);
            }
            // Peer reset
            1 => {
                let forwarded = bridge.current().bytes_forwarded + payload.len() as u64;
                let mut client = TcpStream::connect(bridge.addr).await.unwrap();
                client.write_all(&payload).await.unwrap();
                bridge.wait_for(|s| s.bytes_forwarded == forwarded).await;
                reset_on_close(&client);
                drop(client);
            }
            // Serial write failure
            _ => {
                bridge.opener.fail_writes_after(0);
                let mut client = TcpStream::connect(bridge.addr).await.unwrap();
                bridge.wait_for(|s| !s.link.is_idle()).await;
                bridge.opener.clear_write_failure();
                client.write_all(&payload).await.unwrap();
                expect_closed(&mut client).await;
            }
        }

        let status = bridge
            .wait_for(|s| s.teardowns == cycle + 1 && s.link.is_idle())
            .await;
        assert_eq!(status.connections_accepted, cycle + 1);
        assert_eq!(bridge.opener.open_handles(), 0);
    }

    assert_eq!(bridge.opener.max_open_handles(), 1);

    let received = bridge.opener.received();
    for (cycle, bytes) in received.iter().enumerate() {
        let payload = format!("cycle-{}", cycle).into_bytes();
        if cycle % 3 == 2 {
            assert!(bytes.is_empty(), "failed device should not record bytes");
        } else {
            assert_eq!(bytes, &payload);
        }
    }

    bridge.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_are_serialized() {
    let mut config = test_config();
    config.listen.buffer_size = 3;
    let mut bridge = Harness::start_with(MockSerialOpener::new(), config).await;
    let addr = bridge.addr;

    let clients: Vec<_> = (0..20)
        .map(|i| {
            tokio::spawn(async move {
                let payload = format!("client-{:02}-payload", i).into_bytes();
                let mut client = TcpStream::connect(addr).await.unwrap();
                for chunk in payload.chunks(4) {
                    client.write_all(chunk).await.unwrap();
                }
                client.shutdown().await.unwrap();
                payload
            })
        })
        .collect();

    let mut expected = BTreeSet::new();
    for client in clients {
        expected.insert(client.await.unwrap());
    }

    bridge.wait_for(|s| s.teardowns == 20 && s.link.is_idle()).await;

    let received: BTreeSet<Vec<u8>> = bridge.opener.received().into_iter().collect();
    assert_eq!(received, expected, "each connection maps to exactly one session");
    assert_eq!(bridge.opener.max_open_handles(), 1);

    let status = bridge.stop().await;
    assert_eq!(status.connections_accepted, 20);
}

#[tokio::test]
async fn test_shutdown_releases_listener() {
    let bridge = Harness::start(MockSerialOpener::new()).await;
    let addr = bridge.addr;
    bridge.stop().await;

    let mut config = test_config();
    config.listen.port = addr.port();
    let again = Harness::start_with(MockSerialOpener::new(), config).await;
    assert_eq!(again.addr, addr);
    again.stop().await;
}
