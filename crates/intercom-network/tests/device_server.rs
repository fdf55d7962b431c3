//! Integration tests for DeviceServer over loopback TCP.

use std::time::Duration;

use intercom_network::{ConnectionManager, DeviceEvent, DeviceServer, DeviceServerConfig};
use intercom_protocol::DeviceReply;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

async fn start_server() -> (std::net::SocketAddr, mpsc::Receiver<DeviceEvent>) {
    let config = DeviceServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
    };
    let server = DeviceServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(server.run(tx));
    (addr, rx)
}

async fn next_event(rx: &mut mpsc::Receiver<DeviceEvent>) -> DeviceEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("event within timeout")
        .expect("server still running")
}

#[tokio::test]
async fn test_connected_precedes_chunks() {
    let (addr, mut events) = start_server().await;

    let mut device = TcpStream::connect(addr).await.unwrap();
    device.write_all(b"start").await.unwrap();

    let link = match next_event(&mut events).await {
        DeviceEvent::Connected(link) => link,
        other => panic!("expected Connected, got {:?}", other),
    };

    match next_event(&mut events).await {
        DeviceEvent::Chunk { connection, data } => {
            assert_eq!(connection, link.id());
            assert_eq!(data.as_ref(), b"start");
        }
        other => panic!("expected Chunk, got {:?}", other),
    }

    // Keep the link alive until the end of the test
    drop(link);
}

#[tokio::test]
async fn test_separate_writes_stay_separate_chunks() {
    let (addr, mut events) = start_server().await;
    let mut device = TcpStream::connect(addr).await.unwrap();

    let DeviceEvent::Connected(_link) = next_event(&mut events).await else {
        panic!("expected Connected");
    };

    device.write_all(b"start").await.unwrap();
    let DeviceEvent::Chunk { data, .. } = next_event(&mut events).await else {
        panic!("expected first chunk");
    };
    assert_eq!(data.as_ref(), b"start");

    device.write_all(b"42").await.unwrap();
    let DeviceEvent::Chunk { data, .. } = next_event(&mut events).await else {
        panic!("expected second chunk");
    };
    assert_eq!(data.as_ref(), b"42");
}

#[tokio::test]
async fn test_reply_reaches_device() {
    let (addr, mut events) = start_server().await;
    let mut device = TcpStream::connect(addr).await.unwrap();

    let DeviceEvent::Connected(link) = next_event(&mut events).await else {
        panic!("expected Connected");
    };

    link.send(DeviceReply::NotFound).unwrap();

    let mut buf = [0u8; 16];
    let n = timeout(WAIT, device.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"not_found");
}

#[tokio::test]
async fn test_device_hangup_emits_disconnected() {
    let (addr, mut events) = start_server().await;
    let device = TcpStream::connect(addr).await.unwrap();

    let DeviceEvent::Connected(link) = next_event(&mut events).await else {
        panic!("expected Connected");
    };

    drop(device);

    match next_event(&mut events).await {
        DeviceEvent::Disconnected { connection } => assert_eq!(connection, link.id()),
        other => panic!("expected Disconnected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_second_device_displaces_first() {
    let (addr, mut events) = start_server().await;
    let mut manager = ConnectionManager::new();

    let mut first = TcpStream::connect(addr).await.unwrap();
    let DeviceEvent::Connected(link) = next_event(&mut events).await else {
        panic!("expected first Connected");
    };
    let first_id = link.id();
    assert!(manager.attach(link).is_none());

    let _second = TcpStream::connect(addr).await.unwrap();
    let DeviceEvent::Connected(link) = next_event(&mut events).await else {
        panic!("expected second Connected");
    };
    let second_id = link.id();
    assert_ne!(first_id, second_id);

    let displaced = manager.attach(link).expect("first device displaced");
    displaced.close();

    // The displaced socket is closed from our side
    let mut buf = [0u8; 8];
    let n = timeout(WAIT, first.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0);

    // Its trailing event is recognisable as stale
    let event = next_event(&mut events).await;
    assert_eq!(event.connection(), first_id);
    assert!(!manager.is_current(event.connection()));
    assert!(manager.is_current(second_id));
}
