use std::net::Shutdown;

use inkstream::{bootstrap, AddrFamily, Connection, Listener, Socket, SocketError};

// First caller wins; the rejection of a second start is itself covered by
// the bootstrap unit tests.
fn ensure_net() {
    let _ = bootstrap::start();
}

fn listen_local() -> Listener {
    ensure_net();
    let socket = Socket::new(AddrFamily::Ipv4).unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    socket.listen().unwrap()
}

async fn connected_pair() -> (Connection, Connection) {
    let listener = listen_local();
    let addr = listener.local_addr().unwrap();
    let client_socket = Socket::new(AddrFamily::Ipv4).unwrap();
    let (accepted, connected) = tokio::join!(listener.accept(), client_socket.connect(addr));
    (accepted.unwrap(), connected.unwrap())
}

#[tokio::test]
async fn test_accept_reports_connector_address() {
    let listener = listen_local();
    let listen_addr = listener.local_addr().unwrap();

    let client_socket = Socket::new(AddrFamily::Ipv4).unwrap();
    let (accepted, client) = tokio::join!(listener.accept(), client_socket.connect(listen_addr));
    let (accepted, client) = (accepted.unwrap(), client.unwrap());

    assert_eq!(
        accepted.peer_addr().unwrap(),
        client.local_addr().unwrap()
    );
    assert_eq!(client.peer_addr().unwrap(), listen_addr);
    assert_eq!(client.port().unwrap(), listen_addr.port());
}

#[tokio::test]
async fn test_round_trip_preserves_order_across_partial_transfers() {
    let (server_end, client_end) = connected_pair().await;

    // large enough that the transfer cannot complete in one call
    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    let total = payload.len();

    let sender = tokio::spawn(async move {
        let mut sent = 0;
        while sent < payload.len() {
            sent += client_end.send(&payload[sent..]).await.unwrap();
        }
        payload
    });

    let mut received = Vec::with_capacity(total);
    let mut buf = vec![0u8; 8 * 1024];
    while received.len() < total {
        let n = server_end.recv(&mut buf).await.unwrap();
        assert!(n > 0, "unexpected end-of-stream mid-transfer");
        received.extend_from_slice(&buf[..n]);
    }

    let payload = sender.await.unwrap();
    assert_eq!(received, payload);
}

#[tokio::test]
async fn test_nonblocking_recv_reports_would_block() {
    let (server_end, client_end) = connected_pair().await;

    server_end.set_blocking(false).unwrap();

    let mut buf = [0u8; 64];
    let err = server_end.recv(&mut buf).await.unwrap_err();
    assert_eq!(err, SocketError::WouldBlock);
    assert!(err.is_retryable());
    assert!(!err.is_fatal());

    // after parking on readiness the retried call makes progress
    client_end.send(b"ping").await.unwrap();
    server_end.readable().await.unwrap();
    let n = server_end.recv(&mut buf).await.unwrap();
    assert!(n > 0);
}

#[tokio::test]
async fn test_recv_after_peer_close_is_eof_or_fatal() {
    let (server_end, client_end) = connected_pair().await;

    drop(client_end);

    let mut buf = [0u8; 64];
    match server_end.recv(&mut buf).await {
        Ok(0) => {}
        Ok(n) => panic!("received {n} bytes from a closed peer"),
        Err(e) => assert!(e.is_fatal(), "expected a fatal code, got {e:?}"),
    }
}

#[tokio::test]
async fn test_clone_shares_descriptor_until_last_close() {
    let (server_end, client_end) = connected_pair().await;

    let mut first_copy = client_end.clone();
    let second_copy = client_end;

    // closing one copy detaches only that copy
    first_copy.close();
    assert!(!first_copy.is_open());
    assert_eq!(
        first_copy.send(b"x").await.unwrap_err(),
        SocketError::NotConnected
    );

    // the sibling still drives the same live descriptor
    assert!(second_copy.is_open());
    let n = second_copy.send(b"still alive").await.unwrap();
    assert!(n > 0);
    let mut buf = [0u8; 64];
    let received = server_end.recv(&mut buf).await.unwrap();
    assert_eq!(&buf[..received], &b"still alive"[..received]);

    // last copy released: the peer now observes end-of-stream
    drop(second_copy);
    match server_end.recv(&mut buf).await {
        Ok(0) => {}
        Ok(n) => panic!("received {n} bytes after last copy released"),
        Err(e) => assert!(e.is_fatal(), "expected a fatal code, got {e:?}"),
    }
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (_server_end, client_end) = connected_pair().await;

    let mut copy = client_end.clone();
    copy.close();
    copy.close();
    assert!(!copy.is_open());
}

#[tokio::test]
async fn test_shutdown_write_unblocks_peer_without_closing() {
    let (server_end, client_end) = connected_pair().await;

    client_end.shutdown(Shutdown::Write).unwrap();

    // the peer's blocking recv observes end-of-stream
    let mut buf = [0u8; 64];
    assert_eq!(server_end.recv(&mut buf).await.unwrap(), 0);

    // the other direction stays open
    let n = server_end.send(b"reply").await.unwrap();
    assert!(n > 0);
    let received = client_end.recv(&mut buf).await.unwrap();
    assert_eq!(&buf[..received], &b"reply"[..received]);
}

#[tokio::test]
async fn test_socket_options_smoke() {
    ensure_net();
    let socket = Socket::new(AddrFamily::Ipv4).unwrap();
    socket.set_reuse_addr(true).unwrap();
    #[cfg(unix)]
    socket.set_reuse_port(true).unwrap();

    let (_server_end, client_end) = connected_pair().await;
    client_end.set_linger(true, 5).unwrap();
    client_end.set_linger(false, 0).unwrap();
}

#[tokio::test]
async fn test_blocking_toggle_directions() {
    let (_server_end, client_end) = connected_pair().await;

    // still in blocking mode, re-affirming it is a no-op
    client_end.set_blocking(true).unwrap();
    // the guaranteed direction
    client_end.set_blocking(false).unwrap();
}

#[cfg(debug_assertions)]
#[tokio::test]
#[should_panic(expected = "re-enabling blocking mode is not supported")]
async fn test_reenabling_blocking_mode_asserts() {
    let (_server_end, client_end) = connected_pair().await;
    client_end.set_blocking(false).unwrap();
    let _ = client_end.set_blocking(true);
}

#[cfg(debug_assertions)]
#[tokio::test]
#[should_panic(expected = "recv with an empty buffer")]
async fn test_empty_recv_buffer_asserts() {
    let (server_end, _client_end) = connected_pair().await;
    let mut buf = [0u8; 0];
    let _ = server_end.recv(&mut buf).await;
}

#[cfg(debug_assertions)]
#[tokio::test]
#[should_panic(expected = "send with an empty buffer")]
async fn test_empty_send_buffer_asserts() {
    let (_server_end, client_end) = connected_pair().await;
    let _ = client_end.send(&[]).await;
}
