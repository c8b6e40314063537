//! Integration tests for the WebSocket transport: a real server and client
//! exchanging frames over loopback.

use futures_util::{SinkExt, StreamExt};
use greenroom_transport::WsListener;
use tokio_tungstenite::tungstenite::Message;

/// Connects a tokio-tungstenite client to the given address.
async fn connect_client(
    addr: std::net::SocketAddr,
) -> tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
> {
    let url = format!("ws://{addr}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("client should connect");
    ws
}

#[tokio::test]
async fn test_accept_and_send_receive() {
    // "127.0.0.1:0" lets the OS pick a free port; local_addr tells the
    // client where to go.
    let listener = WsListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("should have local addr");

    let server_handle =
        tokio::spawn(async move { listener.accept().await.expect("should accept") });

    let mut client_ws = connect_client(addr).await;
    let server_conn = server_handle.await.expect("task should complete");

    assert!(server_conn.id().into_inner() > 0);

    // Server → client.
    server_conn
        .send(b"hello from server")
        .await
        .expect("send should succeed");
    let msg = client_ws.next().await.unwrap().unwrap();
    assert_eq!(msg.into_data().as_ref(), b"hello from server");

    // Client → server.
    client_ws
        .send(Message::Binary(b"hello from client".to_vec().into()))
        .await
        .unwrap();
    let received = server_conn
        .recv()
        .await
        .expect("recv should succeed")
        .expect("should have data");
    assert_eq!(received, b"hello from client");

    server_conn.close().await.expect("close should succeed");
}

#[tokio::test]
async fn test_recv_returns_none_on_client_close() {
    let listener = WsListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("should have local addr");

    let server_handle =
        tokio::spawn(async move { listener.accept().await.expect("should accept") });

    let mut client_ws = connect_client(addr).await;
    let server_conn = server_handle.await.unwrap();

    client_ws.send(Message::Close(None)).await.unwrap();

    let result = server_conn.recv().await.expect("recv should not error");
    assert!(result.is_none(), "should return None on client close");
}

#[tokio::test]
async fn test_send_while_recv_pending_does_not_block() {
    // The read loop parks in recv() while another task pushes a frame out.
    // With a single whole-socket lock this would deadlock; the split
    // halves make it safe.
    let listener = WsListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("should have local addr");

    let server_handle =
        tokio::spawn(async move { listener.accept().await.expect("should accept") });

    let mut client_ws = connect_client(addr).await;
    let server_conn = std::sync::Arc::new(server_handle.await.unwrap());

    // Park a reader on the server connection.
    let reader = {
        let conn = std::sync::Arc::clone(&server_conn);
        tokio::spawn(async move { conn.recv().await })
    };

    // Push from the server side while the reader is pending.
    server_conn.send(b"push").await.expect("send should succeed");
    let msg = client_ws.next().await.unwrap().unwrap();
    assert_eq!(msg.into_data().as_ref(), b"push");

    // Now satisfy the reader.
    client_ws
        .send(Message::Binary(b"reply".to_vec().into()))
        .await
        .unwrap();
    let received = reader.await.unwrap().unwrap().unwrap();
    assert_eq!(received, b"reply");
}
