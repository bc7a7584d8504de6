//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and drive it with
//! a `tokio-tungstenite` client, so the bytes genuinely cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use chatterbox_transport::{
        Connection, Transport, TransportError, Upgrade, WebSocketTransport,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    async fn accept_one() -> (
        chatterbox_transport::WebSocketConnection,
        ClientWs,
    ) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();

        let server_handle = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.upgrade().await.expect("should upgrade")
        });
        let client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");
        (server_conn, client_ws)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (server_conn, mut client_ws) = accept_one().await;
        assert!(server_conn.id().into_inner() > 0);

        // --- Server sends a text line, client receives a text frame ---
        server_conn
            .send_text("10:00 AM alice: hi")
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_text().unwrap().as_str(), "10:00 AM alice: hi");

        // --- Client sends, server receives ---
        client_ws
            .send(Message::text("alice".to_string()))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"alice");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_is_pending() {
        // The session loop sits in `recv` the whole time a user is idle.
        // Writes from other tasks must not wait for that read to finish.
        let (server_conn, mut client_ws) = accept_one().await;
        let server_conn = std::sync::Arc::new(server_conn);

        let reader = std::sync::Arc::clone(&server_conn);
        let pending_recv = tokio::spawn(async move { reader.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(
            Duration::from_secs(1),
            server_conn.send_text("still writable"),
        )
        .await
        .expect("send must not block behind recv")
        .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "still writable");

        client_ws.send(Message::Close(None)).await.unwrap();
        let result = pending_recv.await.unwrap().expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (server_conn, mut client_ws) = accept_one().await;

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_bind_in_use_port_fails() {
        let first = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = first.local_addr().unwrap().to_string();

        let second = WebSocketTransport::bind(&addr).await;
        assert!(second.is_err(), "binding a taken port must fail");
    }

    #[tokio::test]
    async fn test_websocket_accept_does_not_wait_for_upgrade() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();

        // A peer that connects and then says nothing at all.
        let _idle = tokio::net::TcpStream::connect(&addr)
            .await
            .expect("raw connect");
        let idle = tokio::time::timeout(Duration::from_secs(1), transport.accept())
            .await
            .expect("accept must return without the upgrade request")
            .expect("should accept");

        // A real client behind it still gets through while the idle
        // upgrade is outstanding.
        let stalled_upgrade = tokio::spawn(idle.upgrade());
        let server = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.upgrade().await.expect("should upgrade")
        });
        let mut client_ws = tokio::time::timeout(Duration::from_secs(2), connect_client(&addr))
            .await
            .expect("second client must connect");
        let server_conn = server.await.expect("task should complete");

        server_conn.send_text("hello").await.expect("send");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "hello");
        assert!(!stalled_upgrade.is_finished());
        stalled_upgrade.abort();
    }

    #[tokio::test]
    async fn test_websocket_accept_after_shutdown_fails() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");

        transport.shutdown().await.expect("shutdown");

        let result = transport.accept().await;
        assert!(matches!(result, Err(TransportError::Shutdown)));
    }
}
