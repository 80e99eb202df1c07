//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real listener on an OS-assigned port and drive it
//! with a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use rampart_transport::{
        Connection, Transport, TransportError, WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0, connects one client, and returns both ends.
    async fn pair() -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (conn, mut client) = pair().await;
        assert!(conn.id().into_inner() > 0);

        conn.send(b"hello from server").await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        let received = conn.recv().await.expect("recv").expect("data");
        assert_eq!(received, b"hello from client");

        conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        // A reader parked in recv() must not block the writer.
        let (conn, mut client) = pair().await;
        let conn = Arc::new(conn);

        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), conn.send(b"ping"))
            .await
            .expect("send must not wait on the reader")
            .expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping");

        client.send(Message::Close(None)).await.unwrap();
        let result = reader.await.unwrap().expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (conn, mut client) = pair().await;

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_close_twice_is_ok() {
        let (conn, _client) = pair().await;
        conn.close().await.expect("first close");
        conn.close().await.expect("second close is a no-op");
    }

    #[tokio::test]
    async fn test_upgrade_silent_client_times_out() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_handshake_timeout(Duration::from_millis(100));
        let addr = transport.local_addr().expect("local addr");

        let _silent = tokio::net::TcpStream::connect(addr).await.expect("tcp connect");
        let pending = transport.accept_pending().await.expect("tcp accept");
        let result = pending.upgrade().await;

        assert!(matches!(result, Err(TransportError::HandshakeTimedOut(_))));
    }

    #[tokio::test]
    async fn test_accept_pending_does_not_wait_for_upgrade() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let _silent = tokio::net::TcpStream::connect(addr).await.expect("tcp connect");
        let stalled = tokio::time::timeout(Duration::from_secs(2), transport.accept_pending())
            .await
            .expect("raw accept should not wait for the upgrade")
            .expect("tcp accept");
        let _parked = tokio::spawn(stalled.upgrade());

        let client = tokio::spawn(async move {
            tokio_tungstenite::connect_async(format!("ws://{addr}")).await
        });
        let honest = transport.accept_pending().await.expect("tcp accept");
        let conn = tokio::time::timeout(Duration::from_secs(2), honest.upgrade())
            .await
            .expect("honest upgrade should not queue behind the silent one")
            .expect("upgrade");
        assert!(conn.id().into_inner() > 0);
        assert!(client.await.unwrap().is_ok());
    }
}
