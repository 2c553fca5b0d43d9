use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::connection_manager::ConnectionHandle;
use crate::metrics::WsMessageMetrics;
use crate::presence::{EventOutcome, PresenceHub};
use crate::server::AppState;

use super::message::{ClientMessage, ServerMessage};

const RATE_LIMIT_MESSAGE: &str = "Too many connections";

/// Why the socket loop ended
const REASON_CLIENT_CLOSE: &str = "client namespace disconnect";
const REASON_TRANSPORT_CLOSE: &str = "transport close";
const REASON_TRANSPORT_ERROR: &str = "transport error";
const REASON_SERVER_CLOSE: &str = "server namespace disconnect";

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip_all, fields(origin = %addr.ip()))]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (tx, rx) = mpsc::channel::<ServerMessage>(state.settings.websocket.channel_buffer_size);

    let handle = match state.hub.connect(addr.ip(), tx) {
        Ok(h) => h,
        Err(_) => {
            let (mut ws_sender, _) = socket.split();
            reject_connection(&mut ws_sender).await;
            return;
        }
    };
    let connection_id = handle.id;

    // Split socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let hello = ServerMessage::Connected {
        socket_id: connection_id.to_string(),
    };
    if !write_message(&mut ws_sender, &hello).await {
        state.hub.disconnect(&handle, REASON_TRANSPORT_CLOSE).await;
        return;
    }

    // Task for sending messages from channel to WebSocket
    let mut send_task = tokio::spawn(run_writer(ws_sender, rx, handle.clone()));

    // Task for receiving messages from WebSocket
    let hub = state.hub.clone();
    let reader_handle = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if let Some(reason) = process_message(msg, &hub, &reader_handle).await {
                        return reason;
                    }
                }
                Err(e) => {
                    hub.transport_error(&reader_handle, &e.to_string());
                    return REASON_TRANSPORT_ERROR.to_string();
                }
            }
        }
        REASON_TRANSPORT_CLOSE.to_string()
    });

    // Wait for either task to complete
    let reason = tokio::select! {
        result = &mut send_task => {
            recv_task.abort();
            result.unwrap_or_else(|_| REASON_TRANSPORT_CLOSE.to_string())
        }
        result = &mut recv_task => {
            send_task.abort();
            result.unwrap_or_else(|_| REASON_TRANSPORT_CLOSE.to_string())
        }
    };

    tracing::debug!(connection_id = %connection_id, reason = %reason, "Socket loop finished");
    state.hub.disconnect(&handle, &reason).await;
}

/// Tell a connection refused by the rate limiter why, then close it.
async fn reject_connection<S>(sink: &mut S)
where
    S: Sink<Message> + Unpin,
{
    let notice = ServerMessage::RateLimitExceeded(RATE_LIMIT_MESSAGE.to_string());
    if write_message(sink, &notice).await {
        let _ = sink.send(Message::Close(None)).await;
    }
    let _ = sink.close().await;
}

/// Drain the outbound queue into the socket until the transport goes away
/// or the connection is force-closed.
///
/// On a forced close everything already queued is flushed first, then the
/// close notice, then a close frame. Returns the disconnect reason.
async fn run_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<ServerMessage>,
    handle: Arc<ConnectionHandle>,
) -> String
where
    S: Sink<Message> + Unpin,
{
    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                if !write_message(&mut sink, &msg).await {
                    return REASON_TRANSPORT_CLOSE.to_string();
                }
            }
            _ = handle.closed() => {
                let mut open = true;
                while let Ok(msg) = rx.try_recv() {
                    if !write_message(&mut sink, &msg).await {
                        open = false;
                        break;
                    }
                }
                if open {
                    if let Some(notice) = handle.close_notice() {
                        open = write_message(&mut sink, notice).await;
                    }
                }
                if open {
                    let _ = sink.send(Message::Close(None)).await;
                }
                let _ = sink.close().await;
                return REASON_SERVER_CLOSE.to_string();
            }
        }
    }
    REASON_TRANSPORT_CLOSE.to_string()
}

async fn write_message<S>(ws_sender: &mut S, msg: &ServerMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(msg) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            return true;
        }
    };
    ws_sender.send(Message::Text(text.into())).await.is_ok()
}

/// Process a received WebSocket frame.
/// Returns the disconnect reason if the connection should be closed.
async fn process_message(
    msg: Message,
    hub: &PresenceHub,
    handle: &Arc<ConnectionHandle>,
) -> Option<String> {
    match msg {
        Message::Text(text) => {
            let client_msg: ClientMessage = match serde_json::from_str(&text) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %handle.id,
                        code = "INVALID_MESSAGE",
                        error = %e,
                        "Failed to parse client message"
                    );
                    WsMessageMetrics::record_invalid();
                    WsMessageMetrics::record_error("INVALID_MESSAGE");
                    let _ = handle.send(ServerMessage::error(e.to_string())).await;
                    return None;
                }
            };

            match hub.handle_event(handle, client_msg).await {
                EventOutcome::Continue => None,
                EventOutcome::Disconnect(reason) if reason.is_empty() => {
                    Some(REASON_CLIENT_CLOSE.to_string())
                }
                EventOutcome::Disconnect(reason) => Some(reason),
            }
        }
        Message::Binary(_) => {
            tracing::debug!(connection_id = %handle.id, code = "UNSUPPORTED_FORMAT", "Binary frame rejected");
            WsMessageMetrics::record_invalid();
            WsMessageMetrics::record_error("UNSUPPORTED_FORMAT");
            let _ = handle
                .send(ServerMessage::error("Binary messages are not supported"))
                .await;
            None
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => None,
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Received close frame");
            Some(REASON_CLIENT_CLOSE.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresenceConfig;
    use crate::connection_manager::ConnectionManager;
    use crate::store::MemoryStore;
    use futures::channel::mpsc as frame_channel;
    use std::net::{IpAddr, Ipv4Addr};

    fn hub() -> PresenceHub {
        PresenceHub::new(
            &PresenceConfig::default(),
            Arc::new(ConnectionManager::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection_open() {
        let hub = hub();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = hub.connect(IpAddr::V4(Ipv4Addr::LOCALHOST), tx).unwrap();

        let outcome = process_message(Message::Text("{not json".into()), &hub, &handle).await;
        assert!(outcome.is_none());
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Error(ref message)) if !message.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_close_frame_ends_loop() {
        let hub = hub();
        let (tx, _rx) = mpsc::channel(8);
        let handle = hub.connect(IpAddr::V4(Ipv4Addr::LOCALHOST), tx).unwrap();

        let outcome = process_message(Message::Close(None), &hub, &handle).await;
        assert_eq!(outcome.as_deref(), Some(REASON_CLIENT_CLOSE));
    }

    #[tokio::test]
    async fn test_disconnect_event_carries_reason() {
        let hub = hub();
        let (tx, _rx) = mpsc::channel(8);
        let handle = hub.connect(IpAddr::V4(Ipv4Addr::LOCALHOST), tx).unwrap();

        let frame = r#"{"event":"disconnect","data":"ping timeout"}"#;
        let outcome = process_message(Message::Text(frame.into()), &hub, &handle).await;
        assert_eq!(outcome.as_deref(), Some("ping timeout"));
    }

    fn decode(frame: &Message) -> ServerMessage {
        match frame {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_binary_frame_reports_error() {
        let hub = hub();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = hub.connect(IpAddr::V4(Ipv4Addr::LOCALHOST), tx).unwrap();

        let outcome = process_message(Message::Binary(vec![1, 2, 3].into()), &hub, &handle).await;
        assert!(outcome.is_none());
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Error(ref message)) if message == "Binary messages are not supported"
        ));
    }

    #[tokio::test]
    async fn test_rejected_connection_gets_notice_then_close() {
        let (mut sink, frames) = frame_channel::unbounded::<Message>();
        reject_connection(&mut sink).await;
        drop(sink);

        let frames: Vec<Message> = frames.collect().await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(
            decode(&frames[0]),
            ServerMessage::RateLimitExceeded(ref m) if m == RATE_LIMIT_MESSAGE
        ));
        assert!(matches!(frames[1], Message::Close(None)));
    }

    #[tokio::test]
    async fn test_writer_flushes_queue_before_force_disconnect() {
        let (sink, frames) = frame_channel::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);
        let handle = Arc::new(ConnectionHandle::new(IpAddr::V4(Ipv4Addr::LOCALHOST), tx));

        assert!(handle.try_deliver(ServerMessage::error("first")));
        assert!(handle.try_deliver(ServerMessage::error("second")));
        handle.force_close(ServerMessage::ForceDisconnect("New connection established".into()));

        let reason = run_writer(sink, rx, handle.clone()).await;
        assert_eq!(reason, REASON_SERVER_CLOSE);

        let frames: Vec<Message> = frames.collect().await;
        assert_eq!(frames.len(), 4);
        assert!(matches!(decode(&frames[0]), ServerMessage::Error(ref m) if m == "first"));
        assert!(matches!(decode(&frames[1]), ServerMessage::Error(ref m) if m == "second"));
        assert!(matches!(
            decode(&frames[2]),
            ServerMessage::ForceDisconnect(ref m) if m == "New connection established"
        ));
        assert!(matches!(frames[3], Message::Close(None)));
    }

    #[tokio::test]
    async fn test_writer_delivers_force_disconnect_when_queue_full() {
        let (sink, frames) = frame_channel::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(1);
        let handle = Arc::new(ConnectionHandle::new(IpAddr::V4(Ipv4Addr::LOCALHOST), tx));

        assert!(handle.try_deliver(ServerMessage::error("backlog")));
        assert!(!handle.try_deliver(ServerMessage::error("dropped")));
        handle.force_close(ServerMessage::ForceDisconnect("New connection established".into()));

        let reason = run_writer(sink, rx, handle).await;
        assert_eq!(reason, REASON_SERVER_CLOSE);

        let frames: Vec<Message> = frames.collect().await;
        assert_eq!(frames.len(), 3);
        assert!(matches!(decode(&frames[0]), ServerMessage::Error(ref m) if m == "backlog"));
        assert!(matches!(decode(&frames[1]), ServerMessage::ForceDisconnect(_)));
        assert!(matches!(frames[2], Message::Close(None)));
    }

    #[tokio::test]
    async fn test_writer_stops_when_transport_is_gone() {
        let (sink, frames) = frame_channel::unbounded::<Message>();
        drop(frames);
        let (tx, rx) = mpsc::channel(8);
        let handle = Arc::new(ConnectionHandle::new(IpAddr::V4(Ipv4Addr::LOCALHOST), tx));

        assert!(handle.try_deliver(ServerMessage::error("lost")));
        let reason = run_writer(sink, rx, handle).await;
        assert_eq!(reason, REASON_TRANSPORT_CLOSE);
    }
}
