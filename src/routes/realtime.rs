use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use crate::AppState;
use crate::realtime::{ClientEvent, RelayHub, ServerEvent};

/// `GET /ws`：升级为 WebSocket，由 RelayHub 负责房间与转发
#[axum::debug_handler]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.relay.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: RelayHub) {
    let (mut sink, mut stream) = socket.split();
    let (session, mut outbox) = hub.connect().await;

    // 写任务：把会话队列里的事件序列化后发出去
    let writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode {}: {}", event.name(), e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("Session {} read error: {}", session, e);
                break;
            }
        };

        match frame {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => hub.receive(session, event).await,
                Err(e) => {
                    tracing::debug!("Session {} sent an unreadable event: {}", session, e);
                    hub.send_to(
                        session,
                        ServerEvent::Error {
                            message: format!("Invalid event: {}", e),
                        },
                    )
                    .await;
                }
            },
            Message::Close(_) => break,
            // ping/pong 由底层自动处理，二进制帧不支持
            _ => {}
        }
    }

    hub.disconnect(session).await;
    writer.abort();
}
