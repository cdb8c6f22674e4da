use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use super::events::{ClientEvent, ServerEvent};
use super::registry::{RoomRegistry, SessionId};
use super::relay::{self, Outbound};

/// 房间注册表 + 每个会话的发送队列，随服务进程创建
#[derive(Clone)]
pub struct RelayHub {
    inner: Arc<Mutex<HubState>>,
    buffer: usize,
}

struct HubState {
    rooms: RoomRegistry,
    links: HashMap<SessionId, mpsc::Sender<ServerEvent>>,
}

impl HubState {
    // 尽力投递：队列满或连接已断就直接丢弃
    fn deliver(&self, outbound: Vec<Outbound>) {
        for Outbound { recipients, event } in outbound {
            for session in recipients {
                let Some(link) = self.links.get(&session) else {
                    continue;
                };
                match link.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            "Dropping {} for slow session {}",
                            event.name(),
                            session
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::debug!("Session {} already closed", session);
                    }
                }
            }
        }
    }
}

impl RelayHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubState {
                rooms: RoomRegistry::new(),
                links: HashMap::new(),
            })),
            buffer: buffer.max(1),
        }
    }

    /// 新连接：分配会话ID和发送队列
    pub async fn connect(&self) -> (SessionId, mpsc::Receiver<ServerEvent>) {
        let session = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer);
        self.inner.lock().await.links.insert(session, tx);
        tracing::debug!("Relay session {} connected", session);
        (session, rx)
    }

    pub async fn receive(&self, session: SessionId, event: ClientEvent) {
        let mut state = self.inner.lock().await;
        let outbound = relay::handle(&mut state.rooms, session, event);
        state.deliver(outbound);
    }

    /// 只发给某一个会话（例如解析失败的错误提示）
    pub async fn send_to(&self, session: SessionId, event: ServerEvent) {
        let state = self.inner.lock().await;
        state.deliver(vec![Outbound {
            recipients: vec![session],
            event,
        }]);
    }

    pub async fn disconnect(&self, session: SessionId) {
        let mut state = self.inner.lock().await;
        let outbound = relay::disconnect(&mut state.rooms, session);
        state.links.remove(&session);
        state.deliver(outbound);
        tracing::debug!("Relay session {} disconnected", session);
    }

    /// 服务端主动向房间广播
    pub async fn publish(&self, group_id: i64, event: ServerEvent) {
        let state = self.inner.lock().await;
        if let Some(outbound) = relay::publish(&state.rooms, group_id, event) {
            state.deliver(vec![outbound]);
        }
    }

    pub async fn room_size(&self, group_id: i64) -> usize {
        self.inner.lock().await.rooms.room_size(group_id)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.links.len()
    }
}
