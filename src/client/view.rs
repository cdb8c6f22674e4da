use chrono::Utc;
use uuid::Uuid;

use super::GroupSnapshot;
use super::transcript::ChatTranscript;
use crate::models::{Group, Member, PriceError, UpdatePriceRequest, check_price_proposal};
use crate::realtime::events::GUEST_SENDER_ID;
use crate::realtime::{ChatPayload, ClientEvent, RoomNotice, ServerEvent};

/// 当前查看群组的人；游客没有 `user_id`
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub user_id: Option<i64>,
    pub name: String,
}

impl Viewer {
    pub fn sender_id(&self) -> String {
        match self.user_id {
            Some(id) => id.to_string(),
            None => GUEST_SENDER_ID.to_string(),
        }
    }
}

/// 处理一条服务端事件后需要调用方做的事
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// 重新拉取群组详情和成员列表
    Resync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    Join,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpHandle(u64);

#[derive(Debug, Clone)]
struct Pending {
    handle: OpHandle,
    op: PendingOp,
    // 加入时先放一个占位成员，id 为负数
    placeholder: Option<Member>,
}

/// 单个群组页面的本地状态。
///
/// `confirmed` 是最近一次快照（加上已确认的操作），对外看到的 `members`
/// 总是 `confirmed` 再叠加仍未完成的乐观操作。
#[derive(Debug)]
pub struct GroupView {
    group_id: i64,
    viewer: Viewer,
    group: Option<Group>,
    confirmed: Vec<Member>,
    members: Vec<Member>,
    pending: Vec<Pending>,
    next_handle: u64,
    transcript: ChatTranscript,
}

impl GroupView {
    pub fn new(group_id: i64, viewer: Viewer) -> Self {
        Self {
            group_id,
            viewer,
            group: None,
            confirmed: Vec::new(),
            members: Vec::new(),
            pending: Vec::new(),
            next_handle: 1,
            transcript: ChatTranscript::new(),
        }
    }

    pub fn group_id(&self) -> i64 {
        self.group_id
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// 人数取本地成员列表（含乐观操作），与列表始终一致
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn join_event(&self) -> ClientEvent {
        ClientEvent::JoinGroup(self.room_notice())
    }

    pub fn leave_event(&self) -> ClientEvent {
        ClientEvent::LeaveGroup(self.room_notice())
    }

    fn room_notice(&self) -> RoomNotice {
        RoomNotice {
            group_id: self.group_id,
            user_name: self.viewer.name.clone(),
        }
    }

    pub fn apply_event(&mut self, event: &ServerEvent) -> Effect {
        match event {
            ServerEvent::UserJoined(n) => {
                self.transcript
                    .push_system(format!("{} joined the group", n.user_name));
                Effect::Resync
            }
            ServerEvent::UserLeft(n) => {
                self.transcript
                    .push_system(format!("{} left the group", n.user_name));
                Effect::Resync
            }
            ServerEvent::ChatMessage(payload) => {
                if payload.group_id == self.group_id {
                    self.transcript.push_message(payload.clone());
                }
                Effect::None
            }
            ServerEvent::PriceChanged(notice) => {
                if notice.group_id != self.group_id {
                    return Effect::None;
                }
                if !notice.message.is_empty() {
                    self.transcript.push_system(notice.message.clone());
                }
                Effect::Resync
            }
            ServerEvent::Error { message } => {
                tracing::warn!("Relay rejected an event: {}", message);
                Effect::None
            }
            structural if structural.is_structural() => {
                if structural.group_id() == Some(self.group_id) {
                    Effect::Resync
                } else {
                    Effect::None
                }
            }
            _ => Effect::None,
        }
    }

    /// 整体替换本地状态，然后重新叠加未完成的乐观操作
    pub fn apply_snapshot(&mut self, snapshot: GroupSnapshot) {
        if snapshot.group.id != self.group_id {
            tracing::debug!(
                "Ignoring snapshot of group {} in view of group {}",
                snapshot.group.id,
                self.group_id
            );
            return;
        }
        self.group = Some(snapshot.group);
        self.confirmed = snapshot.members;
        self.rebuild();
    }

    /// 生成聊天消息并先追加到本地，返回需要发出的事件；空消息返回 None
    pub fn compose_message(&mut self, text: &str, now_ms: i64) -> Option<ClientEvent> {
        if text.trim().is_empty() {
            return None;
        }
        let sender_id = self.viewer.sender_id();
        let nonce = Uuid::new_v4().simple().to_string();
        let payload = ChatPayload {
            group_id: self.group_id,
            message: text.to_string(),
            user_name: self.viewer.name.clone(),
            client_id: Some(format!("{}_{}_{}", sender_id, now_ms, &nonce[..6])),
            sender_id,
            timestamp: now_ms,
        };
        self.transcript.push_message(payload.clone());
        Some(ClientEvent::ChatMessage(payload))
    }

    /// 本地先校验报价；还没拿到群组时只校验数值本身，由服务端做最终比较
    pub fn propose_price(&self, proposed: f64) -> Result<UpdatePriceRequest, PriceError> {
        let current = self
            .group
            .as_ref()
            .map(|g| g.total_cost)
            .unwrap_or(f64::INFINITY);
        check_price_proposal(current, proposed)?;
        Ok(UpdatePriceRequest {
            total_cost: proposed,
        })
    }

    pub fn begin(&mut self, op: PendingOp) -> OpHandle {
        let handle = OpHandle(self.next_handle);
        self.next_handle += 1;

        let placeholder = match op {
            PendingOp::Join => Some(Member {
                id: -(handle.0 as i64),
                group_id: self.group_id,
                member_name: self.viewer.name.clone(),
                member_email: None,
                user_id: self.viewer.user_id,
                contribution: 0.0,
                joined_at: Utc::now(),
            }),
            PendingOp::Leave => None,
        };

        self.pending.push(Pending {
            handle,
            op,
            placeholder,
        });
        self.rebuild();
        handle
    }

    /// 成功则把操作并入已确认状态，失败则回滚；未知句柄返回 false
    pub fn settle<E>(&mut self, handle: OpHandle, outcome: Result<(), E>) -> bool {
        let Some(pos) = self.pending.iter().position(|p| p.handle == handle) else {
            return false;
        };
        let pending = self.pending.remove(pos);
        if outcome.is_ok() {
            let mut confirmed = std::mem::take(&mut self.confirmed);
            self.overlay(&mut confirmed, &pending);
            self.confirmed = confirmed;
        }
        self.rebuild();
        true
    }

    fn rebuild(&mut self) {
        let mut members = self.confirmed.clone();
        for pending in &self.pending {
            self.overlay(&mut members, pending);
        }
        self.members = members;
    }

    fn overlay(&self, members: &mut Vec<Member>, pending: &Pending) {
        match pending.op {
            PendingOp::Join => {
                let already_in = self
                    .viewer
                    .user_id
                    .is_some_and(|uid| members.iter().any(|m| m.user_id == Some(uid)));
                if !already_in {
                    if let Some(placeholder) = &pending.placeholder {
                        members.push(placeholder.clone());
                    }
                }
            }
            PendingOp::Leave => match self.viewer.user_id {
                Some(uid) => members.retain(|m| m.user_id != Some(uid)),
                // 游客没有身份，只能撤掉自己的占位
                None => members.retain(|m| m.id >= 0),
            },
        }
    }
}
