//! 实时通道的事件定义。
//!
//! 帧格式为 JSON 文本：`{"event": "<name>", "data": {...}}`。除路由用的
//! `groupId` 外，负载字段缺失时取默认值，中继不做进一步校验。

use serde::{Deserialize, Serialize};

use crate::utils::serde_helpers::flexible_id;

/// 游客发送聊天消息时使用的 `senderId`
pub const GUEST_SENDER_ID: &str = "guest";

/// 加入/离开房间的声明，显示名不做校验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomNotice {
    #[serde(with = "flexible_id")]
    pub group_id: i64,
    #[serde(default)]
    pub user_name: String,
}

/// 聊天消息，原样转发
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(with = "flexible_id")]
    pub group_id: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub sender_id: String,
    /// 客户端生成的毫秒时间戳
    #[serde(default)]
    pub timestamp: i64,
    /// 幂等令牌，旧版本客户端可能不带
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceNotice {
    #[serde(with = "flexible_id")]
    pub group_id: i64,
    #[serde(default)]
    pub message: String,
}

/// 只携带路由键的结构变更通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    #[serde(with = "flexible_id")]
    pub group_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotice {
    pub user_name: String,
}

/// 客户端发往服务端的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinGroup(RoomNotice),
    LeaveGroup(RoomNotice),
    ChatMessage(ChatPayload),
    #[serde(rename = "priceChanged")]
    PriceChanged(PriceNotice),
    MemberAdded(GroupRef),
    MemberLeft(GroupRef),
    MemberRemoved(GroupRef),
    GroupCountUpdated(GroupRef),
}

/// 服务端推送给房间内会话的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    UserJoined(UserNotice),
    UserLeft(UserNotice),
    ChatMessage(ChatPayload),
    #[serde(rename = "priceChanged")]
    PriceChanged(PriceNotice),
    MemberAdded(GroupRef),
    MemberLeft(GroupRef),
    MemberRemoved(GroupRef),
    GroupCountUpdated(GroupRef),
    Error { message: String },
}

impl ServerEvent {
    /// 结构变更通知：收到后客户端应重新拉取群组和成员
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ServerEvent::MemberAdded(_)
                | ServerEvent::MemberLeft(_)
                | ServerEvent::MemberRemoved(_)
                | ServerEvent::GroupCountUpdated(_)
        )
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            ServerEvent::ChatMessage(p) => Some(p.group_id),
            ServerEvent::PriceChanged(p) => Some(p.group_id),
            ServerEvent::MemberAdded(r)
            | ServerEvent::MemberLeft(r)
            | ServerEvent::MemberRemoved(r)
            | ServerEvent::GroupCountUpdated(r) => Some(r.group_id),
            ServerEvent::UserJoined(_) | ServerEvent::UserLeft(_) | ServerEvent::Error { .. } => {
                None
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::UserJoined(_) => "user-joined",
            ServerEvent::UserLeft(_) => "user-left",
            ServerEvent::ChatMessage(_) => "chat-message",
            ServerEvent::PriceChanged(_) => "priceChanged",
            ServerEvent::MemberAdded(_) => "member-added",
            ServerEvent::MemberLeft(_) => "member-left",
            ServerEvent::MemberRemoved(_) => "member-removed",
            ServerEvent::GroupCountUpdated(_) => "group-count-updated",
            ServerEvent::Error { .. } => "error",
        }
    }
}
