use crate::realtime::ChatPayload;

// 无令牌消息按时间戳判重的窗口（毫秒）
const FALLBACK_WINDOW_MS: i64 = 2000;

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    Chat(ChatPayload),
    /// 加入/离开、价格变化等系统提示
    System(String),
}

/// 单个群组页面的聊天记录，按到达顺序追加，不回填历史
#[derive(Debug, Default, Clone)]
pub struct ChatTranscript {
    entries: Vec<TranscriptEntry>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条聊天消息；判定为重复时丢弃并返回 false
    pub fn push_message(&mut self, payload: ChatPayload) -> bool {
        if self.is_duplicate(&payload) {
            tracing::debug!(
                "Dropping duplicate chat message from {} in group {}",
                payload.sender_id,
                payload.group_id
            );
            return false;
        }
        self.entries.push(TranscriptEntry::Chat(payload));
        true
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry::System(text.into()));
    }

    fn is_duplicate(&self, incoming: &ChatPayload) -> bool {
        // 空令牌视同无令牌
        match incoming.client_id.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => self.chats().any(|m| m.client_id.as_deref() == Some(token)),
            None => self.chats().any(|m| {
                m.sender_id == incoming.sender_id
                    && m.message == incoming.message
                    && (m.timestamp - incoming.timestamp).abs() < FALLBACK_WINDOW_MS
            }),
        }
    }

    fn chats(&self) -> impl Iterator<Item = &ChatPayload> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::Chat(m) => Some(m),
            TranscriptEntry::System(_) => None,
        })
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
