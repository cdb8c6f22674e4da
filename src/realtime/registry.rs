use std::collections::HashMap;

use uuid::Uuid;

pub type SessionId = Uuid;

/// 会话在房间中的席位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub group_id: i64,
    pub user_name: String,
}

/// 会话 -> 房间 的映射，一个会话同时只能在一个房间
#[derive(Debug, Default)]
pub struct RoomRegistry {
    seats: HashMap<SessionId, Seat>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入座，返回之前的席位（后写入者生效）
    pub fn join(&mut self, session: SessionId, group_id: i64, user_name: &str) -> Option<Seat> {
        self.seats.insert(
            session,
            Seat {
                group_id,
                user_name: user_name.to_string(),
            },
        )
    }

    /// 只有当前确实坐在 `group_id` 时才离座
    pub fn leave(&mut self, session: SessionId, group_id: i64) -> Option<Seat> {
        match self.seats.get(&session) {
            Some(seat) if seat.group_id == group_id => self.seats.remove(&session),
            _ => None,
        }
    }

    /// 连接断开时清理
    pub fn vacate(&mut self, session: SessionId) -> Option<Seat> {
        self.seats.remove(&session)
    }

    pub fn seat(&self, session: SessionId) -> Option<&Seat> {
        self.seats.get(&session)
    }

    pub fn sessions_in(&self, group_id: i64) -> Vec<SessionId> {
        let mut sessions: Vec<SessionId> = self
            .seats
            .iter()
            .filter(|(_, seat)| seat.group_id == group_id)
            .map(|(session, _)| *session)
            .collect();
        sessions.sort();
        sessions
    }

    pub fn room_size(&self, group_id: i64) -> usize {
        self.seats
            .values()
            .filter(|seat| seat.group_id == group_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}
