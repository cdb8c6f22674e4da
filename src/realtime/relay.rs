//! 事件中继。
//!
//! 这里的函数都是纯函数：输入（注册表，会话，事件），修改注册表并返回需要
//! 投递的消息列表，真正的网络发送由 [`super::RelayHub`] 完成。转发不去重、
//! 不限流、不校验发送者身份，也不保存历史。

use super::events::{ClientEvent, ServerEvent, UserNotice};
use super::registry::{RoomRegistry, SessionId};

/// 一条待投递的事件及其接收者
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipients: Vec<SessionId>,
    pub event: ServerEvent,
}

fn to_room(rooms: &RoomRegistry, group_id: i64, event: ServerEvent) -> Option<Outbound> {
    let recipients = rooms.sessions_in(group_id);
    if recipients.is_empty() {
        return None;
    }
    Some(Outbound { recipients, event })
}

fn left_notice(user_name: String) -> ServerEvent {
    ServerEvent::UserLeft(UserNotice { user_name })
}

/// 处理客户端发来的一条事件
pub fn handle(rooms: &mut RoomRegistry, session: SessionId, event: ClientEvent) -> Vec<Outbound> {
    let mut outbound = Vec::new();

    match event {
        ClientEvent::JoinGroup(notice) => {
            let previous = rooms.join(session, notice.group_id, &notice.user_name);
            match previous {
                // 同一房间同一名字重复加入，不再广播
                Some(seat)
                    if seat.group_id == notice.group_id && seat.user_name == notice.user_name =>
                {
                    return outbound;
                }
                Some(seat) if seat.group_id != notice.group_id => {
                    outbound.extend(to_room(rooms, seat.group_id, left_notice(seat.user_name)));
                }
                _ => {}
            }
            // 加入通知包含发送者本人
            outbound.extend(to_room(
                rooms,
                notice.group_id,
                ServerEvent::UserJoined(UserNotice {
                    user_name: notice.user_name,
                }),
            ));
        }
        ClientEvent::LeaveGroup(notice) => {
            if rooms.leave(session, notice.group_id).is_some() {
                outbound.extend(to_room(rooms, notice.group_id, left_notice(notice.user_name)));
            } else {
                tracing::debug!(
                    "Session {} asked to leave group {} it is not seated in",
                    session,
                    notice.group_id
                );
            }
        }
        ClientEvent::ChatMessage(payload) => {
            let group_id = payload.group_id;
            outbound.extend(to_room(rooms, group_id, ServerEvent::ChatMessage(payload)));
        }
        ClientEvent::PriceChanged(notice) => {
            let group_id = notice.group_id;
            outbound.extend(to_room(rooms, group_id, ServerEvent::PriceChanged(notice)));
        }
        ClientEvent::MemberAdded(group) => {
            outbound.extend(to_room(rooms, group.group_id, ServerEvent::MemberAdded(group)));
        }
        ClientEvent::MemberLeft(group) => {
            outbound.extend(to_room(rooms, group.group_id, ServerEvent::MemberLeft(group)));
        }
        ClientEvent::MemberRemoved(group) => {
            outbound.extend(to_room(rooms, group.group_id, ServerEvent::MemberRemoved(group)));
        }
        ClientEvent::GroupCountUpdated(group) => {
            outbound.extend(to_room(
                rooms,
                group.group_id,
                ServerEvent::GroupCountUpdated(group),
            ));
        }
    }

    outbound
}

/// 连接断开：如果还在房间里，以登记的名字广播离开
pub fn disconnect(rooms: &mut RoomRegistry, session: SessionId) -> Vec<Outbound> {
    match rooms.vacate(session) {
        Some(seat) => to_room(rooms, seat.group_id, left_notice(seat.user_name))
            .into_iter()
            .collect(),
        None => Vec::new(),
    }
}

/// 服务端主动推送（HTTP 变更之后）
pub fn publish(rooms: &RoomRegistry, group_id: i64, event: ServerEvent) -> Option<Outbound> {
    to_room(rooms, group_id, event)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::realtime::events::{ChatPayload, GroupRef, RoomNotice};

    fn join(group_id: i64, name: &str) -> ClientEvent {
        ClientEvent::JoinGroup(RoomNotice {
            group_id,
            user_name: name.to_string(),
        })
    }

    fn chat(group_id: i64, body: &str) -> ChatPayload {
        ChatPayload {
            group_id,
            message: body.to_string(),
            user_name: "Asha".into(),
            sender_id: "1".into(),
            timestamp: 1_700_000_000_000,
            client_id: Some("1_1700000000000_abc123".into()),
        }
    }

    fn sorted(mut sessions: Vec<SessionId>) -> Vec<SessionId> {
        sessions.sort();
        sessions
    }

    #[test]
    fn join_notifies_whole_room_including_joiner() {
        let mut rooms = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        handle(&mut rooms, a, join(1, "Asha"));
        let out = handle(&mut rooms, b, join(1, "Bilal"));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipients, sorted(vec![a, b]));
        assert_eq!(
            out[0].event,
            ServerEvent::UserJoined(UserNotice {
                user_name: "Bilal".into()
            })
        );
    }

    #[test]
    fn repeated_join_is_silent() {
        let mut rooms = RoomRegistry::new();
        let a = Uuid::new_v4();
        handle(&mut rooms, a, join(1, "Asha"));
        assert!(handle(&mut rooms, a, join(1, "Asha")).is_empty());
    }

    #[test]
    fn switching_rooms_announces_departure_to_old_room() {
        let mut rooms = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        handle(&mut rooms, a, join(1, "Asha"));
        handle(&mut rooms, b, join(1, "Bilal"));

        let out = handle(&mut rooms, a, join(2, "Asha"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].recipients, vec![b]);
        assert!(matches!(&out[0].event, ServerEvent::UserLeft(n) if n.user_name == "Asha"));
        assert_eq!(out[1].recipients, vec![a]);
        assert!(matches!(&out[1].event, ServerEvent::UserJoined(_)));
    }

    #[test]
    fn chat_is_relayed_verbatim_to_room_including_sender() {
        let mut rooms = RoomRegistry::new();
        let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        handle(&mut rooms, a, join(1, "Asha"));
        handle(&mut rooms, b, join(1, "Bilal"));
        handle(&mut rooms, outsider, join(2, "Chen"));

        let out = handle(&mut rooms, a, ClientEvent::ChatMessage(chat(1, "hi")));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipients, sorted(vec![a, b]));
        assert_eq!(out[0].event, ServerEvent::ChatMessage(chat(1, "hi")));
    }

    #[test]
    fn events_for_empty_rooms_go_nowhere() {
        let mut rooms = RoomRegistry::new();
        let a = Uuid::new_v4();
        let out = handle(
            &mut rooms,
            a,
            ClientEvent::GroupCountUpdated(GroupRef { group_id: 4 }),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn explicit_leave_then_disconnect_announces_once() {
        let mut rooms = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        handle(&mut rooms, a, join(1, "Asha"));
        handle(&mut rooms, b, join(1, "Bilal"));

        let out = handle(
            &mut rooms,
            a,
            ClientEvent::LeaveGroup(RoomNotice {
                group_id: 1,
                user_name: "Asha".into(),
            }),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipients, vec![b]);

        assert!(disconnect(&mut rooms, a).is_empty());
    }

    #[test]
    fn abrupt_disconnect_uses_registered_name() {
        let mut rooms = RoomRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        handle(&mut rooms, a, join(1, "Asha"));
        handle(&mut rooms, b, join(1, "Bilal"));

        let out = disconnect(&mut rooms, b);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipients, vec![a]);
        assert_eq!(
            out[0].event,
            ServerEvent::UserLeft(UserNotice {
                user_name: "Bilal".into()
            })
        );
        assert_eq!(rooms.room_size(1), 1);
    }

    #[test]
    fn publish_targets_current_room_members() {
        let mut rooms = RoomRegistry::new();
        let a = Uuid::new_v4();
        handle(&mut rooms, a, join(3, "Asha"));

        let out = publish(&rooms, 3, ServerEvent::MemberAdded(GroupRef { group_id: 3 })).unwrap();
        assert_eq!(out.recipients, vec![a]);
        assert!(publish(&rooms, 4, ServerEvent::MemberAdded(GroupRef { group_id: 4 })).is_none());
    }
}
