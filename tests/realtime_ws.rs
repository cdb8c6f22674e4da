use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ridewise::{
    AppState, build_router,
    client::{
        ApiClient, ClientError, DEFAULT_SYNC_WINDOW, Effect, GroupSource, GroupView, MembershipSync,
        PendingOp, TranscriptEntry, Viewer,
    },
    config::Config,
    models::{AddMemberRequest, CreateGroupRequest, RegisterRequest},
    realtime::{ChatPayload, ClientEvent, RelayHub, ServerEvent},
    store::MemoryStore,
};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    addr: SocketAddr,
    relay: RelayHub,
}

impl Server {
    async fn start() -> Self {
        let state = AppState::new(Arc::new(MemoryStore::new()), Config::for_tests());
        let relay = state.relay.clone();
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self { addr, relay }
    }

    fn api(&self) -> ApiClient {
        ApiClient::new(format!("http://{}/api", self.addr))
    }

    async fn connect(&self) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}/api/ws", self.addr))
            .await
            .unwrap();
        socket
    }

    /// 等到房间人数达到预期，保证后续广播能送达
    async fn wait_for_room(&self, group_id: i64, size: usize) {
        for _ in 0..100 {
            if self.relay.room_size(group_id).await == size {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room {} never reached {} sessions", group_id, size);
    }
}

async fn emit(socket: &mut Socket, event: &ClientEvent) {
    let text = serde_json::to_string(event).unwrap();
    socket.send(Message::text(text)).await.unwrap();
}

async fn next_event(socket: &mut Socket) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for an event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn create_group(api: &ApiClient) -> i64 {
    api.create_group(&CreateGroupRequest {
        group_name: "Office Commute".into(),
        start_location: "A".into(),
        end_location: "B".into(),
        total_cost: Some(0.0),
        time_range_start: None,
        time_range_end: None,
    })
    .await
    .unwrap()
    .id
}

fn chat_entries(view: &GroupView) -> Vec<&ChatPayload> {
    view.transcript()
        .entries()
        .iter()
        .filter_map(|e| match e {
            TranscriptEntry::Chat(m) => Some(m),
            TranscriptEntry::System(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn chat_is_relayed_to_the_room_and_deduped() {
    let server = Server::start().await;
    let group_id = create_group(&server.api()).await;

    let mut asha = GroupView::new(
        group_id,
        Viewer {
            user_id: Some(1),
            name: "Asha".into(),
        },
    );
    let mut bilal = GroupView::new(
        group_id,
        Viewer {
            user_id: None,
            name: "Bilal".into(),
        },
    );

    let mut ws_a = server.connect().await;
    let mut ws_b = server.connect().await;

    // groupId 以字符串提交也能路由
    let join = json!({
        "event": "join-group",
        "data": { "groupId": group_id.to_string(), "userName": "Asha" }
    });
    ws_a.send(Message::text(join.to_string()))
    .await
    .unwrap();
    let joined = next_event(&mut ws_a).await;
    assert_eq!(asha.apply_event(&joined), Effect::Resync);

    emit(&mut ws_b, &bilal.join_event()).await;
    for (ws, view) in [(&mut ws_a, &mut asha), (&mut ws_b, &mut bilal)] {
        let event = next_event(ws).await;
        assert!(matches!(&event, ServerEvent::UserJoined(n) if n.user_name == "Bilal"));
        view.apply_event(&event);
    }
    server.wait_for_room(group_id, 2).await;

    // 发送方先本地追加，随后收到自己的回声
    let hi = ChatPayload {
        group_id,
        message: "hi".into(),
        user_name: "Asha".into(),
        sender_id: "a".into(),
        timestamp: 1,
        client_id: Some("a_1_x".into()),
    };
    asha.apply_event(&ServerEvent::ChatMessage(hi.clone()));
    emit(&mut ws_a, &ClientEvent::ChatMessage(hi)).await;

    let echo = next_event(&mut ws_a).await;
    asha.apply_event(&echo);
    let delivered = next_event(&mut ws_b).await;
    bilal.apply_event(&delivered);
    // 重复投递同一条也只保留一份
    bilal.apply_event(&delivered);

    assert_eq!(chat_entries(&asha).len(), 1);
    assert_eq!(chat_entries(&bilal).len(), 1);
    assert_eq!(chat_entries(&bilal)[0].client_id.as_deref(), Some("a_1_x"));

    assert_eq!(
        bilal.transcript().entries()[0],
        TranscriptEntry::System("Bilal joined the group".into())
    );

    // 断线后房间里的其他人收到离开通知
    drop(ws_b);
    let left = next_event(&mut ws_a).await;
    assert!(matches!(&left, ServerEvent::UserLeft(n) if n.user_name == "Bilal"));
    server.wait_for_room(group_id, 1).await;
}

#[tokio::test]
async fn malformed_frames_get_an_error_reply() {
    let server = Server::start().await;
    let mut ws = server.connect().await;

    ws.send(Message::text("{\"event\":\"join-group\",\"data\":{}}"))
        .await
        .unwrap();
    assert!(matches!(next_event(&mut ws).await, ServerEvent::Error { .. }));

    ws.send(Message::text("not json")).await.unwrap();
    assert!(matches!(next_event(&mut ws).await, ServerEvent::Error { .. }));
}

#[tokio::test]
async fn member_changes_are_published_and_views_converge() {
    let server = Server::start().await;
    let api = server.api();
    let group_id = create_group(&api).await;
    let asha = api
        .register(&RegisterRequest {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            phone: None,
            password: "hunter22".into(),
        })
        .await
        .unwrap();

    let mut view = GroupView::new(
        group_id,
        Viewer {
            user_id: Some(asha.id),
            name: "Asha".into(),
        },
    );
    let mut ws = server.connect().await;
    emit(&mut ws, &view.join_event()).await;
    let joined = next_event(&mut ws).await;
    view.apply_event(&joined);
    server.wait_for_room(group_id, 1).await;

    let (tx, mut snapshots) = mpsc::channel(4);
    let source: Arc<dyn GroupSource> = Arc::new(api.clone());
    let sync = MembershipSync::spawn(source, group_id, DEFAULT_SYNC_WINDOW, tx);

    let handle = view.begin(PendingOp::Join);
    assert_eq!(view.member_count(), 1);

    let added = api
        .add_member(&AddMemberRequest {
            group_id,
            member_name: "Asha".into(),
            member_email: None,
            user_id: Some(asha.id),
        })
        .await;
    view.settle(handle, added.map(|_| ()));

    // 服务端依次推送 member-added 和 group-count-updated
    let first = next_event(&mut ws).await;
    let second = next_event(&mut ws).await;
    assert!(matches!(first, ServerEvent::MemberAdded(r) if r.group_id == group_id));
    assert!(matches!(second, ServerEvent::GroupCountUpdated(r) if r.group_id == group_id));
    for event in [first, second] {
        if view.apply_event(&event) == Effect::Resync {
            sync.request();
        }
    }

    let snapshot = tokio::time::timeout(Duration::from_secs(5), snapshots.recv())
        .await
        .unwrap()
        .unwrap();
    view.apply_snapshot(snapshot);
    assert_eq!(view.member_count(), 1);
    assert!(view.members().iter().all(|m| m.id > 0));
    assert_eq!(view.group().unwrap().number_of_members, 1);
}

#[tokio::test]
async fn accepted_price_drop_is_published() {
    let server = Server::start().await;
    let api = server.api();
    let group_id = api
        .create_group(&CreateGroupRequest {
            group_name: "Airport Run".into(),
            start_location: "Campus".into(),
            end_location: "Terminal 2".into(),
            total_cost: Some(300.0),
            time_range_start: None,
            time_range_end: None,
        })
        .await
        .unwrap()
        .id;

    let mut view = GroupView::new(
        group_id,
        Viewer {
            user_id: None,
            name: "Chen".into(),
        },
    );
    let mut ws = server.connect().await;
    emit(&mut ws, &view.join_event()).await;
    view.apply_event(&next_event(&mut ws).await);
    server.wait_for_room(group_id, 1).await;

    let group = api.update_price(group_id, 250.0).await.unwrap();
    assert_eq!(group.total_cost, 250.0);

    let notice = next_event(&mut ws).await;
    assert!(matches!(
        &notice,
        ServerEvent::PriceChanged(p) if p.message == "Total price lowered to 250.00"
    ));
    assert_eq!(view.apply_event(&notice), Effect::Resync);

    match api.update_price(group_id, 260.0).await {
        Err(ClientError::Api { code, .. }) => assert_eq!(code, 1000),
        other => panic!("expected rejection, got {:?}", other),
    }
}
