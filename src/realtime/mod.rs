// 实时同步层
// 房间注册表、事件中继，以及服务端主动推送

pub mod events;
mod hub;
pub mod registry;
pub mod relay;

pub use events::{ChatPayload, ClientEvent, GroupRef, PriceNotice, RoomNotice, ServerEvent};
pub use hub::RelayHub;
pub use registry::{RoomRegistry, SessionId};
