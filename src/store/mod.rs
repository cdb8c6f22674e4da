// 持久化层
// 群组、成员、用户的读写；聊天消息不落库

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Group, Member, NewGroup, NewMember, NewUser, User};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Row not found")]
    NotFound,
    #[error("Record already exists")]
    Conflict,
    #[error("Linked user does not exist")]
    UnknownUser,
    #[error("Proposed price is not lower than the current price {current}")]
    PriceNotLower { current: f64 },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// 存储接口；成员人数始终由成员表实时统计，不单独存计数器
#[async_trait]
pub trait RideStore: Send + Sync {
    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError>;

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    async fn get_group(&self, group_id: i64) -> Result<Option<Group>, StoreError>;

    /// 只允许降价；单条语句内完成比较和更新
    async fn update_group_price(&self, group_id: i64, total_cost: f64)
    -> Result<Group, StoreError>;

    /// 删除群组，成员级联删除
    async fn delete_group(&self, group_id: i64) -> Result<(), StoreError>;

    /// 群组不存在返回 `NotFound`；同一登录用户重复加入返回已有成员，`bool` 为 false
    async fn add_member(&self, member: NewMember) -> Result<(Member, bool), StoreError>;

    async fn remove_member(&self, group_id: i64, user_id: i64) -> Result<(), StoreError>;

    async fn remove_member_by_id(&self, member_id: i64) -> Result<Member, StoreError>;

    async fn list_members(&self, group_id: i64) -> Result<Vec<Member>, StoreError>;

    async fn count_members(&self, group_id: i64) -> Result<i64, StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, StoreError>;
}
