//! 客户端同步库。
//!
//! 与服务端共用事件和模型定义，提供：聊天记录去重（[`ChatTranscript`]）、
//! 群组视图与乐观更新（[`GroupView`]）、带防抖的成员同步（[`MembershipSync`]）
//! 以及基于 reqwest 的 HTTP 客户端（[`ApiClient`]）。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Group, Member};
use crate::store::{RideStore, StoreError};

mod http;
mod sync;
mod transcript;
mod view;

pub use http::ApiClient;
pub use sync::{DEFAULT_SYNC_WINDOW, MembershipSync};
pub use transcript::{ChatTranscript, TranscriptEntry};
pub use view::{Effect, GroupView, OpHandle, PendingOp, Viewer};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {code}: {msg}")]
    Api { code: i32, msg: String },
    #[error("{0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// 一次重新拉取得到的群组详情和成员列表
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSnapshot {
    pub group: Group,
    pub members: Vec<Member>,
}

/// 同步器读取群组状态的来源
#[async_trait]
pub trait GroupSource: Send + Sync {
    async fn fetch_group(&self, group_id: i64) -> Result<Group, ClientError>;

    async fn fetch_members(&self, group_id: i64) -> Result<Vec<Member>, ClientError>;

    async fn snapshot(&self, group_id: i64) -> Result<GroupSnapshot, ClientError> {
        let group = self.fetch_group(group_id).await?;
        let members = self.fetch_members(group_id).await?;
        Ok(GroupSnapshot { group, members })
    }
}

/// 直接读存储（同进程内使用，测试也用它）
#[derive(Clone)]
pub struct StoreSource {
    store: Arc<dyn RideStore>,
}

impl StoreSource {
    pub fn new(store: Arc<dyn RideStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GroupSource for StoreSource {
    async fn fetch_group(&self, group_id: i64) -> Result<Group, ClientError> {
        self.store
            .get_group(group_id)
            .await?
            .ok_or_else(|| ClientError::NotFound("Group not found".into()))
    }

    async fn fetch_members(&self, group_id: i64) -> Result<Vec<Member>, ClientError> {
        Ok(self.store.list_members(group_id).await?)
    }
}
