// 群组成员相关的数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::serde_helpers::{flexible_id, optional_flexible_id};

/// 群组成员，`user_id` 为空表示游客
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: i64,
    pub group_id: i64,
    pub member_name: String,
    pub member_email: Option<String>,
    pub user_id: Option<i64>,
    pub contribution: f64,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }
}

/// 加入群组请求（登录用户或游客）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberRequest {
    #[serde(with = "flexible_id")]
    pub group_id: i64,
    pub member_name: String,
    #[serde(default)]
    pub member_email: Option<String>,
    #[serde(default, with = "optional_flexible_id")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub group_id: i64,
    pub member_name: String,
    pub member_email: Option<String>,
    pub user_id: Option<i64>,
}

impl AddMemberRequest {
    /// 只校验名字非空，邮箱不做格式校验
    pub fn validate(self) -> Option<NewMember> {
        let member_name = self.member_name.trim().to_string();
        if member_name.is_empty() {
            return None;
        }
        let member_email = self
            .member_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());

        Some(NewMember {
            group_id: self.group_id,
            member_name,
            member_email,
            user_id: self.user_id,
        })
    }
}

/// 加入结果，`created` 为 false 表示该用户已在群组中
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberResponse {
    pub member: Member,
    pub created: bool,
}

/// 登录用户退出群组请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveGroupRequest {
    #[serde(with = "flexible_id")]
    pub group_id: i64,
    #[serde(with = "flexible_id")]
    pub user_id: i64,
}
