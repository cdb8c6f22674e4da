// 拼车群组相关的数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use crate::utils::serde_helpers::{flexible_id, optional_datetime};

/// 拼车群组，`number_of_members` 在读取时由成员表实时统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: i64,
    pub group_name: String,
    pub start_location: String,
    pub end_location: String,
    pub total_cost: f64,
    pub time_range_start: Option<DateTime<Utc>>,
    pub time_range_end: Option<DateTime<Utc>>,
    pub number_of_members: i64,
    pub created_at: DateTime<Utc>,
}

/// 创建群组请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub group_name: String,
    #[serde(default)]
    pub start_location: String,
    #[serde(default)]
    pub end_location: String,
    pub total_cost: Option<f64>,
    #[serde(default, with = "optional_datetime")]
    pub time_range_start: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_datetime")]
    pub time_range_end: Option<DateTime<Utc>>,
}

/// 经过校验、可以直接写入存储的新群组
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub group_name: String,
    pub start_location: String,
    pub end_location: String,
    pub total_cost: f64,
    pub time_range_start: Option<DateTime<Utc>>,
    pub time_range_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum GroupValidationError {
    #[error("Group name must not be empty")]
    EmptyName,
    #[error("Total cost must be a non-negative number")]
    InvalidCost,
}

impl CreateGroupRequest {
    /// 时间窗口的先后顺序不做校验
    pub fn validate(self) -> Result<NewGroup, GroupValidationError> {
        let group_name = self.group_name.trim().to_string();
        if group_name.is_empty() {
            return Err(GroupValidationError::EmptyName);
        }

        let total_cost = self.total_cost.unwrap_or(0.0);
        if !total_cost.is_finite() || total_cost < 0.0 {
            return Err(GroupValidationError::InvalidCost);
        }

        Ok(NewGroup {
            group_name,
            start_location: self.start_location.trim().to_string(),
            end_location: self.end_location.trim().to_string(),
            total_cost,
            time_range_start: self.time_range_start,
            time_range_end: self.time_range_end,
        })
    }
}

/// 按ID查询群组（兼容 `/groups/id?group_id=` 形式）
#[derive(Debug, Deserialize)]
pub struct GroupIdQuery {
    #[serde(with = "flexible_id")]
    pub group_id: i64,
}

/// 调整总价请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePriceRequest {
    pub total_cost: f64,
}

/// 当前成员人数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCount {
    pub group_id: i64,
    pub number_of_members: i64,
}

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum PriceError {
    #[error("Price must be a non-negative number")]
    Invalid,
    #[error("Proposed price must be lower than the current price {current:.2}")]
    NotLower { current: f64 },
}

/// 新报价必须严格低于当前价格
pub fn check_price_proposal(current: f64, proposed: f64) -> Result<(), PriceError> {
    if !proposed.is_finite() || proposed < 0.0 {
        return Err(PriceError::Invalid);
    }
    if proposed >= current {
        return Err(PriceError::NotLower { current });
    }
    Ok(())
}
