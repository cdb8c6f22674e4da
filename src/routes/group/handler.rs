use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::AppState;
use crate::common::ApiResponse;
use crate::error::AppError;
use crate::models::{
    CreateGroupRequest, Group, GroupCount, GroupIdQuery, UpdatePriceRequest,
    check_price_proposal,
};
use crate::realtime::{PriceNotice, ServerEvent};
use crate::store::StoreError;
use crate::utils::success_to_api_response;

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<Group> {
    let group = state.store.create_group(req.validate()?).await?;
    tracing::info!("Ride group {} created: {}", group.id, group.group_name);
    Ok((StatusCode::CREATED, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Vec<Group>> {
    let groups = state.store.list_groups().await?;
    Ok((StatusCode::OK, success_to_api_response(groups)))
}

#[axum::debug_handler]
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> ApiResult<Group> {
    find_group(&state, group_id).await
}

/// `/groups/id?group_id=`，前端详情页使用的查询形式
#[axum::debug_handler]
pub async fn get_group_by_query(
    State(state): State<AppState>,
    Query(query): Query<GroupIdQuery>,
) -> ApiResult<Group> {
    find_group(&state, query.group_id).await
}

async fn find_group(state: &AppState, group_id: i64) -> ApiResult<Group> {
    match state.store.get_group(group_id).await? {
        Some(group) => Ok((StatusCode::OK, success_to_api_response(group))),
        None => Err(AppError::not_found("Group")),
    }
}

#[axum::debug_handler]
pub async fn get_member_count(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> ApiResult<GroupCount> {
    let number_of_members = state
        .store
        .count_members(group_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::not_found("Group"),
            other => other.into(),
        })?;
    Ok((
        StatusCode::OK,
        success_to_api_response(GroupCount {
            group_id,
            number_of_members,
        }),
    ))
}

#[axum::debug_handler]
pub async fn delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.store.delete_group(group_id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found("Group"),
        other => other.into(),
    })?;
    tracing::info!("Ride group {} deleted", group_id);
    Ok((
        StatusCode::OK,
        success_to_api_response(serde_json::json!({ "deleted": group_id })),
    ))
}

/// 降价：先按已知价格快速校验，再由存储层原子地比较并更新
#[axum::debug_handler]
pub async fn update_price(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Json(req): Json<UpdatePriceRequest>,
) -> ApiResult<Group> {
    let current = state
        .store
        .get_group(group_id)
        .await?
        .ok_or_else(|| AppError::not_found("Group"))?;
    check_price_proposal(current.total_cost, req.total_cost)?;

    let group = state
        .store
        .update_group_price(group_id, req.total_cost)
        .await?;

    state
        .relay
        .publish(
            group_id,
            ServerEvent::PriceChanged(PriceNotice {
                group_id,
                message: format!("Total price lowered to {:.2}", group.total_cost),
            }),
        )
        .await;

    Ok((StatusCode::OK, success_to_api_response(group)))
}
