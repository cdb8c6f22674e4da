use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::AppState;
use crate::common::ApiResponse;
use crate::error::AppError;
use crate::models::{AddMemberRequest, AddMemberResponse, LeaveGroupRequest, Member};
use crate::realtime::{GroupRef, ServerEvent};
use crate::store::StoreError;
use crate::utils::success_to_api_response;

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

/// 成员变更后通知房间内所有客户端重新拉取
async fn announce(state: &AppState, group_id: i64, change: ServerEvent) {
    state.relay.publish(group_id, change).await;
    state
        .relay
        .publish(group_id, ServerEvent::GroupCountUpdated(GroupRef { group_id }))
        .await;
}

#[axum::debug_handler]
pub async fn add_member(
    State(state): State<AppState>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<AddMemberResponse> {
    let new_member = req
        .validate()
        .ok_or_else(|| AppError::Validation("Member name must not be empty".into()))?;
    let group_id = new_member.group_id;

    let (member, created) = state
        .store
        .add_member(new_member)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::not_found("Group"),
            other => other.into(),
        })?;

    if !created {
        return Ok((
            StatusCode::OK,
            success_to_api_response(AddMemberResponse { member, created }),
        ));
    }

    tracing::info!(
        "Member {} ({}) joined group {}",
        member.id,
        if member.is_guest() { "guest" } else { "user" },
        group_id
    );
    announce(&state, group_id, ServerEvent::MemberAdded(GroupRef { group_id })).await;

    Ok((
        StatusCode::CREATED,
        success_to_api_response(AddMemberResponse { member, created }),
    ))
}

#[axum::debug_handler]
pub async fn list_members(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> ApiResult<Vec<Member>> {
    let members = state.store.list_members(group_id).await?;
    Ok((StatusCode::OK, success_to_api_response(members)))
}

#[axum::debug_handler]
pub async fn leave_group(
    State(state): State<AppState>,
    Json(req): Json<LeaveGroupRequest>,
) -> ApiResult<serde_json::Value> {
    state
        .store
        .remove_member(req.group_id, req.user_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::NotFound("User not in group".into()),
            other => other.into(),
        })?;

    tracing::info!("User {} left group {}", req.user_id, req.group_id);
    announce(
        &state,
        req.group_id,
        ServerEvent::MemberLeft(GroupRef {
            group_id: req.group_id,
        }),
    )
    .await;

    Ok((
        StatusCode::OK,
        success_to_api_response(serde_json::json!({ "message": "Left group" })),
    ))
}

#[axum::debug_handler]
pub async fn remove_member(
    State(state): State<AppState>,
    Path(member_id): Path<i64>,
) -> ApiResult<Member> {
    let member = state
        .store
        .remove_member_by_id(member_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::not_found("Member"),
            other => other.into(),
        })?;

    let group_id = member.group_id;
    tracing::info!("Member {} removed from group {}", member_id, group_id);
    announce(&state, group_id, ServerEvent::MemberRemoved(GroupRef { group_id })).await;

    Ok((StatusCode::OK, success_to_api_response(member)))
}
