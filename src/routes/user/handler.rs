use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};

use crate::{
    AppState,
    common::ApiResponse,
    error::AppError,
    models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, User},
    utils::{Claims, generate_token, hash_password, success_to_api_response, verify_password},
};

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<User> {
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Name, email and password are required".into(),
        ));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".into()));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        AppError::InternalServerError
    })?;

    let user = state
        .store
        .create_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            phone: req.phone.filter(|p| !p.trim().is_empty()),
            password_hash,
        })
        .await
        .map_err(|e| match e {
            crate::store::StoreError::Conflict => {
                AppError::Conflict("Email already registered".into())
            }
            other => other.into(),
        })?;

    tracing::info!("User {} registered", user.id);
    Ok((StatusCode::CREATED, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    // 邮箱不存在和密码错误返回同样的信息
    let rejected = || AppError::Unauthorized("Invalid email or password".into());

    let user = state
        .store
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or_else(rejected)?;

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::warn!("Stored hash for user {} is unreadable: {}", user.id, e);
        rejected()
    })?;
    if !valid {
        return Err(rejected());
    }

    let (token, expires_at) = generate_token(user.id, &user.name, &state.config).map_err(|e| {
        tracing::error!("Failed to sign token: {}", e);
        AppError::InternalServerError
    })?;

    Ok((
        StatusCode::OK,
        success_to_api_response(LoginResponse {
            token,
            expires_at,
            user,
        }),
    ))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<User> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| AppError::Unauthorized("Malformed token subject".into()))?;

    match state.store.find_user_by_id(user_id).await? {
        Some(user) => Ok((StatusCode::OK, success_to_api_response(user))),
        None => Err(AppError::not_found("User")),
    }
}
