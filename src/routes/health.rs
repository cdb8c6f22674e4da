use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::common::PingResponse;
use crate::utils::success_to_api_response;

/// 健康检查接口
#[axum::debug_handler]
pub async fn ping() -> impl IntoResponse {
    let now = chrono::Utc::now();

    (
        StatusCode::OK,
        success_to_api_response(PingResponse {
            status: "ok".to_string(),
            timestamp: now.timestamp(),
        }),
    )
}
