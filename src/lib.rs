use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use config::Config;
use realtime::RelayHub;
use store::RideStore;

pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RideStore>,
    pub config: Config,
    pub relay: RelayHub,
}

impl AppState {
    pub fn new(store: Arc<dyn RideStore>, config: Config) -> Self {
        let relay = RelayHub::new(config.relay_buffer);
        Self {
            store,
            config,
            relay,
        }
    }
}

/// 组装全部 HTTP/WebSocket 路由（不含限流和 CORS，由 main 按环境添加）
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/ping", get(routes::health::ping))
        .route("/ws", get(routes::realtime::ws_handler))
        // 用户
        .route("/auth/register", post(routes::user::register))
        .route("/auth/login", post(routes::user::login))
        // 拼车群组
        .route(
            "/groups",
            post(routes::group::create_group).get(routes::group::list_groups),
        )
        .route("/groups/id", get(routes::group::get_group_by_query))
        .route(
            "/groups/{id}",
            get(routes::group::get_group).delete(routes::group::delete_group),
        )
        .route("/groups/{id}/count", get(routes::group::get_member_count))
        .route("/groups/price/{id}", put(routes::group::update_price))
        // 成员
        .route("/members", post(routes::member::add_member))
        .route("/members/group/{id}", get(routes::member::list_members))
        .route("/members/leave_user", post(routes::member::leave_group))
        .route("/members/{id}", delete(routes::member::remove_member));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::user::me))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    // axum 不允许在根路径 nest
    let router = if state.config.api_base_uri.is_empty() {
        api
    } else {
        Router::new().nest(&state.config.api_base_uri, api)
    };

    router
        .layer(axum::middleware::from_fn(middleware::log_errors))
        .with_state(state)
}
