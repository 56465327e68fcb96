//! # 用户管理路由

use axum::{
    Router,
    routing::{get, post},
};

use super::handlers::{tickets, users};
use super::server::UserManagerState;
use crate::web::server::health;

pub const API_PREFIX: &str = "/api/user-manager";

/// 创建 User Manager 路由
pub fn create_routes(state: UserManagerState) -> Router {
    let api = Router::new()
        .route("/users", post(users::create_profile))
        .route("/users/", post(users::create_profile))
        .route(
            "/users/{user_id}",
            get(users::get_profile)
                .patch(users::update_profile)
                .delete(users::delete_profile),
        )
        .route("/clients/{user_id}/tickets", post(tickets::purchase_ticket));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health::<UserManagerState>))
        .with_state(state)
}
