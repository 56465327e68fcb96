//! # IDM RPC 接口
//!
//! JSON over HTTP：`POST /idm.v1.IdentityService/{Method}`。成功时返回消息本身，
//! 失败时返回 `{code, message, field?, token_status?}`，状态码按 RPC 码映射。

use axum::{
    Json, Router,
    extract::{FromRequest, Request, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::messages::{
    CheckPermissionRequest, CheckPermissionResponse, LoginRequest, LoginResponse,
    ReadRelationshipsRequest, ReadRelationshipsResponse, RegisterRequest, RegisterResponse,
    RevokeTokenResponse, RpcErrorBody, TokenRequest, VerifiedToken, WriteRelationshipsRequest,
    WriteRelationshipsResponse,
};
use super::service::IdmService;
use crate::error::TicketingError;
use crate::web::{HasDatabase, StrictJson};
use crate::web::server::health;
use crate::{lerror, lwarn, logging::{LogComponent, LogStage}};

/// RPC 路径前缀
pub const SERVICE_PATH: &str = "/idm.v1.IdentityService";

/// IDM 应用状态
#[derive(Clone)]
pub struct IdmState {
    pub service: Arc<IdmService>,
    pub db: DatabaseConnection,
}

impl HasDatabase for IdmState {
    fn database(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// 以 RPC 错误体返回的错误
#[derive(Debug)]
pub struct RpcError(pub TicketingError);

impl From<TicketingError> for RpcError {
    fn from(err: TicketingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let err = self.0;
        let code = err.rpc_code();
        if err.is_server_error() {
            lerror!(
                "system",
                LogStage::Error,
                LogComponent::Idm,
                "rpc_error",
                &err.cause_chain()
            );
        } else {
            lwarn!(
                "system",
                LogStage::Response,
                LogComponent::Idm,
                "rpc_rejected",
                &format!("{code:?}: {err}")
            );
        }
        let body = RpcErrorBody {
            code,
            message: err.client_message(),
            field: err.field().map(str::to_string),
            token_status: err.token_status(),
        };
        (code.http_status(), Json(body)).into_response()
    }
}

/// 严格绑定的 RPC 请求消息
pub struct RpcRequest<T>(pub T);

impl<T, S> FromRequest<S> for RpcRequest<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RpcError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        StrictJson::<T>::from_request(req, state)
            .await
            .map(|StrictJson(message)| Self(message))
            .map_err(RpcError)
    }
}

type RpcResult<T> = Result<Json<T>, RpcError>;

async fn register(
    State(state): State<IdmState>,
    RpcRequest(request): RpcRequest<RegisterRequest>,
) -> RpcResult<RegisterResponse> {
    Ok(Json(state.service.register(request).await?))
}

async fn login(
    State(state): State<IdmState>,
    RpcRequest(request): RpcRequest<LoginRequest>,
) -> RpcResult<LoginResponse> {
    Ok(Json(state.service.login(request).await?))
}

async fn verify_token(
    State(state): State<IdmState>,
    RpcRequest(request): RpcRequest<TokenRequest>,
) -> RpcResult<VerifiedToken> {
    Ok(Json(state.service.verify_token(&request.token).await?))
}

async fn revoke_token(
    State(state): State<IdmState>,
    RpcRequest(request): RpcRequest<TokenRequest>,
) -> RpcResult<RevokeTokenResponse> {
    Ok(Json(state.service.revoke_token(&request.token).await?))
}

async fn check_permission(
    State(state): State<IdmState>,
    RpcRequest(request): RpcRequest<CheckPermissionRequest>,
) -> RpcResult<CheckPermissionResponse> {
    Ok(Json(state.service.check_permission(request).await?))
}

async fn write_relationships(
    State(state): State<IdmState>,
    RpcRequest(request): RpcRequest<WriteRelationshipsRequest>,
) -> RpcResult<WriteRelationshipsResponse> {
    Ok(Json(state.service.write_relationships(request).await?))
}

async fn read_relationships(
    State(state): State<IdmState>,
    RpcRequest(request): RpcRequest<ReadRelationshipsRequest>,
) -> RpcResult<ReadRelationshipsResponse> {
    Ok(Json(state.service.read_relationships(request).await?))
}

async fn unknown_method() -> RpcError {
    RpcError(TicketingError::not_found("rpc method", "requested"))
}

/// 构建 IDM 路由
pub fn rpc_router(state: IdmState) -> Router {
    let methods = Router::new()
        .route("/Register", post(register))
        .route("/Login", post(login))
        .route("/VerifyToken", post(verify_token))
        .route("/RevokeToken", post(revoke_token))
        .route("/CheckPermission", post(check_permission))
        .route("/WriteRelationships", post(write_relationships))
        .route("/ReadRelationships", post(read_relationships))
        .fallback(unknown_method);

    Router::new()
        .nest(SERVICE_PATH, methods)
        .route("/health", get(health::<IdmState>))
        .with_state(state)
}
