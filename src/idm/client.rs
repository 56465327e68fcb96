//! # IDM 客户端
//!
//! 其他服务通过它调用 IDM 的 RPC 方法。非 2xx 响应按错误体还原为
//! [`TicketingError`]，令牌错误保留其状态。

use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use url::Url;

use super::messages::{
    CheckPermissionRequest, CheckPermissionResponse, LoginRequest, LoginResponse,
    RegisterRequest, RegisterResponse, RevokeTokenResponse, RpcErrorBody, TokenRequest,
    VerifiedToken,
};
use super::rpc::SERVICE_PATH;
use crate::error::{Result, RpcCode, TicketingError};
use crate::identity::TokenStatus;
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// IDM RPC 客户端
#[derive(Debug, Clone)]
pub struct IdmClient {
    http: Client,
    base: Url,
}

impl IdmClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            TicketingError::config_with_source(format!("invalid IDM address {base_url:?}"), e)
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TicketingError::config_with_source("failed to build HTTP client", e))?;
        Ok(Self { http, base })
    }

    async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self
            .base
            .join(&format!("{SERVICE_PATH}/{method}"))
            .map_err(|e| TicketingError::internal_with_source("cannot build IDM URL", e))?;
        ldebug!(
            "system",
            LogStage::ExternalApi,
            LogComponent::Idm,
            "rpc_call",
            &format!("调用 IDM {method}")
        );

        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return response.json::<Resp>().await.map_err(|e| {
                TicketingError::network_with_source(format!("unreadable IDM {method} response"), e)
            });
        }

        let body = response.json::<RpcErrorBody>().await.map_err(|e| {
            TicketingError::network_with_source(format!("IDM {method} failed with {status}"), e)
        })?;
        Err(rpc_error(body))
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        self.call("Register", request).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.call("Login", &request).await
    }

    pub async fn verify_token(&self, token: &str) -> Result<VerifiedToken> {
        self.call(
            "VerifyToken",
            &TokenRequest {
                token: token.to_string(),
            },
        )
        .await
    }

    pub async fn revoke_token(&self, token: &str) -> Result<RevokeTokenResponse> {
        self.call(
            "RevokeToken",
            &TokenRequest {
                token: token.to_string(),
            },
        )
        .await
    }

    pub async fn check_permission(
        &self,
        request: &CheckPermissionRequest,
    ) -> Result<CheckPermissionResponse> {
        self.call("CheckPermission", request).await
    }
}

/// 把 RPC 错误体还原为本地错误
fn rpc_error(body: RpcErrorBody) -> TicketingError {
    let RpcErrorBody {
        code,
        message,
        field,
        token_status,
    } = body;
    match code {
        RpcCode::Unauthenticated => match token_status {
            Some(status) if status != TokenStatus::Valid => TicketingError::token(status, message),
            _ => TicketingError::unauthorized(message),
        },
        RpcCode::InvalidArgument => match field {
            Some(field) => TicketingError::validation(field, message),
            None => TicketingError::invalid_request(message),
        },
        RpcCode::PermissionDenied => TicketingError::forbidden(message),
        RpcCode::NotFound => TicketingError::not_found("IDM resource", message),
        RpcCode::AlreadyExists | RpcCode::FailedPrecondition => TicketingError::Conflict {
            reason: message,
            field,
            details: None,
        },
        RpcCode::Unavailable | RpcCode::Internal => {
            TicketingError::network(format!("IDM failed: {message}"))
        }
    }
}
