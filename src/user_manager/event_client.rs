//! # Event Manager 客户端
//!
//! 以服务账号身份 `PUT /api/event-manager/tickets/{code}`。令牌被拒绝时
//! 丢弃缓存并重试一次；其余错误按响应中的错误体还原。

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::service_token::ServiceTokenCache;
use crate::domain::TicketCode;
use crate::error::{Result, TicketingError};
use crate::event_manager::links::API_PREFIX;
use crate::event_manager::services::tickets::TicketBody;
use crate::web::response::ErrorInfo;
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 门票下单端口
#[async_trait]
pub trait TicketGateway: Send + Sync {
    /// 以给定编号创建门票；重复调用相同内容是幂等的
    async fn place_ticket(&self, code: TicketCode, body: TicketBody) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorInfo,
}

/// 基于 HTTP 的 Event Manager 客户端
pub struct EventManagerClient {
    http: Client,
    tickets: Url,
    tokens: Arc<ServiceTokenCache>,
}

impl EventManagerClient {
    pub fn new(base_url: &str, timeout: Duration, tokens: Arc<ServiceTokenCache>) -> Result<Self> {
        let tickets = Url::parse(base_url)
            .and_then(|base| base.join(&format!("{API_PREFIX}/tickets/")))
            .map_err(|e| {
                TicketingError::config_with_source(
                    format!("invalid event manager address {base_url:?}"),
                    e,
                )
            })?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TicketingError::config_with_source("failed to build HTTP client", e))?;
        Ok(Self {
            http,
            tickets,
            tokens,
        })
    }

    async fn put(&self, url: &Url, body: &TicketBody, token: &str) -> Result<Response> {
        Ok(self
            .http
            .put(url.clone())
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }
}

#[async_trait]
impl TicketGateway for EventManagerClient {
    async fn place_ticket(&self, code: TicketCode, body: TicketBody) -> Result<()> {
        let url = self
            .tickets
            .join(&code.to_string())
            .map_err(|e| TicketingError::internal_with_source("cannot build ticket URL", e))?;

        let token = self.tokens.token().await?;
        let mut response = self.put(&url, &body, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            lwarn!(
                "system",
                LogStage::ExternalApi,
                LogComponent::Purchase,
                "service_token_rejected",
                &format!("Event Manager 拒绝了服务令牌，重新登录后重试: code={code}")
            );
            self.tokens.invalidate().await;
            let token = self.tokens.token().await?;
            response = self.put(&url, &body, &token).await?;
        }

        let status = response.status();
        if status.is_success() {
            ldebug!(
                "system",
                LogStage::ExternalApi,
                LogComponent::Purchase,
                "ticket_placed",
                &format!("门票已在 Event Manager 创建: code={code} status={status}")
            );
            return Ok(());
        }

        let info = response.json::<ErrorEnvelope>().await.map(|e| e.error).ok();
        Err(remote_error(status, info))
    }
}

/// 把 Event Manager 的错误响应还原为本地错误
fn remote_error(status: StatusCode, info: Option<ErrorInfo>) -> TicketingError {
    let Some(ErrorInfo {
        message,
        field,
        details,
        ..
    }) = info
    else {
        return TicketingError::network(format!("event manager answered {status}"));
    };

    match status {
        StatusCode::BAD_REQUEST => match field {
            Some(field) => TicketingError::validation(field, message),
            None => TicketingError::invalid_request(message),
        },
        StatusCode::CONFLICT => TicketingError::Conflict {
            reason: message,
            field,
            details,
        },
        StatusCode::FORBIDDEN => TicketingError::forbidden(message),
        StatusCode::NOT_FOUND => TicketingError::not_found("ticket", message),
        _ => TicketingError::network(format!("event manager answered {status}: {message}")),
    }
}
