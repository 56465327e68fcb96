//! # Bearer 认证提取器

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::error::{Result, TicketingError};
use crate::identity::{IdentityProvider, Principal};
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 能够提供身份验证端口的应用状态
pub trait HasIdentity {
    fn identity(&self) -> &Arc<dyn IdentityProvider>;
}

/// 能够提供数据库连接的应用状态
pub trait HasDatabase {
    fn database(&self) -> &DatabaseConnection;
}

/// 从 `Authorization` 头中取出 Bearer 令牌
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| TicketingError::unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| TicketingError::unauthorized("Authorization header is not valid text"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| TicketingError::unauthorized("expected Authorization: Bearer <token>"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TicketingError::unauthorized(
            "expected Authorization: Bearer <token>",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(TicketingError::unauthorized("bearer token is empty"));
    }
    Ok(token)
}

/// 已认证的请求方
///
/// 提取失败时返回 401，写操作的处理器通过它强制认证。
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
    S: HasIdentity + Send + Sync,
{
    type Rejection = TicketingError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let token = bearer_token(&parts.headers)?;
        let principal = state.identity().verify(token).await?;
        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::Identity,
            "authenticated",
            &format!("user_id={} role={}", principal.user_id, principal.role)
        );
        Ok(Self(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&headers("bearer  xyz ")).unwrap(), "xyz");
    }

    #[test]
    fn rejects_missing_or_malformed() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(TicketingError::Unauthorized { .. })
        ));
        assert!(bearer_token(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(bearer_token(&headers("Bearer ")).is_err());
        assert!(bearer_token(&headers("token")).is_err());
    }
}
