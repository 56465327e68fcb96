//! 身份验证端口的具体实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::{IdentityProvider, Principal, TokenStatus};
use crate::config::{IdentityProviderKind, ServiceAddress};
use crate::error::{Result, TicketingError};
use crate::idm::client::IdmClient;
use crate::idm::jwt::peek_claims;
use crate::idm::service::IdmService;
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 调用 IDM `VerifyToken` 的实现
pub struct IdmIdentityProvider {
    client: IdmClient,
}

impl IdmIdentityProvider {
    #[must_use]
    pub const fn new(client: IdmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityProvider for IdmIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Principal> {
        let verified = self.client.verify_token(token).await?;
        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::Identity,
            "verify_token",
            &format!("令牌验证通过: user_id={}", verified.user_id)
        );
        Ok(Principal {
            user_id: verified.user_id,
            role: verified.role,
            email: Some(verified.email),
            expires_at: Some(verified.expires_at),
        })
    }
}

/// 只解码、不验签
///
/// 仅检查过期时间，供没有 IDM 的本地开发环境使用。
#[derive(Debug, Default)]
pub struct UnverifiedJwtIdentityProvider;

#[async_trait]
impl IdentityProvider for UnverifiedJwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Principal> {
        let claims = peek_claims(token)
            .ok_or_else(|| TicketingError::token(TokenStatus::Corrupted, "token cannot be decoded"))?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TicketingError::token(TokenStatus::Expired, "token has expired"));
        }
        let user_id = claims.user_id().ok_or_else(|| {
            TicketingError::token(TokenStatus::Corrupted, "token subject is not a user id")
        })?;
        Ok(Principal {
            user_id,
            role: claims.role,
            email: None,
            expires_at: DateTime::from_timestamp(claims.exp, 0),
        })
    }
}

/// 进程内 IDM
pub struct LocalIdentityProvider {
    service: Arc<IdmService>,
}

impl LocalIdentityProvider {
    #[must_use]
    pub const fn new(service: Arc<IdmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Principal> {
        let verified = self.service.verify_token(token).await?;
        Ok(Principal {
            user_id: verified.user_id,
            role: verified.role,
            email: Some(verified.email),
            expires_at: Some(verified.expires_at),
        })
    }
}

/// 按配置选择实现
pub fn build_identity_provider(
    kind: IdentityProviderKind,
    idm: &ServiceAddress,
    timeout: Duration,
) -> Result<Arc<dyn IdentityProvider>> {
    match kind {
        IdentityProviderKind::Idm => {
            let client = IdmClient::new(&idm.base_url(), timeout)?;
            Ok(Arc::new(IdmIdentityProvider::new(client)))
        }
        IdentityProviderKind::Dummy => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::Identity,
                "dummy_identity",
                "使用不验签的身份验证实现，只能用于开发环境"
            );
            Ok(Arc::new(UnverifiedJwtIdentityProvider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use crate::idm::jwt::JwtManager;

    #[tokio::test]
    async fn unverified_provider_ignores_signature() {
        let minted = JwtManager::new("another-secret-0123456789", "http://idm", 60)
            .issue(12, Role::Client)
            .unwrap();
        let principal = UnverifiedJwtIdentityProvider
            .verify(&minted.token)
            .await
            .unwrap();
        assert_eq!(principal.user_id, 12);
        assert_eq!(principal.role, Role::Client);
    }

    #[tokio::test]
    async fn unverified_provider_rejects_garbage_and_expired() {
        let err = UnverifiedJwtIdentityProvider.verify("not-a-jwt").await.unwrap_err();
        assert_eq!(err.token_status(), Some(TokenStatus::Corrupted));

        let expired = JwtManager::new("another-secret-0123456789", "http://idm", -120)
            .issue(12, Role::Client)
            .unwrap();
        let err = UnverifiedJwtIdentityProvider
            .verify(&expired.token)
            .await
            .unwrap_err();
        assert_eq!(err.token_status(), Some(TokenStatus::Expired));
    }
}
