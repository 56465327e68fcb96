//! # 服务令牌缓存
//!
//! User Manager 以服务账号调用 Event Manager。令牌在过期前 5 分钟内视为
//! 陈旧；刷新经过互斥门，并发请求只会触发一次登录。

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::config::Credentials;
use crate::error::Result;
use crate::idm::IdmClient;
use crate::{ldebug, linfo, logging::{LogComponent, LogStage}};

/// 提前刷新的时间窗
const REFRESH_MARGIN_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

/// 服务账号令牌缓存
pub struct ServiceTokenCache {
    idm: IdmClient,
    credentials: Credentials,
    cached: RwLock<Option<CachedToken>>,
    refresh_gate: Mutex<()>,
}

impl ServiceTokenCache {
    #[must_use]
    pub fn new(idm: IdmClient, credentials: Credentials) -> Self {
        Self {
            idm,
            credentials,
            cached: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// 返回可用的令牌，必要时登录刷新
    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;
        // 等待期间可能已被其他请求刷新
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        let login = self
            .idm
            .login(&self.credentials.email, &self.credentials.password)
            .await?;
        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::ServiceToken,
            "service_login",
            &format!("服务账号已登录，令牌有效期至 {}", login.expires_at)
        );
        *self.cached.write().await = Some(CachedToken {
            token: login.token.clone(),
            expires_at: login.expires_at,
        });
        Ok(login.token)
    }

    /// 丢弃缓存，下一次 [`Self::token`] 会重新登录
    pub async fn invalidate(&self) {
        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::ServiceToken,
            "invalidate",
            "服务令牌已失效"
        );
        *self.cached.write().await = None;
    }

    async fn fresh_token(&self) -> Option<String> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|cached| cached.is_fresh(Utc::now()))
            .map(|cached| cached.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use crate::idm::messages::LoginResponse;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            email: "svc@tickets.local".into(),
            password: "svc".into(),
        }
    }

    fn login_body(token: &str, ttl_secs: i64) -> LoginResponse {
        LoginResponse {
            token: token.into(),
            user_id: 1,
            role: Role::ServiciuClienti,
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    async fn cache_for(server: &MockServer) -> ServiceTokenCache {
        let idm = IdmClient::new(&server.uri(), std::time::Duration::from_secs(2)).unwrap();
        ServiceTokenCache::new(idm, credentials())
    }

    #[test]
    fn test_freshness_margin() {
        let now = Utc::now();
        let token = |secs| CachedToken {
            token: "t".into(),
            expires_at: now + Duration::seconds(secs),
        };
        assert!(token(REFRESH_MARGIN_SECS + 60).is_fresh(now));
        assert!(!token(REFRESH_MARGIN_SECS - 1).is_fresh(now));
        assert!(!token(-10).is_fresh(now));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idm.v1.IdentityService/Login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_body("svc-1", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(cache_for(&server).await);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.token().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "svc-1");
        }
    }

    #[tokio::test]
    async fn test_stale_token_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idm.v1.IdentityService/Login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_body("short", 60)))
            .expect(2)
            .mount(&server)
            .await;

        let cache = cache_for(&server).await;
        assert_eq!(cache.token().await.unwrap(), "short");
        // 60 秒的令牌落在刷新窗口内，每次都会重新登录
        assert_eq!(cache.token().await.unwrap(), "short");
    }

    #[tokio::test]
    async fn test_invalidate_forces_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idm.v1.IdentityService/Login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_body("svc", 3600)))
            .expect(2)
            .mount(&server)
            .await;

        let cache = cache_for(&server).await;
        cache.token().await.unwrap();
        cache.token().await.unwrap();
        cache.invalidate().await;
        cache.token().await.unwrap();
    }
}
