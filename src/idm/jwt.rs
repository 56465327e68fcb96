//! # JWT 令牌管理
//!
//! HS256 签发与校验。校验分三种结果：有效、已过期（签名正确）、损坏。

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TicketingError};
use crate::identity::Role;

/// 过期判断的时钟容差（秒）
pub const LEEWAY_SECS: i64 = 5;

/// 令牌声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    /// 用户编号的十进制字符串
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub role: Role,
}

impl TokenClaims {
    /// `sub` 解析出的正整数用户编号
    #[must_use]
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse::<i32>().ok().filter(|id| *id > 0)
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp + LEEWAY_SECS <= now.timestamp()
    }
}

/// 新签发的令牌
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
    pub expires_at: DateTime<Utc>,
}

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    Valid(TokenClaims),
    /// 签名正确但已过期
    Expired(TokenClaims),
    /// 无法解析、签名错误或签发者不符
    Corrupted(String),
}

/// JWT 管理器
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_secs: i64,
}

impl JwtManager {
    #[must_use]
    pub fn new(secret: &str, issuer: &str, ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // 过期在 inspect 中单独判断，以便区分过期与损坏
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            ttl_secs,
        }
    }

    /// 为用户签发令牌，`jti` 为 128 位随机数
    pub fn issue(&self, user_id: i32, role: Role) -> Result<IssuedToken> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            exp: now + self.ttl_secs,
            iat: now,
            jti: Uuid::new_v4().simple().to_string(),
            role,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TicketingError::internal_with_source("token signing failed", e))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
            claims,
        })
    }

    /// 校验签名与签发者，再判断是否过期
    #[must_use]
    pub fn inspect(&self, token: &str) -> Inspection {
        match decode::<TokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) if data.claims.is_expired_at(Utc::now()) => Inspection::Expired(data.claims),
            Ok(data) => Inspection::Valid(data.claims),
            Err(e) => Inspection::Corrupted(e.to_string()),
        }
    }
}

/// 不验签地读取声明
///
/// 只用于决定黑名单的保留时长，以及开发环境的身份解析。
#[must_use]
pub fn peek_claims(token: &str) -> Option<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-0123456789";

    fn manager(ttl: i64) -> JwtManager {
        JwtManager::new(SECRET, "http://idm.test", ttl)
    }

    #[test]
    fn issued_token_carries_expected_claims() {
        let issued = manager(3600).issue(42, Role::OwnerEvent).unwrap();
        assert_eq!(issued.claims.iss, "http://idm.test");
        assert_eq!(issued.claims.user_id(), Some(42));
        assert_eq!(issued.claims.exp - issued.claims.iat, 3600);
        assert_eq!(issued.claims.jti.len(), 32);
        assert_eq!(issued.claims.role, Role::OwnerEvent);

        let other = manager(3600).issue(42, Role::OwnerEvent).unwrap();
        assert_ne!(issued.claims.jti, other.claims.jti);
    }

    #[test]
    fn inspect_distinguishes_outcomes() {
        let manager = manager(3600);
        let issued = manager.issue(1, Role::Client).unwrap();
        assert!(matches!(manager.inspect(&issued.token), Inspection::Valid(_)));

        let expired = JwtManager::new(SECRET, "http://idm.test", -60)
            .issue(1, Role::Client)
            .unwrap();
        assert!(matches!(manager.inspect(&expired.token), Inspection::Expired(_)));

        let foreign = JwtManager::new("a-different-secret-value", "http://idm.test", 3600)
            .issue(1, Role::Client)
            .unwrap();
        assert!(matches!(manager.inspect(&foreign.token), Inspection::Corrupted(_)));

        let other_issuer = JwtManager::new(SECRET, "http://elsewhere", 3600)
            .issue(1, Role::Client)
            .unwrap();
        assert!(matches!(manager.inspect(&other_issuer.token), Inspection::Corrupted(_)));

        assert!(matches!(manager.inspect("garbage"), Inspection::Corrupted(_)));
    }

    #[test]
    fn tampered_signature_is_corrupted() {
        let manager = manager(3600);
        let issued = manager.issue(5, Role::Admin).unwrap();
        let signature_start = issued.token.rfind('.').unwrap() + 1;
        let first = issued.token.as_bytes()[signature_start];
        let replacement = if first == b'A' { "B" } else { "A" };
        let mut tampered = issued.token.clone();
        tampered.replace_range(signature_start..=signature_start, replacement);
        assert!(matches!(manager.inspect(&tampered), Inspection::Corrupted(_)));
        // 声明本身仍可读取
        assert_eq!(peek_claims(&tampered).and_then(|c| c.user_id()), Some(5));
    }

    #[test]
    fn leeway_keeps_just_expired_tokens_valid() {
        let claims = TokenClaims {
            iss: "x".into(),
            sub: "1".into(),
            exp: 1_000,
            iat: 0,
            jti: "j".into(),
            role: Role::Client,
        };
        let at = |secs| DateTime::from_timestamp(secs, 0).unwrap();
        assert!(!claims.is_expired_at(at(1_000 + LEEWAY_SECS - 1)));
        assert!(claims.is_expired_at(at(1_000 + LEEWAY_SECS)));
    }

    #[test]
    fn rejects_non_positive_subjects() {
        let mut claims = manager(10).issue(3, Role::Client).unwrap().claims;
        claims.sub = "0".into();
        assert_eq!(claims.user_id(), None);
        claims.sub = "abc".into();
        assert_eq!(claims.user_id(), None);
    }
}
