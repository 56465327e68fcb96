//! # 身份验证端口
//!
//! 写操作需要先把 Bearer 令牌解析为 [`Principal`]。端口有三种实现：
//! 远程 IDM、不验签的开发用解码器、进程内 IDM（测试用）。

mod providers;

pub use providers::{
    IdmIdentityProvider, LocalIdentityProvider, UnverifiedJwtIdentityProvider,
    build_identity_provider,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;

/// 令牌状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Valid,
    Blacklisted,
    Corrupted,
    Expired,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::Blacklisted => "blacklisted",
            Self::Corrupted => "corrupted",
            Self::Expired => "expired",
        })
    }
}

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "owner-event")]
    OwnerEvent,
    #[serde(rename = "client")]
    Client,
    /// 客服账号，也是服务间调用使用的身份
    #[serde(rename = "serviciu_clienti")]
    ServiciuClienti,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::OwnerEvent => "owner-event",
            Self::Client => "client",
            Self::ServiciuClienti => "serviciu_clienti",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "owner-event" => Ok(Self::OwnerEvent),
            "client" => Ok(Self::Client),
            "serviciu_clienti" => Ok(Self::ServiciuClienti),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

/// 已认证的请求方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i32,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Principal {
    #[must_use]
    pub const fn new(user_id: i32, role: Role) -> Self {
        Self {
            user_id,
            role,
            email: None,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

/// 身份验证端口
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 验证令牌并返回请求方；令牌无效时返回 `Unauthorized` 或 `Token` 错误
    async fn verify(&self, token: &str) -> Result<Principal>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        for role in [Role::Admin, Role::OwnerEvent, Role::Client, Role::ServiciuClienti] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn token_status_is_lowercase() {
        assert_eq!(
            serde_json::to_value(TokenStatus::Blacklisted).unwrap(),
            "blacklisted"
        );
        assert_eq!(TokenStatus::Corrupted.to_string(), "corrupted");
    }
}
