//! # 应用配置结构定义
//!
//! 三个服务各有一份配置，公共部分放在 [`CommonConfig`]。

use super::{DatabaseConfig, EnvReader};
use crate::error::{Result, TicketingError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 服务地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
}

impl ServiceAddress {
    pub fn from_env<F>(env: &EnvReader<F>, host_var: &str, port_var: &str) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: env.required(host_var)?,
            port: env.parsed(port_var)?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// 账号凭证
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// 身份验证实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderKind {
    /// 调用 IDM 的 `VerifyToken`
    #[default]
    Idm,
    /// 只解码令牌、不校验签名，仅用于开发
    Dummy,
}

/// 授权实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizerKind {
    #[default]
    Roles,
    Permissive,
}

/// 关系元组存储
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStoreKind {
    #[default]
    Memory,
    Database,
}

/// 可选的调优文件 `config/config.{RUST_ENV}.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub http: HttpTuning,
    pub pagination: PaginationTuning,
    pub database: DatabaseTuning,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTuning {
    /// 空列表表示允许任意来源
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationTuning {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl Default for PaginationTuning {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            max_per_page: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseTuning {
    pub max_connections: u32,
    pub connect_timeout: u64,
    pub acquire_timeout: u64,
}

impl Default for DatabaseTuning {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            max_connections: defaults.max_connections,
            connect_timeout: defaults.connect_timeout,
            acquire_timeout: defaults.acquire_timeout,
        }
    }
}

/// 三个服务共用的配置
#[derive(Debug, Clone)]
pub struct CommonConfig {
    pub database: DatabaseConfig,
    pub bind_address: String,
    pub request_timeout: Duration,
    pub outbound_timeout: Duration,
    pub log_level: Option<String>,
    pub tuning: TuningConfig,
}

impl CommonConfig {
    pub fn from_env<F>(env: &EnvReader<F>, tuning: TuningConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut database = DatabaseConfig::from_env(env)?;
        database.max_connections = tuning.database.max_connections;
        database.connect_timeout = tuning.database.connect_timeout;
        database.acquire_timeout = tuning.database.acquire_timeout;

        Ok(Self {
            database,
            bind_address: env
                .optional("BIND_ADDRESS")
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            request_timeout: Duration::from_secs(env.parsed_or("REQUEST_TIMEOUT_SECS", 10)?),
            outbound_timeout: Duration::from_secs(env.parsed_or("OUTBOUND_TIMEOUT_SECS", 5)?),
            log_level: env.optional("LOG_LEVEL"),
            tuning,
        })
    }
}

/// Event Manager 配置
#[derive(Debug, Clone)]
pub struct EventManagerConfig {
    pub common: CommonConfig,
    /// 对外地址，也用于生成超链接
    pub public: ServiceAddress,
    pub idm: ServiceAddress,
    pub identity_provider: IdentityProviderKind,
    pub authorizer: AuthorizerKind,
}

impl EventManagerConfig {
    pub fn from_env<F>(env: &EnvReader<F>, tuning: TuningConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            common: CommonConfig::from_env(env, tuning)?,
            public: ServiceAddress::from_env(env, "EVENT_MANAGER_HOST", "EVENT_MANAGER_PORT")?,
            idm: ServiceAddress::from_env(env, "IDM_HOST", "IDM_PORT")?,
            identity_provider: env.choice("IDENTITY_PROVIDER")?.unwrap_or_default(),
            authorizer: env.choice("AUTHORIZER")?.unwrap_or_default(),
        })
    }
}

/// IDM 配置
#[derive(Debug, Clone)]
pub struct IdmConfig {
    pub common: CommonConfig,
    pub listen: ServiceAddress,
    /// JWT 的 `iss`
    pub issuer: String,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub bcrypt_cost: u32,
    pub service_account: Credentials,
    pub admin_account: Option<Credentials>,
    pub redis_url: Option<String>,
    pub relationship_store: RelationshipStoreKind,
    pub user_manager: ServiceAddress,
}

impl IdmConfig {
    pub fn from_env<F>(env: &EnvReader<F>, tuning: TuningConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = env.required("JWT_SECRET")?;
        if jwt_secret.len() < 16 {
            return Err(TicketingError::config(
                "JWT_SECRET must be at least 16 characters",
            ));
        }

        let admin_account = match (env.optional("IDM_ADMIN_EMAIL"), env.optional("IDM_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            (None, None) => None,
            _ => {
                return Err(TicketingError::config(
                    "IDM_ADMIN_EMAIL and IDM_ADMIN_PASSWORD must be set together",
                ));
            }
        };

        let bcrypt_cost = env.parsed_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(TicketingError::config("BCRYPT_COST must be between 4 and 31"));
        }

        Ok(Self {
            common: CommonConfig::from_env(env, tuning)?,
            listen: ServiceAddress::from_env(env, "IDM_HOST", "IDM_PORT")?,
            issuer: env.required("IDM_SERVICE_URL")?,
            jwt_secret,
            token_ttl_secs: env.parsed_or("TOKEN_TTL_SECS", 3600)?,
            bcrypt_cost,
            service_account: Credentials {
                email: env.required("SERVICE_EMAIL")?,
                password: env.required("SERVICE_PASSWORD")?,
            },
            admin_account,
            redis_url: env.optional("REDIS_URL"),
            relationship_store: env.choice("RELATIONSHIP_STORE")?.unwrap_or_default(),
            user_manager: ServiceAddress::from_env(env, "USER_HOST", "USER_PORT")?,
        })
    }
}

/// User Manager 配置
#[derive(Debug, Clone)]
pub struct UserManagerConfig {
    pub common: CommonConfig,
    pub listen: ServiceAddress,
    pub idm: ServiceAddress,
    pub event_manager: ServiceAddress,
    pub service_account: Credentials,
    pub identity_provider: IdentityProviderKind,
    pub authorizer: AuthorizerKind,
}

impl UserManagerConfig {
    pub fn from_env<F>(env: &EnvReader<F>, tuning: TuningConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            common: CommonConfig::from_env(env, tuning)?,
            listen: ServiceAddress::from_env(env, "USER_HOST", "USER_PORT")?,
            idm: ServiceAddress::from_env(env, "IDM_HOST", "IDM_PORT")?,
            event_manager: ServiceAddress::from_env(env, "EVENT_MANAGER_HOST", "EVENT_MANAGER_PORT")?,
            service_account: Credentials {
                email: env.required("SERVICE_EMAIL")?,
                password: env.required("SERVICE_PASSWORD")?,
            },
            identity_provider: env.choice("IDENTITY_PROVIDER")?.unwrap_or_default(),
            authorizer: env.choice("AUTHORIZER")?.unwrap_or_default(),
        })
    }
}
