//! # 错误类型定义

use axum::http::StatusCode;
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Violation, ViolationKind};
use crate::identity::TokenStatus;

/// 服务端错误对客户端统一展示的消息
pub const GENERIC_INTERNAL_MESSAGE: &str = "internal server error";

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum TicketingError {
    /// 配置相关错误
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 调用兄弟服务失败
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 黑名单存储错误
    #[error("cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 序列化/反序列化错误
    #[error("serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 请求格式错误（JSON、查询参数、路径参数）
    #[error("{message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    /// 字段级校验失败
    #[error("{reason}")]
    Validation { field: String, reason: String },

    /// 缺少或无法识别的凭证
    #[error("{reason}")]
    Unauthorized { reason: String },

    /// 令牌被拒绝，携带令牌状态
    #[error("token is {status}: {reason}")]
    Token { status: TokenStatus, reason: String },

    /// 已认证但无权执行
    #[error("{message}")]
    Forbidden { message: String },

    #[error("{resource_type} {identifier} not found")]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("{resource_type} {identifier} already exists")]
    AlreadyExists {
        resource_type: String,
        identifier: String,
    },

    /// 一致性规则会被破坏
    #[error("{reason}")]
    Conflict {
        reason: String,
        field: Option<String>,
        details: Option<Value>,
    },

    /// 带上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TicketingError>,
    },
}

/// RPC 状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcCode {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Unavailable,
    Internal,
}

impl RpcCode {
    /// 标准的 RPC 到 HTTP 状态映射
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::FailedPrecondition => StatusCode::CONFLICT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl TicketingError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Database { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::Network { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Cache { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR"),
            Self::Internal { .. } | Self::Io { .. } | Self::Serialization { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            Self::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Unauthorized { .. } | Self::Token { .. } => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            Self::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    #[must_use]
    pub fn rpc_code(&self) -> RpcCode {
        match self {
            Self::InvalidRequest { .. } | Self::Validation { .. } => RpcCode::InvalidArgument,
            Self::Unauthorized { .. } | Self::Token { .. } => RpcCode::Unauthenticated,
            Self::Forbidden { .. } => RpcCode::PermissionDenied,
            Self::NotFound { .. } => RpcCode::NotFound,
            Self::AlreadyExists { .. } => RpcCode::AlreadyExists,
            Self::Conflict { .. } => RpcCode::FailedPrecondition,
            Self::Network { .. } => RpcCode::Unavailable,
            Self::Context { source, .. } => source.rpc_code(),
            _ => RpcCode::Internal,
        }
    }

    /// 是否属于服务端错误（5xx）
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.to_http_response_parts().0.is_server_error()
    }

    /// 去掉所有上下文包装后的错误
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// 对客户端展示的消息，5xx 不泄露内部细节
    #[must_use]
    pub fn client_message(&self) -> String {
        match self.root() {
            Self::Network { .. } => "upstream service unavailable".to_string(),
            root if root.is_server_error() => GENERIC_INTERNAL_MESSAGE.to_string(),
            root => root.to_string(),
        }
    }

    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self.root() {
            Self::InvalidRequest { field, .. } | Self::Conflict { field, .. } => field.as_deref(),
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        match self.root() {
            Self::Conflict { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn token_status(&self) -> Option<TokenStatus> {
        match self.root() {
            Self::Token { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 完整的错误链，用于日志
    #[must_use]
    pub fn cause_chain(&self) -> String {
        let mut chain = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            chain.push_str(" <- ");
            chain.push_str(&cause.to_string());
            current = cause.source();
        }
        chain
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn network<T: Into<String>>(message: T) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn cache_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn invalid_request<T: Into<String>>(message: T) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            field: None,
        }
    }

    /// 指明出错字段的请求格式错误
    pub fn invalid_field<F: Into<String>, T: Into<String>>(field: F, message: T) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn validation<F: Into<String>, T: Into<String>>(field: F, reason: T) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unauthorized<T: Into<String>>(reason: T) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn token<T: Into<String>>(status: TokenStatus, reason: T) -> Self {
        Self::Token {
            status,
            reason: reason.into(),
        }
    }

    pub fn forbidden<T: Into<String>>(message: T) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found<R: Into<String>, I: ToString>(resource_type: R, identifier: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.to_string(),
        }
    }

    pub fn already_exists<R: Into<String>, I: ToString>(resource_type: R, identifier: I) -> Self {
        Self::AlreadyExists {
            resource_type: resource_type.into(),
            identifier: identifier.to_string(),
        }
    }

    pub fn conflict<T: Into<String>>(reason: T) -> Self {
        Self::Conflict {
            reason: reason.into(),
            field: None,
            details: None,
        }
    }

    /// 并发事务冲突
    #[must_use]
    pub fn concurrent_modification() -> Self {
        Self::Conflict {
            reason: "concurrent modification, retry the request".to_string(),
            field: None,
            details: Some(serde_json::json!({ "violation": "ConcurrentModification" })),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for TicketingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for TicketingError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("failed to parse TOML", err)
    }
}

impl From<serde_json::Error> for TicketingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON processing failed".to_string(),
            source: Some(err.into()),
        }
    }
}

impl From<DbErr> for TicketingError {
    fn from(err: DbErr) -> Self {
        if is_serialization_failure(&err) {
            return Self::concurrent_modification();
        }
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::Conflict {
                reason: "unique constraint violated".to_string(),
                field: None,
                details: Some(serde_json::json!({ "constraint": detail })),
            };
        }
        match err {
            DbErr::RecordNotFound(what) => Self::NotFound {
                resource_type: "record".to_string(),
                identifier: what,
            },
            other => Self::database_with_source("database operation failed", other),
        }
    }
}

impl From<redis::RedisError> for TicketingError {
    fn from(err: redis::RedisError) -> Self {
        Self::cache_with_source("redis operation failed", err)
    }
}

impl From<reqwest::Error> for TicketingError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_with_source("outbound HTTP request failed", err)
    }
}

impl From<bcrypt::BcryptError> for TicketingError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal_with_source("password hashing failed", err)
    }
}

impl From<jsonwebtoken::errors::Error> for TicketingError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::token(TokenStatus::Expired, "token has expired"),
            _ => Self::token(TokenStatus::Corrupted, err.to_string()),
        }
    }
}

impl From<Violation> for TicketingError {
    fn from(violation: Violation) -> Self {
        match violation.kind() {
            ViolationKind::Validation => Self::Validation {
                field: violation.field().to_string(),
                reason: violation.to_string(),
            },
            ViolationKind::Conflict => Self::Conflict {
                field: Some(violation.field().to_string()),
                details: violation.details(),
                reason: violation.to_string(),
            },
        }
    }
}

/// 事务因并发冲突被数据库中止
///
/// PostgreSQL 报告 SQLSTATE 40001/40P01，SQLite 报告 BUSY/LOCKED。
#[must_use]
pub fn is_serialization_failure(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Conn(runtime) | DbErr::Exec(runtime) | DbErr::Query(runtime) => runtime,
        _ => return false,
    };
    let RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db)) = runtime else {
        return false;
    };
    db.code()
        .is_some_and(|code| matches!(code.as_ref(), "40001" | "40P01" | "5" | "6" | "517"))
}
