//! # 日志配置模块
//!
//! 初始化 tracing 订阅者，并提供带阶段与组件标签的结构化日志宏。

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Startup,
    Shutdown,
    Configuration,
    RequestStart,
    Authentication,
    Authorization,
    Validation,
    Db,
    Cache,
    ExternalApi,
    BackgroundTask,
    Response,
    Error,
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::RequestStart => "request_start",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Db => "db",
            Self::Cache => "cache",
            Self::ExternalApi => "external_api",
            Self::BackgroundTask => "background_task",
            Self::Response => "response",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    Main,
    Config,
    Database,
    ServerSetup,
    EventManager,
    Tickets,
    Idm,
    Jwt,
    Blacklist,
    Relationships,
    UserManager,
    Purchase,
    ServiceToken,
    Identity,
    Http,
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Database => "database",
            Self::ServerSetup => "server_setup",
            Self::EventManager => "event_manager",
            Self::Tickets => "tickets",
            Self::Idm => "idm",
            Self::Jwt => "jwt",
            Self::Blacklist => "blacklist",
            Self::Relationships => "relationships",
            Self::UserManager => "user_manager",
            Self::Purchase => "purchase",
            Self::ServiceToken => "service_token",
            Self::Identity => "identity",
            Self::Http => "http",
        };
        f.write_str(name)
    }
}

/// 结构化 info 日志：`linfo!(request_id, stage, component, operation, message)`
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 默认过滤规则：压低数据库查询日志
#[must_use]
pub fn default_filter(level: &str) -> String {
    format!("{level},event_ticketing=debug,sqlx::query=off,sea_orm::query=warn,sqlx=warn")
}

/// 初始化日志系统
///
/// 设置了 `RUST_LOG` 时以其为准，否则使用 [`default_filter`]。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| default_filter(level));

    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt_layer::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if result.is_ok() {
        crate::ldebug!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "init_logging",
            &format!("日志过滤规则: {log_filter}")
        );
    }
}
