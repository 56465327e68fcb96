//! # 配置管理模块
//!
//! 必需参数来自环境变量，缺失即终止启动；非敏感的调优参数可以放在
//! `config/config.{RUST_ENV}.toml` 中。

mod app_config;
mod database;

pub use app_config::{
    AuthorizerKind, CommonConfig, Credentials, DatabaseTuning, EventManagerConfig, HttpTuning,
    IdentityProviderKind, IdmConfig, PaginationTuning, RelationshipStoreKind, ServiceAddress,
    TuningConfig, UserManagerConfig,
};
pub use database::DatabaseConfig;

use crate::error::{Result, TicketingError};
use crate::{config_error, linfo, logging::{LogComponent, LogStage}};
use serde::de::DeserializeOwned;
use std::env;
use std::path::Path;
use std::str::FromStr;

/// 环境变量读取器，查找函数可替换以便测试
pub struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub const fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// 读取变量，空字符串视为未设置
    pub fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<String> {
        self.optional(name).ok_or_else(|| {
            TicketingError::config(format!("missing required environment variable {name}"))
        })
    }

    pub fn parsed<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(name)?;
        parse_value(name, &raw)
    }

    pub fn parsed_or<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map_or(Ok(default), |raw| parse_value(name, &raw))
    }

    /// 读取小写枚举值
    pub fn choice<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let Some(raw) = self.optional(name) else {
            return Ok(None);
        };
        serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
            .map(Some)
            .map_err(|_| TicketingError::config(format!("unsupported value {raw:?} for {name}")))
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| {
        TicketingError::config(format!("invalid value {raw:?} for {name}: {e}"))
    })
}

/// 进程环境变量读取器
#[must_use]
pub fn process_env() -> EnvReader<impl Fn(&str) -> Option<String>> {
    EnvReader::new(|name: &str| env::var(name).ok())
}

/// 加载调优文件，文件不存在时使用默认值
pub fn load_tuning() -> Result<TuningConfig> {
    let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    load_tuning_from(&format!("config/config.{env_name}.toml"))
}

pub fn load_tuning_from(config_file: &str) -> Result<TuningConfig> {
    if !Path::new(config_file).exists() {
        return Ok(TuningConfig::default());
    }

    let content = std::fs::read_to_string(config_file).map_err(|e| {
        TicketingError::config_with_source(format!("failed to read {config_file}"), e)
    })?;
    let tuning: TuningConfig = toml::from_str(&content)?;
    validate_tuning(&tuning)?;

    linfo!(
        "system",
        LogStage::Configuration,
        LogComponent::Config,
        "load_tuning",
        &format!("已加载调优文件: {config_file}")
    );
    Ok(tuning)
}

/// 验证调优参数
fn validate_tuning(tuning: &TuningConfig) -> Result<()> {
    if tuning.pagination.default_per_page == 0 || tuning.pagination.max_per_page == 0 {
        return Err(config_error!("pagination sizes must be greater than 0"));
    }
    if tuning.pagination.default_per_page > tuning.pagination.max_per_page {
        return Err(config_error!(
            "default_per_page {} must not exceed max_per_page {}",
            tuning.pagination.default_per_page,
            tuning.pagination.max_per_page
        ));
    }
    if tuning.database.max_connections == 0 {
        return Err(config_error!("database max_connections must be greater than 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn reader(vars: &[(&str, &str)]) -> EnvReader<impl Fn(&str) -> Option<String>> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EnvReader::new(move |name: &str| map.get(name).cloned())
    }

    const EVENT_MANAGER_VARS: &[(&str, &str)] = &[
        ("DB_HOST", "db"),
        ("DB_USER", "events"),
        ("DB_PASSWORD", "secret"),
        ("DB_NAME", "events"),
        ("DB_PORT", "5432"),
        ("EVENT_MANAGER_HOST", "events.local"),
        ("EVENT_MANAGER_PORT", "8080"),
        ("IDM_HOST", "idm.local"),
        ("IDM_PORT", "50051"),
    ];

    #[test]
    fn builds_postgres_url_from_parts() {
        let config =
            EventManagerConfig::from_env(&reader(EVENT_MANAGER_VARS), TuningConfig::default())
                .unwrap();
        assert_eq!(
            config.common.database.url,
            "postgres://events:secret@db:5432/events"
        );
        assert_eq!(config.common.database.redacted_url(), "postgres://events:***@db:5432/events");
        assert_eq!(config.public.base_url(), "http://events.local:8080");
        assert_eq!(config.identity_provider, IdentityProviderKind::Idm);
        assert_eq!(config.common.outbound_timeout.as_secs(), 5);
    }

    #[test]
    fn missing_variable_is_named() {
        let vars: Vec<_> = EVENT_MANAGER_VARS
            .iter()
            .copied()
            .filter(|(name, _)| *name != "IDM_PORT")
            .collect();
        let err = EventManagerConfig::from_env(&reader(&vars), TuningConfig::default()).unwrap_err();
        assert!(matches!(err, TicketingError::Config { .. }));
        assert!(err.to_string().contains("IDM_PORT"));
    }

    #[test]
    fn unparsable_port_is_rejected() {
        let mut vars = EVENT_MANAGER_VARS.to_vec();
        vars.push(("EVENT_MANAGER_PORT", "eighty"));
        vars.retain(|(name, value)| *name != "EVENT_MANAGER_PORT" || *value == "eighty");
        let err = EventManagerConfig::from_env(&reader(&vars), TuningConfig::default()).unwrap_err();
        assert!(err.to_string().contains("EVENT_MANAGER_PORT"));
    }

    #[test]
    fn database_url_takes_precedence() {
        let env = reader(&[("DATABASE_URL", "sqlite::memory:"), ("DB_HOST", "ignored")]);
        let config = DatabaseConfig::from_env(&env).unwrap();
        assert!(config.is_sqlite());
        assert!(config.is_memory_database());
    }

    #[test]
    fn idm_requires_secret_and_service_account() {
        let base = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("IDM_HOST", "0.0.0.0"),
            ("IDM_PORT", "50051"),
            ("IDM_SERVICE_URL", "http://idm:50051"),
            ("USER_HOST", "users"),
            ("USER_PORT", "8081"),
            ("SERVICE_EMAIL", "svc@tickets.local"),
            ("SERVICE_PASSWORD", "svc-password"),
        ];
        let err = IdmConfig::from_env(&reader(&base), TuningConfig::default()).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let mut vars = base.to_vec();
        vars.push(("JWT_SECRET", "0123456789abcdef0123"));
        vars.push(("RELATIONSHIP_STORE", "Database"));
        let config = IdmConfig::from_env(&reader(&vars), TuningConfig::default()).unwrap();
        assert_eq!(config.token_ttl_secs, 3600);
        assert_eq!(config.relationship_store, RelationshipStoreKind::Database);
        assert!(config.admin_account.is_none());
        assert!(!format!("{:?}", config.service_account).contains("svc-password"));
    }

    #[test]
    fn unknown_choice_is_rejected() {
        let mut vars = EVENT_MANAGER_VARS.to_vec();
        vars.push(("AUTHORIZER", "everyone"));
        let err = EventManagerConfig::from_env(&reader(&vars), TuningConfig::default()).unwrap_err();
        assert!(err.to_string().contains("AUTHORIZER"));
    }

    #[test]
    fn tuning_file_is_optional_and_validated() {
        let tuning = load_tuning_from("config/does-not-exist.toml").unwrap();
        assert_eq!(tuning.pagination.max_per_page, 100);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.test.toml");
        std::fs::write(
            &path,
            "[pagination]\ndefault_per_page = 20\nmax_per_page = 50\n\n[http]\ncors_allowed_origins = [\"http://localhost:3000\"]\n",
        )
        .unwrap();
        let tuning = load_tuning_from(path.to_str().unwrap()).unwrap();
        assert_eq!(tuning.pagination.default_per_page, 20);
        assert_eq!(tuning.http.cors_allowed_origins.len(), 1);

        std::fs::write(&path, "[pagination]\ndefault_per_page = 500\nmax_per_page = 50\n").unwrap();
        assert!(load_tuning_from(path.to_str().unwrap()).is_err());
    }
}
