//! # 数据库配置

use super::EnvReader;
use crate::error::{Result, TicketingError};
use crate::{linfo, logging::{LogComponent, LogStage}};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
    /// 获取连接超时时间（秒）
    pub acquire_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/ticketing.db?mode=rwc".to_string(),
            max_connections: 10,
            connect_timeout: 5,
            acquire_timeout: 5,
        }
    }
}

impl DatabaseConfig {
    /// 从环境变量读取连接参数
    ///
    /// `DATABASE_URL` 优先；否则必须同时提供 `DB_HOST`、`DB_USER`、
    /// `DB_PASSWORD`、`DB_NAME`、`DB_PORT`，拼成 PostgreSQL 连接串。
    pub fn from_env<F>(env: &EnvReader<F>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = match env.optional("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = env.required("DB_HOST")?;
                let user = env.required("DB_USER")?;
                let password = env.required("DB_PASSWORD")?;
                let name = env.required("DB_NAME")?;
                let port: u16 = env.parsed("DB_PORT")?;
                format!("postgres://{user}:{password}@{host}:{port}/{name}")
            }
        };
        Ok(Self {
            url,
            ..Self::default()
        })
    }

    /// 确保数据库路径存在（仅对SQLite文件数据库）
    pub fn ensure_database_path(&self) -> Result<()> {
        if !self.is_sqlite() || self.is_memory_database() {
            return Ok(());
        }

        let path_str = self
            .url
            .strip_prefix("sqlite://")
            .unwrap_or(&self.url)
            .split('?')
            .next()
            .unwrap_or_default();
        let db_path = Path::new(path_str);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TicketingError::config_with_source(
                        format!("cannot create database directory {}", parent.display()),
                        e,
                    )
                })?;
                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Database,
                    "create_db_dir",
                    &format!("创建数据库目录: {}", parent.display())
                );
            }
        }
        Ok(())
    }

    /// 检查是否为内存数据库
    #[must_use]
    pub fn is_memory_database(&self) -> bool {
        self.url.contains(":memory:")
    }

    /// 检查是否为SQLite数据库
    #[must_use]
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// 去掉密码后的连接串，用于日志
    #[must_use]
    pub fn redacted_url(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(mut parsed) if parsed.password().is_some() => {
                let _ = parsed.set_password(Some("***"));
                parsed.to_string()
            }
            _ => self.url.clone(),
        }
    }
}
