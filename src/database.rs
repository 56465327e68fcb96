//! # 数据库模块
//!
//! 数据库连接、按服务的迁移，以及可串行化的写事务。

use futures::future::BoxFuture;
use sea_orm::{
    AccessMode, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction,
    DbBackend, IsolationLevel, TransactionError, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{Context, Result, TicketingError};
use crate::{ldebug, lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "connect",
        &format!("正在连接数据库: {}", config.redacted_url())
    );
    config.ensure_database_path()?;

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .sqlx_logging(false);
    // 内存库每个连接都是独立的数据库
    if config.is_memory_database() {
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options)
        .await
        .map_err(|e| TicketingError::database_with_source("failed to connect to database", e))?;

    linfo!("system", LogStage::Startup, LogComponent::Database, "connect_ok", "数据库连接成功");
    Ok(db)
}

/// 运行某个服务的迁移
pub async fn run_migrations<M: MigratorTrait>(db: &DatabaseConnection) -> Result<()> {
    if check_database_status::<M>(db).await? == 0 {
        return Ok(());
    }
    linfo!("system", LogStage::Startup, LogComponent::Database, "migrate", "开始运行数据库迁移...");

    match M::up(db, None).await {
        Ok(()) => {
            linfo!("system", LogStage::Startup, LogComponent::Database, "migrate_ok", "数据库迁移完成");
            Ok(())
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "migrate_fail",
                &format!("数据库迁移失败: {e}")
            );
            Err(TicketingError::database_with_source("migration failed", e))
        }
    }
}

/// 检查是否有未应用的迁移
pub async fn check_database_status<M: MigratorTrait>(db: &DatabaseConnection) -> Result<usize> {
    let pending = M::get_pending_migrations(db)
        .await
        .context("reading migration status")?;
    if pending.is_empty() {
        ldebug!("system", LogStage::Startup, LogComponent::Database, "status", "所有迁移都已应用");
    } else {
        lwarn!(
            "system",
            LogStage::Startup,
            LogComponent::Database,
            "status",
            &format!("有 {} 个待应用的迁移", pending.len())
        );
    }
    Ok(pending.len())
}

/// 在可串行化事务中执行写操作
///
/// 闭包返回错误时回滚；数据库因并发冲突中止事务时返回
/// `Conflict`（并发修改）。SQLite 不支持设置隔离级别，会忽略该参数，
/// 写入之间由数据库级写锁串行化。
pub async fn serializable<T, F>(db: &DatabaseConnection, work: F) -> Result<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T>> + Send,
{
    let (isolation, access) = match db.get_database_backend() {
        DbBackend::Sqlite => (None, None),
        _ => (Some(IsolationLevel::Serializable), Some(AccessMode::ReadWrite)),
    };

    db.transaction_with_config::<_, T, TicketingError>(work, isolation, access)
    .await
    .map_err(|err| match err {
        TransactionError::Connection(db_err) => TicketingError::from(db_err),
        TransactionError::Transaction(inner) => inner,
    })
}

/// 健康检查使用的连通性探测
pub async fn ping(db: &DatabaseConnection) -> Result<()> {
    db.ping().await.map_err(TicketingError::from)
}
