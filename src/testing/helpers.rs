//! # 测试辅助函数
//!
//! 内存数据库、默认配置与 Event Manager 测试状态

use axum::body::{Body, to_bytes};
use axum::http::Request;
use axum::response::Response;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;

use super::fixtures::all_tokens;
use super::mocks::{MockTicketGateway, StaticIdentityProvider};
use crate::authorization::{Authorizer, RoleAuthorizer};
use crate::config::{
    CommonConfig, DatabaseConfig, PaginationTuning, ServiceAddress, TuningConfig,
};
use crate::database::{init_database, run_migrations};
use crate::event_manager::{EventManagerState, LinkBuilder};
use crate::user_manager::UserManagerState;
use migration::{EventManagerMigrator, IdmMigrator, UserManagerMigrator};

static INIT: Once = Once::new();

/// 初始化测试日志
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("warn,event_ticketing=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[must_use]
pub fn memory_database_config() -> DatabaseConfig {
    DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    }
}

/// 测试用的公共配置
#[must_use]
pub fn common_config() -> CommonConfig {
    CommonConfig {
        database: memory_database_config(),
        bind_address: "127.0.0.1".to_string(),
        request_timeout: Duration::from_secs(5),
        outbound_timeout: Duration::from_secs(2),
        log_level: None,
        tuning: TuningConfig::default(),
    }
}

/// 使用指定迁移器初始化一个内存数据库
pub async fn migrated_memory_db<M: MigratorTrait>() -> DatabaseConnection {
    init_test_env();
    let db = init_database(&memory_database_config())
        .await
        .expect("内存数据库连接失败");
    run_migrations::<M>(&db).await.expect("迁移失败");
    db
}

pub async fn idm_database() -> DatabaseConnection {
    migrated_memory_db::<IdmMigrator>().await
}

pub async fn event_manager_database() -> DatabaseConnection {
    migrated_memory_db::<EventManagerMigrator>().await
}

pub async fn user_manager_database() -> DatabaseConnection {
    migrated_memory_db::<UserManagerMigrator>().await
}

/// 临时文件数据库，多个连接共享同一份数据
pub async fn file_database<M: MigratorTrait>() -> (DatabaseConnection, TempDir) {
    init_test_env();
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let config = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display()),
        max_connections: 8,
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await.expect("数据库连接失败");
    run_migrations::<M>(&db).await.expect("迁移失败");
    (db, dir)
}

#[must_use]
pub fn test_links() -> LinkBuilder {
    LinkBuilder::new(&ServiceAddress {
        host: "events.test".to_string(),
        port: 8081,
    })
    .expect("测试地址无效")
}

/// 使用角色授权和固定令牌表的 Event Manager 状态
#[must_use]
pub fn event_manager_state(
    db: DatabaseConnection,
    identity: StaticIdentityProvider,
) -> EventManagerState {
    event_manager_state_with(db, identity, Arc::new(RoleAuthorizer))
}

#[must_use]
pub fn event_manager_state_with(
    db: DatabaseConnection,
    identity: StaticIdentityProvider,
    authorizer: Arc<dyn Authorizer>,
) -> EventManagerState {
    EventManagerState {
        db,
        identity: Arc::new(identity),
        authorizer,
        links: Arc::new(test_links()),
        pagination: PaginationTuning::default(),
    }
}

/// 预置全部测试令牌的 User Manager 状态
#[must_use]
pub fn user_manager_state(db: DatabaseConnection, tickets: MockTicketGateway) -> UserManagerState {
    UserManagerState {
        db,
        identity: Arc::new(all_tokens()),
        authorizer: Arc::new(RoleAuthorizer),
        tickets: Arc::new(tickets),
    }
}

/// 构造 JSON 请求
#[must_use]
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("请求构造失败")
}

/// 构造无请求体的请求
#[must_use]
pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("请求构造失败")
}

/// 读取响应体为 JSON
pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("读取响应体失败");
    serde_json::from_slice(&bytes).expect("响应体不是 JSON")
}
