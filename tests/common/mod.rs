//! 集成测试共用的数据库、身份与请求辅助

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use event_ticketing::Result;
use event_ticketing::authorization::RoleAuthorizer;
use event_ticketing::config::{DatabaseConfig, PaginationTuning, ServiceAddress};
use event_ticketing::database::{init_database, run_migrations};
use event_ticketing::error::TicketingError;
use event_ticketing::event_manager::{EventManagerState, LinkBuilder, create_routes};
use event_ticketing::identity::{IdentityProvider, Principal, Role};
use event_ticketing::idm::provisioning::{NewProfile, ProfileProvisioner};

pub const ADMIN: &str = "admin-token";
pub const OWNER: &str = "owner-token";
pub const OTHER_OWNER: &str = "other-owner-token";
pub const CLIENT: &str = "client-token";
pub const SERVICE: &str = "service-token";

/// 固定令牌表
pub struct TokenTable(HashMap<&'static str, Principal>);

impl TokenTable {
    pub fn standard() -> Self {
        Self(HashMap::from([
            (ADMIN, Principal::new(100, Role::Admin)),
            (OWNER, Principal::new(1, Role::OwnerEvent)),
            (OTHER_OWNER, Principal::new(2, Role::OwnerEvent)),
            (CLIENT, Principal::new(7, Role::Client)),
            (SERVICE, Principal::new(200, Role::ServiciuClienti)),
        ]))
    }
}

#[async_trait]
impl IdentityProvider for TokenTable {
    async fn verify(&self, token: &str) -> Result<Principal> {
        self.0
            .get(token)
            .cloned()
            .ok_or_else(|| TicketingError::unauthorized("unknown test token"))
    }
}

/// 不做任何事的档案创建
pub struct NoopProvisioner;

#[async_trait]
impl ProfileProvisioner for NoopProvisioner {
    async fn provision(&self, _profile: &NewProfile, _service_token: &str) -> Result<()> {
        Ok(())
    }
}

pub async fn memory_db<M: MigratorTrait>() -> DatabaseConnection {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await.expect("内存数据库连接失败");
    run_migrations::<M>(&db).await.expect("迁移失败");
    db
}

/// 多连接共享的临时文件数据库
pub async fn file_db<M: MigratorTrait>() -> (DatabaseConnection, TempDir) {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let config = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", dir.path().join("tickets.db").display()),
        max_connections: 8,
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await.expect("数据库连接失败");
    run_migrations::<M>(&db).await.expect("迁移失败");
    (db, dir)
}

pub fn event_manager_app(db: DatabaseConnection) -> Router {
    event_manager_app_with(db, Arc::new(TokenTable::standard()))
}

/// 使用指定身份实现的 Event Manager
pub fn event_manager_app_with(
    db: DatabaseConnection,
    identity: Arc<dyn IdentityProvider>,
) -> Router {
    let links = LinkBuilder::new(&ServiceAddress {
        host: "events.test".to_string(),
        port: 8081,
    })
    .expect("测试地址无效");
    create_routes(EventManagerState {
        db,
        identity,
        authorizer: Arc::new(RoleAuthorizer),
        links: Arc::new(links),
        pagination: PaginationTuning::default(),
    })
}

/// 发送请求并返回状态码与 JSON 响应体
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("请求构造失败");

    let response = app.clone().oneshot(request).await.expect("请求失败");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("读取响应体失败");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("响应体不是 JSON")
    };
    (status, json)
}

/// 创建一个实体并返回其 `id`
pub async fn create(app: &Router, uri: &str, body: Value) -> i32 {
    let (status, json) = call(app, "POST", uri, Some(ADMIN), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    i32::try_from(json["data"]["id"].as_i64().expect("响应缺少 id")).expect("id 越界")
}
