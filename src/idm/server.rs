//! IDM 服务启动

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::blacklist::build_blacklist;
use super::jwt::JwtManager;
use super::provisioning::HttpProfileProvisioner;
use super::relationships::{DatabaseRelationshipStore, MemoryRelationshipStore, RelationshipStore};
use super::rpc::{IdmState, rpc_router};
use super::service::IdmService;
use crate::config::{IdmConfig, RelationshipStoreKind};
use crate::database::{init_database, run_migrations};
use crate::error::Result;
use crate::identity::Role;
use crate::web::server::{bind, serve, with_common_layers};
use crate::{linfo, logging::{LogComponent, LogStage}};
use migration::IdmMigrator;

/// 组装 IDM 服务并写入种子账号
pub async fn build_service(
    config: &IdmConfig,
    db: DatabaseConnection,
    shutdown: CancellationToken,
) -> Result<Arc<IdmService>> {
    let blacklist = build_blacklist(config.redis_url.as_deref(), shutdown).await?;
    let relationships: Arc<dyn RelationshipStore> = match config.relationship_store {
        RelationshipStoreKind::Memory => Arc::new(MemoryRelationshipStore::new()),
        RelationshipStoreKind::Database => Arc::new(DatabaseRelationshipStore::new(db.clone())),
    };
    let provisioner = Arc::new(HttpProfileProvisioner::new(
        &config.user_manager.base_url(),
        config.common.outbound_timeout,
    )?);

    let service = IdmService::new(
        db,
        JwtManager::new(&config.jwt_secret, &config.issuer, config.token_ttl_secs),
        blacklist,
        relationships,
        provisioner,
        config.bcrypt_cost,
    );

    service.seed_service_account(&config.service_account).await?;
    if let Some(admin) = &config.admin_account {
        service.seed_account(admin, Role::Admin).await?;
    }
    Ok(Arc::new(service))
}

/// 构建带公共中间件的 IDM 路由
pub async fn build_router(config: &IdmConfig, shutdown: CancellationToken) -> Result<Router> {
    let db = init_database(&config.common.database).await?;
    run_migrations::<IdmMigrator>(&db).await?;
    let service = build_service(config, db.clone(), shutdown).await?;
    Ok(with_common_layers(
        rpc_router(IdmState { service, db }),
        &config.common,
    ))
}

/// 运行 IDM，直到 `shutdown` 被取消
pub async fn run(config: IdmConfig, shutdown: CancellationToken) -> Result<()> {
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Idm,
        "starting",
        &format!(
            "IDM 启动中: issuer={} relationship_store={:?} blacklist={}",
            config.issuer,
            config.relationship_store,
            if config.redis_url.is_some() { "redis" } else { "memory" }
        )
    );
    let router = build_router(&config, shutdown.clone()).await?;
    let listener = bind(&config.common.bind_address, config.listen.port).await?;
    serve(listener, router, shutdown, "idm").await
}
