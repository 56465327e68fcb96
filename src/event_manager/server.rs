//! # Event Manager 启动
//!
//! 应用状态持有数据库连接、身份验证端口、授权端口和链接生成器。

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::links::LinkBuilder;
use super::routes::create_routes;
use crate::authorization::{Authorizer, build_authorizer};
use crate::config::{EventManagerConfig, PaginationTuning};
use crate::database::{init_database, run_migrations};
use crate::error::Result;
use crate::identity::{IdentityProvider, build_identity_provider};
use crate::web::server::{bind, serve, with_common_layers};
use crate::web::{HasDatabase, HasIdentity};
use crate::{linfo, logging::{LogComponent, LogStage}};
use migration::EventManagerMigrator;

/// Event Manager 应用状态
#[derive(Clone)]
pub struct EventManagerState {
    pub db: DatabaseConnection,
    pub identity: Arc<dyn IdentityProvider>,
    pub authorizer: Arc<dyn Authorizer>,
    pub links: Arc<LinkBuilder>,
    pub pagination: PaginationTuning,
}

impl HasIdentity for EventManagerState {
    fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }
}

impl HasDatabase for EventManagerState {
    fn database(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl EventManagerState {
    /// 按配置组装状态，数据库由调用方提供
    pub fn from_config(config: &EventManagerConfig, db: DatabaseConnection) -> Result<Self> {
        Ok(Self {
            db,
            identity: build_identity_provider(
                config.identity_provider,
                &config.idm,
                config.common.outbound_timeout,
            )?,
            authorizer: build_authorizer(config.authorizer),
            links: Arc::new(LinkBuilder::new(&config.public)?),
            pagination: config.common.tuning.pagination,
        })
    }
}

/// 构建带公共中间件的路由
pub async fn build_router(config: &EventManagerConfig) -> Result<Router> {
    let db = init_database(&config.common.database).await?;
    run_migrations::<EventManagerMigrator>(&db).await?;
    let state = EventManagerState::from_config(config, db)?;
    Ok(with_common_layers(create_routes(state), &config.common))
}

/// 运行 Event Manager，直到 `shutdown` 被取消
pub async fn run(config: EventManagerConfig, shutdown: CancellationToken) -> Result<()> {
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::EventManager,
        "starting",
        &format!(
            "Event Manager 启动中: public={} identity={:?} authorizer={:?}",
            config.public.base_url(),
            config.identity_provider,
            config.authorizer
        )
    );
    let router = build_router(&config).await?;
    let listener = bind(&config.common.bind_address, config.public.port).await?;
    serve(listener, router, shutdown, "event-manager").await
}
