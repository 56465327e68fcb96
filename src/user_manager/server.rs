//! # User Manager 启动

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::event_client::{EventManagerClient, TicketGateway};
use super::routes::create_routes;
use super::service_token::ServiceTokenCache;
use crate::authorization::{Authorizer, build_authorizer};
use crate::config::UserManagerConfig;
use crate::database::{init_database, run_migrations};
use crate::error::Result;
use crate::identity::{IdentityProvider, build_identity_provider};
use crate::idm::IdmClient;
use crate::web::server::{bind, serve, with_common_layers};
use crate::web::{HasDatabase, HasIdentity};
use crate::{linfo, logging::{LogComponent, LogStage}};
use migration::UserManagerMigrator;

/// User Manager 应用状态
#[derive(Clone)]
pub struct UserManagerState {
    pub db: DatabaseConnection,
    pub identity: Arc<dyn IdentityProvider>,
    pub authorizer: Arc<dyn Authorizer>,
    pub tickets: Arc<dyn TicketGateway>,
}

impl HasIdentity for UserManagerState {
    fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }
}

impl HasDatabase for UserManagerState {
    fn database(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl UserManagerState {
    pub fn from_config(config: &UserManagerConfig, db: DatabaseConnection) -> Result<Self> {
        let timeout = config.common.outbound_timeout;
        let idm = IdmClient::new(&config.idm.base_url(), timeout)?;
        let tokens = Arc::new(ServiceTokenCache::new(idm, config.service_account.clone()));
        let tickets = EventManagerClient::new(&config.event_manager.base_url(), timeout, tokens)?;

        Ok(Self {
            db,
            identity: build_identity_provider(config.identity_provider, &config.idm, timeout)?,
            authorizer: build_authorizer(config.authorizer),
            tickets: Arc::new(tickets),
        })
    }
}

pub async fn build_router(config: &UserManagerConfig) -> Result<Router> {
    let db = init_database(&config.common.database).await?;
    run_migrations::<UserManagerMigrator>(&db).await?;
    let state = UserManagerState::from_config(config, db)?;
    Ok(with_common_layers(create_routes(state), &config.common))
}

/// 运行 User Manager，直到 `shutdown` 被取消
pub async fn run(config: UserManagerConfig, shutdown: CancellationToken) -> Result<()> {
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::UserManager,
        "starting",
        &format!(
            "User Manager 启动中: idm={} event_manager={} service_account={}",
            config.idm.base_url(),
            config.event_manager.base_url(),
            config.service_account.email
        )
    );
    let router = build_router(&config).await?;
    let listener = bind(&config.common.bind_address, config.listen.port).await?;
    serve(listener, router, shutdown, "user-manager").await
}
