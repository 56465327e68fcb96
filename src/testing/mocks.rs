//! # 测试替身
//!
//! 身份验证、档案创建与门票下单端口的替身实现

use async_trait::async_trait;
use mockall::mock;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::TicketCode;
use crate::error::{Result, TicketingError};
use crate::event_manager::services::tickets::TicketBody;
use crate::identity::{IdentityProvider, Principal};
use crate::idm::provisioning::{NewProfile, ProfileProvisioner};
use crate::user_manager::event_client::TicketGateway;

/// 固定令牌表的身份验证
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Principal>,
}

impl StaticIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, token: &str, principal: Principal) -> Self {
        self.tokens.insert(token.to_string(), principal);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Principal> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| TicketingError::unauthorized("unknown test token"))
    }
}

/// 记录所有档案创建请求
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    profiles: Mutex<Vec<NewProfile>>,
    fail: bool,
}

impl RecordingProvisioner {
    /// 每次调用都失败
    #[must_use]
    pub fn failing() -> Self {
        Self {
            profiles: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// 已成功创建的档案
    #[must_use]
    pub fn profiles(&self) -> Vec<NewProfile> {
        self.profiles
            .lock()
            .map(|profiles| profiles.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProfileProvisioner for RecordingProvisioner {
    async fn provision(&self, profile: &NewProfile, service_token: &str) -> Result<()> {
        if self.fail {
            return Err(TicketingError::network("user manager unavailable"));
        }
        if service_token.is_empty() {
            return Err(TicketingError::unauthorized("missing service token"));
        }
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.push(profile.clone());
        }
        Ok(())
    }
}

mock! {
    /// 门票下单端口
    pub TicketGateway {}

    #[async_trait]
    impl TicketGateway for TicketGateway {
        async fn place_ticket(&self, code: TicketCode, body: TicketBody) -> Result<()>;
    }
}
