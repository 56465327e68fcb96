//! 注册成功后在 User Manager 中创建对应的用户档案

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{Result, TicketingError};
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 新档案的内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: i32,
    pub email: String,
}

/// 档案创建端口
#[async_trait]
pub trait ProfileProvisioner: Send + Sync {
    async fn provision(&self, profile: &NewProfile, service_token: &str) -> Result<()>;
}

/// 通过 `POST /api/user-manager/users` 创建档案
pub struct HttpProfileProvisioner {
    client: Client,
    endpoint: Url,
}

impl HttpProfileProvisioner {
    pub fn new(user_manager_base: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(user_manager_base)
            .and_then(|base| base.join("/api/user-manager/users"))
            .map_err(|e| {
                TicketingError::config_with_source(
                    format!("invalid user manager address {user_manager_base:?}"),
                    e,
                )
            })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TicketingError::config_with_source("failed to build HTTP client", e))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ProfileProvisioner for HttpProfileProvisioner {
    async fn provision(&self, profile: &NewProfile, service_token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(service_token)
            .json(profile)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                ldebug!(
                    "system",
                    LogStage::ExternalApi,
                    LogComponent::Idm,
                    "provision_ok",
                    &format!("用户档案已创建: id={}", profile.id)
                );
                Ok(())
            }
            StatusCode::CONFLICT => Err(TicketingError::already_exists("profile", profile.id)),
            status => Err(TicketingError::network(format!(
                "user manager answered {status} while creating profile {}",
                profile.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn profile() -> NewProfile {
        NewProfile {
            id: 3,
            email: "a@b.c".into(),
        }
    }

    #[tokio::test]
    async fn posts_profile_with_service_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user-manager/users"))
            .and(header("authorization", "Bearer svc-token"))
            .and(body_json(serde_json::json!({ "id": 3, "email": "a@b.c" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let provisioner = HttpProfileProvisioner::new(&server.uri(), Duration::from_secs(2)).unwrap();
        provisioner.provision(&profile(), "svc-token").await.unwrap();
    }

    #[tokio::test]
    async fn upstream_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provisioner = HttpProfileProvisioner::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = provisioner.provision(&profile(), "t").await.unwrap_err();
        assert!(matches!(err, TicketingError::Network { .. }));
    }
}
