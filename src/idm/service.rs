//! # IDM 业务逻辑
//!
//! 注册、登录、令牌校验与吊销、关系写入与权限检查。

use chrono::Utc;
use entity::idm_users;
use regex::Regex;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::{Arc, LazyLock, OnceLock};
use std::time::Duration;

use super::blacklist::{BlacklistReason, TokenBlacklist};
use super::jwt::{Inspection, IssuedToken, JwtManager, peek_claims};
use super::messages::{
    CheckPermissionRequest, CheckPermissionResponse, LoginRequest, LoginResponse,
    ReadRelationshipsRequest, ReadRelationshipsResponse, RegisterRequest, RegisterResponse,
    RevokeTokenResponse, VerifiedToken, WriteRelationshipsRequest, WriteRelationshipsResponse,
};
use super::password::{hash_password, verify_password};
use super::provisioning::{NewProfile, ProfileProvisioner};
use super::relationships::{RelationshipStore, check_permission};
use crate::config::Credentials;
use crate::error::{Result, TicketingError};
use crate::identity::{Role, TokenStatus};
use crate::{internal_error, ldebug, lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 损坏令牌在黑名单中保留的时长
pub const CORRUPTED_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const INVALID_CREDENTIALS: &str = "invalid email or password";

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

fn validate_email(email: &str) -> Result<()> {
    let valid = email.len() <= 255
        && EMAIL_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(email));
    if valid {
        Ok(())
    } else {
        Err(TicketingError::validation("email", "email address is not valid"))
    }
}

/// 注册时可选的角色
fn registration_role(requested: Option<&str>) -> Result<Role> {
    match requested {
        None | Some("owner-event") => Ok(Role::OwnerEvent),
        Some("client") => Ok(Role::Client),
        Some(other) => Err(TicketingError::validation(
            "role",
            format!("role {other:?} cannot be self-assigned; use \"owner-event\" or \"client\""),
        )),
    }
}

/// 剩余有效期，至少一秒
fn remaining_life(exp: i64) -> Duration {
    let seconds = exp.saturating_sub(Utc::now().timestamp()).max(1);
    Duration::from_secs(u64::try_from(seconds).unwrap_or(1))
}

/// IDM 服务
pub struct IdmService {
    db: DatabaseConnection,
    jwt: JwtManager,
    blacklist: Arc<dyn TokenBlacklist>,
    relationships: Arc<dyn RelationshipStore>,
    provisioner: Arc<dyn ProfileProvisioner>,
    bcrypt_cost: u32,
    service_account_id: OnceLock<i32>,
}

impl IdmService {
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        jwt: JwtManager,
        blacklist: Arc<dyn TokenBlacklist>,
        relationships: Arc<dyn RelationshipStore>,
        provisioner: Arc<dyn ProfileProvisioner>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            db,
            jwt,
            blacklist,
            relationships,
            provisioner,
            bcrypt_cost,
            service_account_id: OnceLock::new(),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<idm_users::Model>> {
        Ok(idm_users::Entity::find()
            .filter(idm_users::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn insert_user(&self, email: &str, password: &str, role: Role) -> Result<idm_users::Model> {
        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let inserted = idm_users::ActiveModel {
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            role: Set(role.as_str().to_string()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await;

        match inserted {
            Ok(model) => Ok(model),
            // 并发注册同一邮箱时由唯一索引兜底
            Err(e) => match TicketingError::from(e) {
                TicketingError::Conflict { .. } => Err(duplicate_email()),
                other => Err(other),
            },
        }
    }

    /// 注册新用户并创建对应档案
    ///
    /// 档案创建失败时返回 `Internal`，账号保留。
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse> {
        let email = request.email.trim().to_lowercase();
        validate_email(&email)?;
        if request.password.is_empty() {
            return Err(TicketingError::validation("password", "password must not be empty"));
        }
        let role = registration_role(request.role.as_deref())?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(duplicate_email());
        }
        let user = self.insert_user(&email, &request.password, role).await?;
        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Idm,
            "register",
            &format!("新用户注册: id={} role={role}", user.id)
        );

        let profile = NewProfile {
            id: user.id,
            email: user.email.clone(),
        };
        let provisioned = match self.mint_service_token() {
            Ok(service_token) => self.provisioner.provision(&profile, &service_token.token).await,
            Err(e) => Err(e),
        };
        if let Err(e) = provisioned {
            lerror!(
                "system",
                LogStage::ExternalApi,
                LogComponent::Idm,
                "provision_fail",
                &format!("用户档案创建失败，账号 {} 已保留: {}", user.id, e.cause_chain())
            );
            return Err(TicketingError::internal_with_source(
                "user profile could not be created",
                e,
            ));
        }

        Ok(RegisterResponse {
            user_id: user.id,
            email: user.email,
            role,
        })
    }

    /// 邮箱与密码登录，错误信息不区分是哪一项错误
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let email = request.email.trim().to_lowercase();
        let Some(user) = self.find_by_email(&email).await? else {
            return Err(TicketingError::unauthorized(INVALID_CREDENTIALS));
        };
        if !verify_password(&request.password, &user.password_hash).await? {
            return Err(TicketingError::unauthorized(INVALID_CREDENTIALS));
        }

        let role = stored_role(&user)?;
        let issued = self.jwt.issue(user.id, role)?;
        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::Jwt,
            "login",
            &format!("签发令牌: user_id={} jti={}", user.id, issued.claims.jti)
        );
        Ok(LoginResponse {
            token: issued.token,
            user_id: user.id,
            role,
            expires_at: issued.expires_at,
        })
    }

    async fn blacklist_quietly(&self, token: &str, reason: BlacklistReason, ttl: Duration) {
        if let Err(e) = self.blacklist.add(token, reason, ttl).await {
            lwarn!(
                "system",
                LogStage::Cache,
                LogComponent::Blacklist,
                "blacklist_add_fail",
                &format!("写入黑名单失败: {}", e.cause_chain())
            );
        }
    }

    /// 依次判断：已拉黑、损坏、过期、有效
    pub async fn verify_token(&self, token: &str) -> Result<VerifiedToken> {
        if token.is_empty() {
            return Err(TicketingError::validation("token", "token must not be empty"));
        }
        if let Some(entry) = self.blacklist.lookup(token).await? {
            return Err(TicketingError::token(TokenStatus::Blacklisted, entry.reason.as_str()));
        }

        let claims = match self.jwt.inspect(token) {
            Inspection::Valid(claims) => claims,
            Inspection::Corrupted(detail) => {
                ldebug!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::Jwt,
                    "token_corrupted",
                    &format!("令牌无法通过校验: {detail}")
                );
                self.blacklist_quietly(token, BlacklistReason::Corrupted, CORRUPTED_TOKEN_TTL)
                    .await;
                return Err(TicketingError::token(
                    TokenStatus::Corrupted,
                    "token signature or format is invalid",
                ));
            }
            Inspection::Expired(claims) => {
                self.blacklist_quietly(token, BlacklistReason::Expired, remaining_life(claims.exp))
                    .await;
                return Err(TicketingError::token(TokenStatus::Expired, "token has expired"));
            }
        };

        let user_id = claims
            .user_id()
            .ok_or_else(|| TicketingError::unauthorized("token subject is not a user id"))?;
        let user = idm_users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| TicketingError::unauthorized("token subject no longer exists"))?;

        Ok(VerifiedToken {
            status: TokenStatus::Valid,
            user_id,
            role: claims.role,
            email: user.email,
            expires_at: claims.expires_at(),
            issuer: claims.iss,
            token_id: claims.jti,
        })
    }

    /// 吊销令牌，重复吊销同样成功
    pub async fn revoke_token(&self, token: &str) -> Result<RevokeTokenResponse> {
        if token.is_empty() {
            return Err(TicketingError::validation("token", "token must not be empty"));
        }
        match self.blacklist.contains(token).await {
            Ok(true) => return Ok(RevokeTokenResponse { revoked: true }),
            Ok(false) => {}
            Err(e) => lwarn!(
                "system",
                LogStage::Cache,
                LogComponent::Blacklist,
                "blacklist_lookup_fail",
                &format!("查询黑名单失败: {}", e.cause_chain())
            ),
        }

        let ttl = peek_claims(token).map_or(CORRUPTED_TOKEN_TTL, |claims| remaining_life(claims.exp));
        self.blacklist_quietly(token, BlacklistReason::Revoked, ttl).await;
        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Blacklist,
            "revoke",
            &format!("令牌已吊销，保留 {} 秒", ttl.as_secs())
        );
        Ok(RevokeTokenResponse { revoked: true })
    }

    pub async fn check_permission(
        &self,
        request: CheckPermissionRequest,
    ) -> Result<CheckPermissionResponse> {
        if request.permission.trim().is_empty() {
            return Err(TicketingError::validation("permission", "permission must not be empty"));
        }
        let allowed = check_permission(
            self.relationships.as_ref(),
            &request.resource,
            &request.permission,
            &request.subject,
        )
        .await?;
        Ok(CheckPermissionResponse { allowed })
    }

    pub async fn write_relationships(
        &self,
        request: WriteRelationshipsRequest,
    ) -> Result<WriteRelationshipsResponse> {
        if request.updates.is_empty() {
            return Err(TicketingError::validation("updates", "at least one update is required"));
        }
        self.relationships.write(&request.updates).await?;
        Ok(WriteRelationshipsResponse {
            written: request.updates.len(),
        })
    }

    pub async fn read_relationships(
        &self,
        request: ReadRelationshipsRequest,
    ) -> Result<ReadRelationshipsResponse> {
        if request.filter.resource_type.trim().is_empty() {
            return Err(TicketingError::validation(
                "filter.resource_type",
                "resource type must not be empty",
            ));
        }
        Ok(ReadRelationshipsResponse {
            relationships: self.relationships.read(&request.filter).await?,
        })
    }

    /// 确保账号存在，返回其编号；已存在时不修改密码
    pub async fn seed_account(&self, credentials: &Credentials, role: Role) -> Result<i32> {
        let email = credentials.email.trim().to_lowercase();
        validate_email(&email)?;
        if let Some(existing) = self.find_by_email(&email).await? {
            return Ok(existing.id);
        }
        let user = self.insert_user(&email, &credentials.password, role).await?;
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Idm,
            "seed_account",
            &format!("已创建 {role} 账号: id={}", user.id)
        );
        Ok(user.id)
    }

    /// 创建服务账号并记住其编号，供档案创建时签发令牌
    pub async fn seed_service_account(&self, credentials: &Credentials) -> Result<i32> {
        let id = self.seed_account(credentials, Role::ServiciuClienti).await?;
        if self.service_account_id.set(id).is_err() {
            let stored = self.service_account_id.get().copied();
            if stored != Some(id) {
                lerror!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Idm,
                    "seed_service_account",
                    &format!("服务账号已绑定为 {stored:?}，拒绝改为 {id}")
                );
                return Err(internal_error!(
                    "service account is already seeded as user {:?}, refusing user {}",
                    stored,
                    id
                ));
            }
        }
        Ok(id)
    }

    /// 为服务账号签发令牌
    pub fn mint_service_token(&self) -> Result<IssuedToken> {
        let id = self
            .service_account_id
            .get()
            .ok_or_else(|| TicketingError::internal("service account has not been seeded"))?;
        self.jwt.issue(*id, Role::ServiciuClienti)
    }
}

fn duplicate_email() -> TicketingError {
    TicketingError::validation("email", "email address is already registered")
}

fn stored_role(user: &idm_users::Model) -> Result<Role> {
    user.role.parse::<Role>().map_err(|e| {
        internal_error!("user {} has an unreadable role: {e}", user.id)
    })
}
