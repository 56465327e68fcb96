//! # 用户档案服务
//!
//! 档案编号与 IDM 用户编号一致，由 IDM 在注册后通过服务账号创建。

use chrono::{DateTime, Utc};
use entity::user_profiles;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

use crate::authorization::{Action, Target};
use crate::database::serializable;
use crate::error::{Result, TicketingError};
use crate::identity::Principal;
use crate::user_manager::server::UserManagerState;
use crate::{ensure_validation, linfo, logging::{LogComponent, LogStage}};

/// 档案中记录的已购门票
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedTicket {
    pub code: String,
    pub event_id: Option<i32>,
    pub packet_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProfileRequest {
    pub id: i32,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub last_name: Option<Option<String>>,
}

impl UpdateProfileRequest {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none() && self.first_name.is_none() && self.last_name.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub id: i32,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub ticket_list: Vec<PurchasedTicket>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<user_profiles::Model> for ProfileResponse {
    type Error = TicketingError;

    fn try_from(model: user_profiles::Model) -> Result<Self> {
        Ok(Self {
            ticket_list: ticket_list(&model)?,
            id: model.id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            created_at: model.created_at.and_utc(),
            updated_at: model.updated_at.and_utc(),
        })
    }
}

/// 解析档案中的门票列表
pub fn ticket_list(model: &user_profiles::Model) -> Result<Vec<PurchasedTicket>> {
    serde_json::from_value(model.ticket_list.clone()).map_err(|e| {
        TicketingError::internal_with_source(
            format!("profile {} has an unreadable ticket list", model.id),
            e,
        )
    })
}

pub async fn find_profile<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<user_profiles::Model> {
    user_profiles::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| TicketingError::not_found("profile", user_id))
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    ensure_validation!(
        !email.is_empty() && email.contains('@'),
        "email",
        "email must be a non-empty address"
    );
    Ok(())
}

async fn email_taken<C: ConnectionTrait>(conn: &C, email: &str, except: Option<i32>) -> Result<bool> {
    let mut query = user_profiles::Entity::find().filter(user_profiles::Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(user_profiles::Column::Id.ne(id));
    }
    Ok(query.count(conn).await? > 0)
}

/// 档案服务
pub struct ProfilesService<'a> {
    state: &'a UserManagerState,
}

impl<'a> ProfilesService<'a> {
    #[must_use]
    pub const fn new(state: &'a UserManagerState) -> Self {
        Self { state }
    }

    pub async fn get(&self, principal: &Principal, user_id: i32) -> Result<ProfileResponse> {
        self.state.authorizer.authorize(
            principal,
            Action::Read,
            &Target::Profile { user_id },
        )?;
        find_profile(&self.state.db, user_id).await?.try_into()
    }

    pub async fn create(
        &self,
        principal: &Principal,
        request: CreateProfileRequest,
    ) -> Result<ProfileResponse> {
        ensure_validation!(request.id > 0, "id", "id must be positive, got {}", request.id);
        validate_email(&request.email)?;
        self.state.authorizer.authorize(
            principal,
            Action::Create,
            &Target::Profile {
                user_id: request.id,
            },
        )?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                if user_profiles::Entity::find_by_id(request.id)
                    .one(txn)
                    .await?
                    .is_some()
                {
                    return Err(TicketingError::already_exists("profile", request.id));
                }
                if email_taken(txn, &request.email, None).await? {
                    return Err(TicketingError::already_exists("profile", &request.email));
                }
                let now = Utc::now().naive_utc();
                let profile = user_profiles::ActiveModel {
                    id: Set(request.id),
                    email: Set(request.email),
                    first_name: Set(request.first_name),
                    last_name: Set(request.last_name),
                    ticket_list: Set(serde_json::json!([])),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                Ok(profile.insert(txn).await?)
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::UserManager,
            "profile_created",
            &format!("用户档案已创建: id={}", model.id)
        );
        model.try_into()
    }

    pub async fn update(
        &self,
        principal: &Principal,
        user_id: i32,
        request: UpdateProfileRequest,
    ) -> Result<ProfileResponse> {
        if request.is_empty() {
            return Err(TicketingError::invalid_request(
                "update must contain at least one field",
            ));
        }
        if let Some(email) = &request.email {
            validate_email(email)?;
        }
        self.state.authorizer.authorize(
            principal,
            Action::Update,
            &Target::Profile { user_id },
        )?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                let profile = find_profile(txn, user_id).await?;
                if let Some(email) = &request.email {
                    if email_taken(txn, email, Some(user_id)).await? {
                        return Err(TicketingError::already_exists("profile", email));
                    }
                }

                let mut active: user_profiles::ActiveModel = profile.into();
                if let Some(email) = request.email {
                    active.email = Set(email);
                }
                if let Some(first_name) = request.first_name {
                    active.first_name = Set(first_name);
                }
                if let Some(last_name) = request.last_name {
                    active.last_name = Set(last_name);
                }
                active.updated_at = Set(Utc::now().naive_utc());
                Ok(active.update(txn).await?)
            })
        })
        .await?;

        model.try_into()
    }

    /// 删除档案，返回被删除的内容
    pub async fn delete(&self, principal: &Principal, user_id: i32) -> Result<ProfileResponse> {
        self.state.authorizer.authorize(
            principal,
            Action::Delete,
            &Target::Profile { user_id },
        )?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                let profile = find_profile(txn, user_id).await?;
                user_profiles::Entity::delete_by_id(user_id).exec(txn).await?;
                Ok(profile)
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::UserManager,
            "profile_deleted",
            &format!("用户档案已删除: id={user_id}")
        );
        model.try_into()
    }
}
