//! # IDM 用户实体定义
//!
//! 身份管理服务的账号表，保存邮箱、密码哈希与角色

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// IDM 用户实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "idm_users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// 取值: admin / owner-event / client / serviciu_clienti
    pub role: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
