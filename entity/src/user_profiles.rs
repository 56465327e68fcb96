//! # 用户档案实体定义
//!
//! 用户管理服务的档案表，`id` 与 IDM 用户编号一致

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户档案实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "user_profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// 已购门票列表，JSON 数组 `[{code, event_id, packet_id}]`
    #[sea_orm(column_type = "Json")]
    pub ticket_list: Json,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
