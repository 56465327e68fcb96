//! # 活动实体定义
//!
//! 活动（Event）表的 Sea-ORM 实体模型

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 活动实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub owner_id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    /// 座位容量，为空表示不限
    pub seats: Option<i32>,
    /// 乐观并发版本号，每次涉及容量的写操作都会递增
    pub version: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event_packet_inclusions::Entity")]
    EventPacketInclusions,
    #[sea_orm(has_many = "super::tickets::Entity")]
    Tickets,
}

impl Related<super::event_packet_inclusions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventPacketInclusions.def()
    }
}

impl Related<super::tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
