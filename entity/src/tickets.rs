//! # 门票实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 门票实体，`code` 为对外暴露的不透明编号
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub event_id: Option<i32>,
    pub packet_id: Option<i32>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::events::Entity",
        from = "Column::EventId",
        to = "super::events::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Event,
    #[sea_orm(
        belongs_to = "super::event_packets::Entity",
        from = "Column::PacketId",
        to = "super::event_packets::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Packet,
}

impl Related<super::events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::event_packets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Packet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
