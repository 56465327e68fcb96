//! # 套票包含关系实体定义
//!
//! 记录某个套票在某个活动上预留的座位数

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 套票包含关系实体，主键为 `(event_id, packet_id)`
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "event_packet_inclusions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub packet_id: i32,
    pub allocated_seats: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::events::Entity",
        from = "Column::EventId",
        to = "super::events::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Event,
    #[sea_orm(
        belongs_to = "super::event_packets::Entity",
        from = "Column::PacketId",
        to = "super::event_packets::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
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
