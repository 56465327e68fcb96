//! # 套票服务

use chrono::{DateTime, Utc};
use entity::{event_packet_inclusions, event_packets};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use super::shared::{CatalogOrder, CatalogQuery, utc};
use crate::authorization::{Action, Target};
use crate::database::serializable;
use crate::domain::{check_new_entity, validate_name, validate_seats};
use crate::error::{Result, TicketingError};
use crate::event_manager::links::{LinkBuilder, Links};
use crate::event_manager::repository;
use crate::event_manager::server::EventManagerState;
use crate::identity::Principal;
use crate::web::Pagination;
use crate::{linfo, logging::{LogComponent, LogStage}};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePacketRequest {
    pub owner_id: i32,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// 提示值，不参与容量计算
    #[serde(default)]
    pub allocated_seats: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePacketRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub allocated_seats: Option<Option<i32>>,
}

impl UpdatePacketRequest {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.location.is_none()
            && self.description.is_none()
            && self.allocated_seats.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PacketResponse {
    pub id: i32,
    pub owner_id: i32,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub allocated_seats: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl PacketResponse {
    #[must_use]
    pub fn new(model: event_packets::Model, links: &LinkBuilder) -> Self {
        Self {
            links: links.packet(model.id),
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            location: model.location,
            description: model.description,
            allocated_seats: model.allocated_seats,
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
        }
    }
}

/// 套票服务
pub struct PacketsService<'a> {
    state: &'a EventManagerState,
}

impl<'a> PacketsService<'a> {
    #[must_use]
    pub const fn new(state: &'a EventManagerState) -> Self {
        Self { state }
    }

    fn respond(&self, model: event_packets::Model) -> PacketResponse {
        PacketResponse::new(model, &self.state.links)
    }

    /// 列表，`min_seats` / `max_seats` 作用于 `allocated_seats`
    pub async fn list(&self, query: CatalogQuery) -> Result<(Vec<PacketResponse>, Pagination)> {
        let page = query.page_request(&self.state.pagination)?;

        let mut select = event_packets::Entity::find();
        if let Some(name) = &query.name {
            select = select.filter(event_packets::Column::Name.contains(name));
        }
        if let Some(location) = &query.location {
            select = select.filter(event_packets::Column::Location.contains(location));
        }
        if let Some(description) = &query.description {
            select = select.filter(event_packets::Column::Description.contains(description));
        }
        if let Some(min) = query.min_seats {
            select = select.filter(event_packets::Column::AllocatedSeats.gte(min));
        }
        if let Some(max) = query.max_seats {
            select = select.filter(event_packets::Column::AllocatedSeats.lte(max));
        }
        select = match query.order_by {
            Some(CatalogOrder::NameAsc) => select.order_by_asc(event_packets::Column::Name),
            Some(CatalogOrder::NameDesc) => select.order_by_desc(event_packets::Column::Name),
            Some(CatalogOrder::SeatsAsc) => {
                select.order_by_asc(event_packets::Column::AllocatedSeats)
            }
            Some(CatalogOrder::SeatsDesc) => {
                select.order_by_desc(event_packets::Column::AllocatedSeats)
            }
            None => select,
        }
        .order_by_asc(event_packets::Column::Id);

        let total = select.clone().count(&self.state.db).await?;
        let rows = select
            .offset(page.offset())
            .limit(page.per_page)
            .all(&self.state.db)
            .await?;

        let data = rows.into_iter().map(|model| self.respond(model)).collect();
        Ok((data, page.pagination(total)))
    }

    pub async fn get(&self, packet_id: i32) -> Result<PacketResponse> {
        let model = repository::find_packet(&self.state.db, packet_id).await?;
        Ok(self.respond(model))
    }

    pub async fn create(
        &self,
        principal: &Principal,
        request: CreatePacketRequest,
    ) -> Result<PacketResponse> {
        check_new_entity(
            request.owner_id,
            &request.name,
            "allocated_seats",
            request.allocated_seats,
        )?;
        self.state.authorizer.authorize(
            principal,
            Action::Create,
            &Target::Packet {
                owner_id: request.owner_id,
            },
        )?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                if repository::packet_name_taken(txn, &request.name, None).await? {
                    return Err(TicketingError::already_exists("event packet", &request.name));
                }
                let now = Utc::now().naive_utc();
                let packet = event_packets::ActiveModel {
                    owner_id: Set(request.owner_id),
                    name: Set(request.name),
                    location: Set(request.location),
                    description: Set(request.description),
                    allocated_seats: Set(request.allocated_seats),
                    version: Set(0),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                Ok(packet.insert(txn).await?)
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::EventManager,
            "packet_created",
            &format!("套票已创建: id={} owner={}", model.id, model.owner_id)
        );
        Ok(self.respond(model))
    }

    pub async fn update(
        &self,
        principal: &Principal,
        packet_id: i32,
        request: UpdatePacketRequest,
    ) -> Result<PacketResponse> {
        if request.is_empty() {
            return Err(TicketingError::invalid_request(
                "update must contain at least one field",
            ));
        }
        if let Some(name) = &request.name {
            validate_name(name)?;
        }
        if let Some(allocated_seats) = request.allocated_seats {
            validate_seats("allocated_seats", allocated_seats)?;
        }

        let current = repository::find_packet(&self.state.db, packet_id).await?;
        self.state.authorizer.authorize(
            principal,
            Action::Update,
            &Target::Packet {
                owner_id: current.owner_id,
            },
        )?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                if !repository::bump_packet(txn, packet_id).await? {
                    return Err(TicketingError::not_found("event packet", packet_id));
                }
                let packet = repository::find_packet(txn, packet_id).await?;
                if let Some(name) = &request.name {
                    if repository::packet_name_taken(txn, name, Some(packet_id)).await? {
                        return Err(TicketingError::already_exists("event packet", name));
                    }
                }

                let mut active: event_packets::ActiveModel = packet.into();
                if let Some(name) = request.name {
                    active.name = Set(name);
                }
                if let Some(location) = request.location {
                    active.location = Set(location);
                }
                if let Some(description) = request.description {
                    active.description = Set(description);
                }
                if let Some(allocated_seats) = request.allocated_seats {
                    active.allocated_seats = Set(allocated_seats);
                }
                active.updated_at = Set(Utc::now().naive_utc());
                Ok(active.update(txn).await?)
            })
        })
        .await?;

        Ok(self.respond(model))
    }

    /// 删除套票，返回被删除的实体
    pub async fn delete(&self, principal: &Principal, packet_id: i32) -> Result<PacketResponse> {
        let current = repository::find_packet(&self.state.db, packet_id).await?;
        self.state.authorizer.authorize(
            principal,
            Action::Delete,
            &Target::Packet {
                owner_id: current.owner_id,
            },
        )?;

        let (model, detached, removed) = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                if !repository::bump_packet(txn, packet_id).await? {
                    return Err(TicketingError::not_found("event packet", packet_id));
                }
                let packet = repository::find_packet(txn, packet_id).await?;

                event_packet_inclusions::Entity::delete_many()
                    .filter(event_packet_inclusions::Column::PacketId.eq(packet_id))
                    .exec(txn)
                    .await?;
                let detached = repository::detach_tickets_from_packet(txn, packet_id).await?;
                let removed = repository::delete_orphan_tickets(txn).await?;
                event_packets::Entity::delete_by_id(packet_id).exec(txn).await?;
                Ok((packet, detached, removed))
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::EventManager,
            "packet_deleted",
            &format!("套票已删除: id={packet_id} 解除引用门票={detached} 删除门票={removed}")
        );
        Ok(self.respond(model))
    }
}
