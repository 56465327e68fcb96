//! # 活动服务
//!
//! 活动的增删改查。修改座位数时在事务内重新统计售出与预留，
//! 删除活动时级联清理包含关系和门票引用。

use chrono::{DateTime, Utc};
use entity::{event_packet_inclusions, events};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use super::shared::{CatalogOrder, CatalogQuery, utc};
use crate::authorization::{Action, Target};
use crate::database::serializable;
use crate::domain::{check_new_entity, check_seat_change, validate_name, validate_seats};
use crate::error::{Result, TicketingError};
use crate::event_manager::links::{LinkBuilder, Links};
use crate::event_manager::repository;
use crate::event_manager::server::EventManagerState;
use crate::identity::Principal;
use crate::web::Pagination;
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 创建活动请求
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub owner_id: i32,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub seats: Option<i32>,
}

/// 部分更新请求
///
/// 可空字段用两层 `Option` 区分“未提供”与“置空”；`owner_id` 不可修改，
/// 出现即按未知字段拒绝。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEventRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub seats: Option<Option<i32>>,
}

impl UpdateEventRequest {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.location.is_none()
            && self.description.is_none()
            && self.seats.is_none()
    }
}

/// 活动响应
#[derive(Debug, Clone, Serialize)]
pub struct EventResponse {
    pub id: i32,
    pub owner_id: i32,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub seats: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl EventResponse {
    #[must_use]
    pub fn new(model: events::Model, links: &LinkBuilder) -> Self {
        Self {
            links: links.event(model.id),
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            location: model.location,
            description: model.description,
            seats: model.seats,
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
        }
    }
}

/// 活动服务
pub struct EventsService<'a> {
    state: &'a EventManagerState,
}

impl<'a> EventsService<'a> {
    #[must_use]
    pub const fn new(state: &'a EventManagerState) -> Self {
        Self { state }
    }

    fn respond(&self, model: events::Model) -> EventResponse {
        EventResponse::new(model, &self.state.links)
    }

    pub async fn list(&self, query: CatalogQuery) -> Result<(Vec<EventResponse>, Pagination)> {
        let page = query.page_request(&self.state.pagination)?;

        let mut select = events::Entity::find();
        if let Some(name) = &query.name {
            select = select.filter(events::Column::Name.contains(name));
        }
        if let Some(location) = &query.location {
            select = select.filter(events::Column::Location.contains(location));
        }
        if let Some(description) = &query.description {
            select = select.filter(events::Column::Description.contains(description));
        }
        if let Some(min) = query.min_seats {
            select = select.filter(events::Column::Seats.gte(min));
        }
        if let Some(max) = query.max_seats {
            select = select.filter(events::Column::Seats.lte(max));
        }
        select = match query.order_by {
            Some(CatalogOrder::NameAsc) => select.order_by_asc(events::Column::Name),
            Some(CatalogOrder::NameDesc) => select.order_by_desc(events::Column::Name),
            Some(CatalogOrder::SeatsAsc) => select.order_by_asc(events::Column::Seats),
            Some(CatalogOrder::SeatsDesc) => select.order_by_desc(events::Column::Seats),
            None => select,
        }
        .order_by_asc(events::Column::Id);

        let total = select.clone().count(&self.state.db).await?;
        let rows = select
            .offset(page.offset())
            .limit(page.per_page)
            .all(&self.state.db)
            .await?;

        let data = rows.into_iter().map(|model| self.respond(model)).collect();
        Ok((data, page.pagination(total)))
    }

    pub async fn get(&self, event_id: i32) -> Result<EventResponse> {
        let model = repository::find_event(&self.state.db, event_id).await?;
        Ok(self.respond(model))
    }

    pub async fn create(
        &self,
        principal: &Principal,
        request: CreateEventRequest,
    ) -> Result<EventResponse> {
        check_new_entity(request.owner_id, &request.name, "seats", request.seats)?;
        self.state.authorizer.authorize(
            principal,
            Action::Create,
            &Target::Event {
                owner_id: request.owner_id,
            },
        )?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                if repository::event_name_taken(txn, &request.name, None).await? {
                    return Err(TicketingError::already_exists("event", &request.name));
                }
                let now = Utc::now().naive_utc();
                let event = events::ActiveModel {
                    owner_id: Set(request.owner_id),
                    name: Set(request.name),
                    location: Set(request.location),
                    description: Set(request.description),
                    seats: Set(request.seats),
                    version: Set(0),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                Ok(event.insert(txn).await?)
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::EventManager,
            "event_created",
            &format!("活动已创建: id={} owner={}", model.id, model.owner_id)
        );
        Ok(self.respond(model))
    }

    pub async fn update(
        &self,
        principal: &Principal,
        event_id: i32,
        request: UpdateEventRequest,
    ) -> Result<EventResponse> {
        if request.is_empty() {
            return Err(TicketingError::invalid_request(
                "update must contain at least one field",
            ));
        }
        if let Some(name) = &request.name {
            validate_name(name)?;
        }
        if let Some(seats) = request.seats {
            validate_seats("seats", seats)?;
        }

        let current = repository::find_event(&self.state.db, event_id).await?;
        self.state.authorizer.authorize(
            principal,
            Action::Update,
            &Target::Event {
                owner_id: current.owner_id,
            },
        )?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                if !repository::bump_event(txn, event_id).await? {
                    return Err(TicketingError::not_found("event", event_id));
                }
                let event = repository::find_event(txn, event_id).await?;

                if let Some(seats) = request.seats {
                    let capacity = repository::event_capacity(txn, &event, None).await?;
                    check_seat_change(&capacity, seats)?;
                }
                if let Some(name) = &request.name {
                    if repository::event_name_taken(txn, name, Some(event_id)).await? {
                        return Err(TicketingError::already_exists("event", name));
                    }
                }

                let mut active: events::ActiveModel = event.into();
                if let Some(name) = request.name {
                    active.name = Set(name);
                }
                if let Some(location) = request.location {
                    active.location = Set(location);
                }
                if let Some(description) = request.description {
                    active.description = Set(description);
                }
                if let Some(seats) = request.seats {
                    active.seats = Set(seats);
                }
                active.updated_at = Set(Utc::now().naive_utc());
                Ok(active.update(txn).await?)
            })
        })
        .await?;

        Ok(self.respond(model))
    }

    /// 删除活动，返回被删除的实体
    pub async fn delete(&self, principal: &Principal, event_id: i32) -> Result<EventResponse> {
        let current = repository::find_event(&self.state.db, event_id).await?;
        self.state.authorizer.authorize(
            principal,
            Action::Delete,
            &Target::Event {
                owner_id: current.owner_id,
            },
        )?;

        let (model, detached, removed) = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                if !repository::bump_event(txn, event_id).await? {
                    return Err(TicketingError::not_found("event", event_id));
                }
                let event = repository::find_event(txn, event_id).await?;

                let packet_ids: Vec<i32> = event_packet_inclusions::Entity::find()
                    .filter(event_packet_inclusions::Column::EventId.eq(event_id))
                    .all(txn)
                    .await?
                    .into_iter()
                    .map(|inclusion| inclusion.packet_id)
                    .collect();
                let packets: Vec<Option<i32>> = packet_ids.into_iter().map(Some).collect();
                repository::lock_all(txn, &[], &packets).await?;

                event_packet_inclusions::Entity::delete_many()
                    .filter(event_packet_inclusions::Column::EventId.eq(event_id))
                    .exec(txn)
                    .await?;
                let detached = repository::detach_tickets_from_event(txn, event_id).await?;
                let removed = repository::delete_orphan_tickets(txn).await?;
                events::Entity::delete_by_id(event_id).exec(txn).await?;
                Ok((event, detached, removed))
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::EventManager,
            "event_deleted",
            &format!("活动已删除: id={event_id} 解除引用门票={detached} 删除门票={removed}")
        );
        Ok(self.respond(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_manager::services::shared::CatalogQuery;
    use crate::testing::{
        EventFixture, PacketFixture, admin, all_tokens, client, event_manager_database,
        event_manager_state, insert_inclusion, insert_ticket, owner, OWNER_ID,
    };
    use entity::tickets;
    use serde_json::json;

    fn seats(value: Option<i32>) -> UpdateEventRequest {
        UpdateEventRequest {
            seats: Some(value),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_seat_shrink_reports_sold_and_allocated() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let event = EventFixture::new("Gala").seats(2).insert(&state.db).await;
        let packet = PacketFixture::new("VIP").insert(&state.db).await;
        insert_inclusion(&state.db, event.id, packet.id, 2).await;
        insert_ticket(&state.db, Some(event.id), Some(packet.id), 2).await;
        insert_ticket(&state.db, Some(event.id), Some(packet.id), 1).await;
        let events = EventsService::new(&state);

        let err = events.update(&owner(), event.id, seats(Some(1))).await.unwrap_err();
        assert!(matches!(err, TicketingError::Conflict { .. }));
        assert_eq!(err.field(), Some("seats"));
        let details = err.details().unwrap();
        assert_eq!(details["counts"]["sold"], json!(2));
        assert_eq!(details["counts"]["allocated"], json!(2));

        // 清空座位数即不限量
        let unbounded = events.update(&owner(), event.id, seats(None)).await.unwrap();
        assert_eq!(unbounded.seats, None);
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        EventFixture::new("Gala").insert(&state.db).await;
        let expo = EventFixture::new("Expo").insert(&state.db).await;
        let events = EventsService::new(&state);

        let err = events
            .create(
                &owner(),
                CreateEventRequest {
                    owner_id: OWNER_ID,
                    name: "Gala".into(),
                    location: None,
                    description: None,
                    seats: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::AlreadyExists { .. }));

        let rename = UpdateEventRequest {
            name: Some("Gala".into()),
            ..Default::default()
        };
        assert!(events.update(&owner(), expo.id, rename).await.is_err());
    }

    #[tokio::test]
    async fn test_owner_cannot_create_for_someone_else() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let request = CreateEventRequest {
            owner_id: OWNER_ID + 1,
            name: "Gala".into(),
            location: None,
            description: None,
            seats: Some(10),
        };
        let err = EventsService::new(&state)
            .create(&owner(), request.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Forbidden { .. }));
        assert!(EventsService::new(&state).create(&client(), request).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_inclusions_and_tickets() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let event = EventFixture::new("Gala").insert(&state.db).await;
        let packet = PacketFixture::new("VIP").insert(&state.db).await;
        insert_inclusion(&state.db, event.id, packet.id, 4).await;
        insert_ticket(&state.db, Some(event.id), None, 3).await;
        let shared = insert_ticket(&state.db, Some(event.id), Some(packet.id), 2).await;

        let deleted = EventsService::new(&state).delete(&admin(), event.id).await.unwrap();
        assert_eq!(deleted.id, event.id);

        let left = tickets::Entity::find().all(&state.db).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].code, shared.code);
        assert_eq!(left[0].event_id, None);
        assert_eq!(left[0].packet_id, Some(packet.id));
        assert!(
            repository::find_inclusion(&state.db, event.id, packet.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        EventFixture::new("Gala").seats(50).location("Cluj").insert(&state.db).await;
        EventFixture::new("Expo").seats(10).location("Iasi").insert(&state.db).await;
        EventFixture::new("Fair").insert(&state.db).await;

        let query: CatalogQuery =
            serde_json::from_value(json!({ "min_seats": 5, "order_by": "seats_desc" })).unwrap();
        let (events, pagination) = EventsService::new(&state).list(query).await.unwrap();
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Gala", "Expo"]);
        assert_eq!(pagination.total, 2);

        let query: CatalogQuery =
            serde_json::from_value(json!({ "location": "Clu", "per_page": 1 })).unwrap();
        let (events, pagination) = EventsService::new(&state).list(query).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(pagination.pages, 1);
    }
}
