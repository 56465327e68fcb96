//! # 包含关系服务
//!
//! 套票在活动上的座位预留。新建与修改都要满足两个条件：活动剩余座位足够，
//! 且预留不低于套票已售数量。删除时默认拒绝仍被门票引用的包含关系，
//! `cascade_tickets` 为真时改为删除相关门票。

use entity::event_packet_inclusions;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::authorization::{Action, Target};
use crate::database::serializable;
use crate::domain::{Violation, check_allocation, check_inclusion_removal, excess_after_removal};
use crate::error::{Result, TicketingError};
use crate::event_manager::links::{LinkBuilder, Links};
use crate::event_manager::repository;
use crate::event_manager::server::EventManagerState;
use crate::identity::Principal;
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInclusionRequest {
    pub event_id: i32,
    pub packet_id: i32,
    #[serde(default)]
    pub allocated_seats: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateInclusionRequest {
    pub allocated_seats: i32,
}

/// 删除包含关系的查询参数
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteInclusionQuery {
    #[serde(default)]
    pub cascade_tickets: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InclusionResponse {
    pub event_id: i32,
    pub packet_id: i32,
    pub allocated_seats: i32,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl InclusionResponse {
    #[must_use]
    pub fn new(model: event_packet_inclusions::Model, links: &LinkBuilder) -> Self {
        Self {
            links: links.inclusion(model.event_id, model.packet_id),
            event_id: model.event_id,
            packet_id: model.packet_id,
            allocated_seats: model.allocated_seats,
        }
    }
}

/// 删除结果，附带级联删除的门票数量
#[derive(Debug, Clone, Serialize)]
pub struct DeletedInclusion {
    #[serde(flatten)]
    pub inclusion: InclusionResponse,
    pub deleted_tickets: u64,
}

/// 包含关系服务
pub struct InclusionsService<'a> {
    state: &'a EventManagerState,
}

impl<'a> InclusionsService<'a> {
    #[must_use]
    pub const fn new(state: &'a EventManagerState) -> Self {
        Self { state }
    }

    fn respond(&self, model: event_packet_inclusions::Model) -> InclusionResponse {
        InclusionResponse::new(model, &self.state.links)
    }

    /// 读取两侧所有者，用于授权
    async fn owners(&self, event_id: i32, packet_id: i32) -> Result<Target> {
        let event = repository::find_event(&self.state.db, event_id).await?;
        let packet = repository::find_packet(&self.state.db, packet_id).await?;
        Ok(Target::Inclusion {
            event_owner: event.owner_id,
            packet_owner: packet.owner_id,
        })
    }

    pub async fn get(&self, event_id: i32, packet_id: i32) -> Result<InclusionResponse> {
        repository::find_inclusion(&self.state.db, event_id, packet_id)
            .await?
            .map(|model| self.respond(model))
            .ok_or_else(|| inclusion_not_found(event_id, packet_id))
    }

    /// 某活动包含的全部套票
    pub async fn list_for_event(&self, event_id: i32) -> Result<Vec<InclusionResponse>> {
        repository::find_event(&self.state.db, event_id).await?;
        let rows = event_packet_inclusions::Entity::find()
            .filter(event_packet_inclusions::Column::EventId.eq(event_id))
            .order_by_asc(event_packet_inclusions::Column::PacketId)
            .all(&self.state.db)
            .await?;
        Ok(rows.into_iter().map(|model| self.respond(model)).collect())
    }

    /// 某套票包含的全部活动
    pub async fn list_for_packet(&self, packet_id: i32) -> Result<Vec<InclusionResponse>> {
        repository::find_packet(&self.state.db, packet_id).await?;
        let rows = event_packet_inclusions::Entity::find()
            .filter(event_packet_inclusions::Column::PacketId.eq(packet_id))
            .order_by_asc(event_packet_inclusions::Column::EventId)
            .all(&self.state.db)
            .await?;
        Ok(rows.into_iter().map(|model| self.respond(model)).collect())
    }

    pub async fn create(
        &self,
        principal: &Principal,
        request: CreateInclusionRequest,
    ) -> Result<InclusionResponse> {
        let CreateInclusionRequest {
            event_id,
            packet_id,
            allocated_seats,
        } = request;
        let allocated_seats = allocated_seats.unwrap_or(0);
        if allocated_seats < 0 {
            return Err(Violation::NegativeSeats {
                field: "allocated_seats",
            }
            .into());
        }

        let event = repository::referenced_event(&self.state.db, event_id).await?;
        let packet = repository::referenced_packet(&self.state.db, packet_id).await?;
        self.state.authorizer.authorize(
            principal,
            Action::Create,
            &Target::Inclusion {
                event_owner: event.owner_id,
                packet_owner: packet.owner_id,
            },
        )?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                if !repository::bump_event(txn, event_id).await? {
                    return Err(Violation::UnknownEvent { event_id }.into());
                }
                if !repository::bump_packet(txn, packet_id).await? {
                    return Err(Violation::UnknownPacket { packet_id }.into());
                }
                if repository::find_inclusion(txn, event_id, packet_id)
                    .await?
                    .is_some()
                {
                    return Err(TicketingError::already_exists(
                        "inclusion",
                        format!("event {event_id} / packet {packet_id}"),
                    ));
                }

                let event = repository::find_event(txn, event_id).await?;
                let event_capacity = repository::event_capacity(txn, &event, None).await?;
                let packet_capacity = repository::packet_capacity(txn, packet_id, None).await?;
                check_allocation(&event_capacity, 0, packet_capacity.sold, allocated_seats)?;

                let inclusion = event_packet_inclusions::ActiveModel {
                    event_id: Set(event_id),
                    packet_id: Set(packet_id),
                    allocated_seats: Set(allocated_seats),
                };
                Ok(inclusion.insert(txn).await?)
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::EventManager,
            "inclusion_created",
            &format!("包含关系已创建: event={event_id} packet={packet_id} seats={allocated_seats}")
        );
        Ok(self.respond(model))
    }

    pub async fn update(
        &self,
        principal: &Principal,
        event_id: i32,
        packet_id: i32,
        request: UpdateInclusionRequest,
    ) -> Result<InclusionResponse> {
        let requested = request.allocated_seats;
        repository::find_inclusion(&self.state.db, event_id, packet_id)
            .await?
            .ok_or_else(|| inclusion_not_found(event_id, packet_id))?;
        let target = self.owners(event_id, packet_id).await?;
        self.state
            .authorizer
            .authorize(principal, Action::Update, &target)?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                repository::lock_all(txn, &[Some(event_id)], &[Some(packet_id)]).await?;
                let inclusion = repository::find_inclusion(txn, event_id, packet_id)
                    .await?
                    .ok_or_else(|| inclusion_not_found(event_id, packet_id))?;

                let event = repository::find_event(txn, event_id).await?;
                let event_capacity = repository::event_capacity(txn, &event, None).await?;
                let packet_capacity = repository::packet_capacity(txn, packet_id, None).await?;
                check_allocation(
                    &event_capacity,
                    i64::from(inclusion.allocated_seats),
                    packet_capacity.sold,
                    requested,
                )?;

                let mut active: event_packet_inclusions::ActiveModel = inclusion.into();
                active.allocated_seats = Set(requested);
                Ok(active.update(txn).await?)
            })
        })
        .await?;

        Ok(self.respond(model))
    }

    /// 删除包含关系
    ///
    /// 不级联时，存在同时引用两侧的门票，或删除后套票销量超过剩余最小预留，
    /// 都会拒绝。级联时先删除 `(E,P)` 门票，再按售出时间从新到旧删除
    /// 超出部分的套票门票。
    pub async fn delete(
        &self,
        principal: &Principal,
        event_id: i32,
        packet_id: i32,
        cascade_tickets: bool,
    ) -> Result<DeletedInclusion> {
        repository::find_inclusion(&self.state.db, event_id, packet_id)
            .await?
            .ok_or_else(|| inclusion_not_found(event_id, packet_id))?;
        let target = self.owners(event_id, packet_id).await?;
        self.state
            .authorizer
            .authorize(principal, Action::Delete, &target)?;

        let (model, deleted_tickets) = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                repository::lock_all(txn, &[Some(event_id)], &[Some(packet_id)]).await?;
                let inclusion = repository::find_inclusion(txn, event_id, packet_id)
                    .await?
                    .ok_or_else(|| inclusion_not_found(event_id, packet_id))?;

                let mut deleted = 0;
                let pair_tickets = repository::count_pair_tickets(txn, event_id, packet_id).await?;
                if pair_tickets > 0 {
                    if !cascade_tickets {
                        return Err(Violation::InclusionHasTickets {
                            event_id,
                            packet_id,
                            tickets: pair_tickets,
                        }
                        .into());
                    }
                    deleted += repository::delete_pair_tickets(txn, event_id, packet_id).await?;
                }

                let packet_capacity = repository::packet_capacity(txn, packet_id, None).await?;
                if cascade_tickets {
                    let excess = excess_after_removal(&packet_capacity, event_id);
                    let excess = u64::try_from(excess).unwrap_or(0);
                    deleted +=
                        repository::delete_newest_packet_tickets(txn, packet_id, excess).await?;
                } else {
                    check_inclusion_removal(&packet_capacity, event_id)?;
                }

                event_packet_inclusions::Entity::delete_by_id((event_id, packet_id))
                    .exec(txn)
                    .await?;
                Ok((inclusion, deleted))
            })
        })
        .await?;

        if deleted_tickets > 0 {
            lwarn!(
                "system",
                LogStage::Db,
                LogComponent::EventManager,
                "inclusion_cascade",
                &format!(
                    "删除包含关系时级联删除门票: event={event_id} packet={packet_id} tickets={deleted_tickets}"
                )
            );
        }
        Ok(DeletedInclusion {
            inclusion: self.respond(model),
            deleted_tickets,
        })
    }
}

fn inclusion_not_found(event_id: i32, packet_id: i32) -> TicketingError {
    TicketingError::not_found("inclusion", format!("event {event_id} / packet {packet_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        EventFixture, PacketFixture, admin, all_tokens, event_manager_database,
        event_manager_state, insert_inclusion, insert_ticket, other_owner, owner,
    };
    use entity::tickets;

    fn request(event_id: i32, packet_id: i32, allocated_seats: i32) -> CreateInclusionRequest {
        CreateInclusionRequest {
            event_id,
            packet_id,
            allocated_seats: Some(allocated_seats),
        }
    }

    #[tokio::test]
    async fn test_allocation_cannot_exceed_remaining_seats() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let event = EventFixture::new("Gala").seats(5).insert(&state.db).await;
        let vip = PacketFixture::new("VIP").insert(&state.db).await;
        let pass = PacketFixture::new("Pass").insert(&state.db).await;
        let inclusions = InclusionsService::new(&state);

        inclusions.create(&owner(), request(event.id, vip.id, 3)).await.unwrap();
        let err = inclusions
            .create(&owner(), request(event.id, pass.id, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Conflict { .. }));
        assert_eq!(err.field(), Some("allocated_seats"));

        inclusions.create(&owner(), request(event.id, pass.id, 2)).await.unwrap();
        let err = inclusions
            .create(&owner(), request(event.id, pass.id, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_allocation_cannot_drop_below_packet_sales() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let event = EventFixture::new("Gala").insert(&state.db).await;
        let packet = PacketFixture::new("VIP").insert(&state.db).await;
        insert_inclusion(&state.db, event.id, packet.id, 3).await;
        insert_ticket(&state.db, None, Some(packet.id), 10).await;
        insert_ticket(&state.db, None, Some(packet.id), 5).await;

        let err = InclusionsService::new(&state)
            .update(
                &owner(),
                event.id,
                packet.id,
                UpdateInclusionRequest { allocated_seats: 1 },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_inclusion_needs_both_owners() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let event = EventFixture::new("Gala").insert(&state.db).await;
        let packet = PacketFixture::new("Foreign")
            .owner(other_owner().user_id)
            .insert(&state.db)
            .await;

        let err = InclusionsService::new(&state)
            .create(&owner(), request(event.id, packet.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_delete_with_pair_tickets_is_refused_without_cascade() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let event = EventFixture::new("Gala").insert(&state.db).await;
        let packet = PacketFixture::new("VIP").insert(&state.db).await;
        insert_inclusion(&state.db, event.id, packet.id, 2).await;
        insert_ticket(&state.db, Some(event.id), Some(packet.id), 0).await;

        let err = InclusionsService::new(&state)
            .delete(&admin(), event.id, packet.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Conflict { .. }));
        assert!(
            repository::find_inclusion(&state.db, event.id, packet.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_cascade_removes_pair_and_newest_excess_tickets() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let gala = EventFixture::new("Gala").insert(&state.db).await;
        let expo = EventFixture::new("Expo").insert(&state.db).await;
        let packet = PacketFixture::new("VIP").insert(&state.db).await;
        insert_inclusion(&state.db, gala.id, packet.id, 5).await;
        insert_inclusion(&state.db, expo.id, packet.id, 1).await;
        // 删除 Gala 之后最小预留变为 1
        insert_ticket(&state.db, Some(gala.id), Some(packet.id), 30).await;
        let oldest = insert_ticket(&state.db, None, Some(packet.id), 20).await;
        insert_ticket(&state.db, None, Some(packet.id), 10).await;

        let deleted = InclusionsService::new(&state)
            .delete(&admin(), gala.id, packet.id, true)
            .await
            .unwrap();
        assert_eq!(deleted.deleted_tickets, 2);

        let remaining = tickets::Entity::find().all(&state.db).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].code, oldest.code);
    }

    #[tokio::test]
    async fn test_cross_lists_require_existing_parent() {
        let state = event_manager_state(event_manager_database().await, all_tokens());
        let event = EventFixture::new("Gala").insert(&state.db).await;
        let packet = PacketFixture::new("VIP").insert(&state.db).await;
        insert_inclusion(&state.db, event.id, packet.id, 0).await;
        let inclusions = InclusionsService::new(&state);

        assert_eq!(inclusions.list_for_event(event.id).await.unwrap().len(), 1);
        assert_eq!(inclusions.list_for_packet(packet.id).await.unwrap().len(), 1);
        assert!(matches!(
            inclusions.list_for_event(999).await.unwrap_err(),
            TicketingError::NotFound { .. }
        ));
    }
}
