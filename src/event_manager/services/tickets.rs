//! # 门票服务
//!
//! 门票引用一个活动、一个套票或两者。创建与修改都在锁定相关活动、套票之后
//! 重新统计售出数再做检查；修改按“删除后重新创建”处理，统计时排除门票自身。
//! `PUT /tickets/{code}` 是幂等的：相同内容重放不做任何修改。

use chrono::{DateTime, Utc};
use entity::tickets;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use super::shared::{PageRequest, utc};
use crate::authorization::{Action, Target};
use crate::database::serializable;
use crate::domain::{TicketCode, TicketRequest, Violation, check_ticket};
use crate::error::{Result, TicketingError};
use crate::event_manager::links::{LinkBuilder, Links};
use crate::event_manager::repository;
use crate::event_manager::server::EventManagerState;
use crate::identity::Principal;
use crate::web::Pagination;
use crate::{ldebug, linfo, logging::{LogComponent, LogStage}};

/// 创建或替换门票的请求体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketBody {
    #[serde(default)]
    pub event_id: Option<i32>,
    #[serde(default)]
    pub packet_id: Option<i32>,
}

impl From<TicketBody> for TicketRequest {
    fn from(body: TicketBody) -> Self {
        Self {
            event_id: body.event_id,
            packet_id: body.packet_id,
        }
    }
}

/// 部分更新，`null` 表示清除引用
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTicketRequest {
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub event_id: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub packet_id: Option<Option<i32>>,
}

impl UpdateTicketRequest {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.event_id.is_none() && self.packet_id.is_none()
    }

    #[must_use]
    pub fn apply(&self, current: TicketBody) -> TicketBody {
        TicketBody {
            event_id: self.event_id.unwrap_or(current.event_id),
            packet_id: self.packet_id.unwrap_or(current.packet_id),
        }
    }
}

/// 门票列表查询参数
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketQuery {
    pub event_id: Option<i32>,
    pub packet_id: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketResponse {
    pub code: String,
    pub event_id: Option<i32>,
    pub packet_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl TicketResponse {
    #[must_use]
    pub fn new(model: tickets::Model, links: &LinkBuilder) -> Self {
        Self {
            links: links.ticket(&model.code, model.event_id, model.packet_id),
            code: model.code,
            event_id: model.event_id,
            packet_id: model.packet_id,
            created_at: utc(model.created_at),
        }
    }
}

/// `PUT` 的结果
#[derive(Debug, Clone)]
pub enum Upserted {
    Created(TicketResponse),
    Unchanged(TicketResponse),
    Replaced(TicketResponse),
}

fn body_of(model: &tickets::Model) -> TicketBody {
    TicketBody {
        event_id: model.event_id,
        packet_id: model.packet_id,
    }
}

fn owner_if_present<T>(found: Result<T>, owner: impl FnOnce(T) -> i32) -> Result<Option<i32>> {
    match found {
        Ok(model) => Ok(Some(owner(model))),
        Err(TicketingError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

fn ticket_not_found(code: &str) -> TicketingError {
    TicketingError::not_found("ticket", code)
}

/// 在事务内锁定并检查新的引用，`exclude` 为正在修改的门票
async fn check_in_txn(
    txn: &DatabaseTransaction,
    body: TicketBody,
    previous: Option<TicketBody>,
    exclude: Option<&str>,
) -> Result<()> {
    if body.event_id.is_none() && body.packet_id.is_none() {
        return Err(Violation::MissingTicketTarget.into());
    }
    let previous = previous.unwrap_or_default();
    let (missing_events, missing_packets) = repository::lock_all(
        txn,
        &[body.event_id, previous.event_id],
        &[body.packet_id, previous.packet_id],
    )
    .await?;
    if let Some(event_id) = body.event_id.filter(|id| missing_events.contains(id)) {
        return Err(Violation::UnknownEvent { event_id }.into());
    }
    if let Some(packet_id) = body.packet_id.filter(|id| missing_packets.contains(id)) {
        return Err(Violation::UnknownPacket { packet_id }.into());
    }

    let event_capacity = match body.event_id {
        Some(event_id) => {
            let event = repository::find_event(txn, event_id).await?;
            Some(repository::event_capacity(txn, &event, exclude).await?)
        }
        None => None,
    };
    let packet_capacity = match body.packet_id {
        Some(packet_id) => Some(repository::packet_capacity(txn, packet_id, exclude).await?),
        None => None,
    };
    check_ticket(
        body.into(),
        event_capacity.as_ref(),
        packet_capacity.as_ref(),
    )?;
    Ok(())
}

/// 门票服务
pub struct TicketsService<'a> {
    state: &'a EventManagerState,
}

impl<'a> TicketsService<'a> {
    #[must_use]
    pub const fn new(state: &'a EventManagerState) -> Self {
        Self { state }
    }

    fn respond(&self, model: tickets::Model) -> TicketResponse {
        TicketResponse::new(model, &self.state.links)
    }

    /// 新引用的授权对象，引用不存在时按字段错误返回
    async fn requested_target(&self, body: TicketBody) -> Result<Target> {
        if body.event_id.is_none() && body.packet_id.is_none() {
            return Err(Violation::MissingTicketTarget.into());
        }
        let event_owner = match body.event_id {
            Some(id) => Some(repository::referenced_event(&self.state.db, id).await?.owner_id),
            None => None,
        };
        let packet_owner = match body.packet_id {
            Some(id) => Some(repository::referenced_packet(&self.state.db, id).await?.owner_id),
            None => None,
        };
        Ok(Target::Ticket {
            event_owner,
            packet_owner,
        })
    }

    /// 现有门票的授权对象，已删除的引用按无所有者处理
    async fn current_target(&self, body: TicketBody) -> Result<Target> {
        let event_owner = match body.event_id {
            Some(id) => owner_if_present(
                repository::find_event(&self.state.db, id).await,
                |event| event.owner_id,
            )?,
            None => None,
        };
        let packet_owner = match body.packet_id {
            Some(id) => owner_if_present(
                repository::find_packet(&self.state.db, id).await,
                |packet| packet.owner_id,
            )?,
            None => None,
        };
        Ok(Target::Ticket {
            event_owner,
            packet_owner,
        })
    }

    pub async fn list(&self, query: TicketQuery) -> Result<(Vec<TicketResponse>, Pagination)> {
        let page = PageRequest::new(query.page, query.per_page, &self.state.pagination)?;
        let mut select = tickets::Entity::find();
        if let Some(event_id) = query.event_id {
            select = select.filter(tickets::Column::EventId.eq(event_id));
        }
        if let Some(packet_id) = query.packet_id {
            select = select.filter(tickets::Column::PacketId.eq(packet_id));
        }
        select = select
            .order_by_asc(tickets::Column::CreatedAt)
            .order_by_asc(tickets::Column::Code);

        let total = select.clone().count(&self.state.db).await?;
        let rows = select
            .offset(page.offset())
            .limit(page.per_page)
            .all(&self.state.db)
            .await?;
        let data = rows.into_iter().map(|model| self.respond(model)).collect();
        Ok((data, page.pagination(total)))
    }

    pub async fn get(&self, code: TicketCode) -> Result<TicketResponse> {
        let code = code.to_string();
        repository::find_ticket(&self.state.db, &code)
            .await?
            .map(|model| self.respond(model))
            .ok_or_else(|| ticket_not_found(&code))
    }

    /// 由服务端生成编号创建门票
    pub async fn create(&self, principal: &Principal, body: TicketBody) -> Result<TicketResponse> {
        let target = self.requested_target(body).await?;
        self.state
            .authorizer
            .authorize(principal, Action::Create, &target)?;
        let model = self.insert(TicketCode::generate(), body).await?;
        Ok(self.respond(model))
    }

    async fn insert(&self, code: TicketCode, body: TicketBody) -> Result<tickets::Model> {
        let code = code.to_string();
        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                check_in_txn(txn, body, None, None).await?;
                if repository::find_ticket(txn, &code).await?.is_some() {
                    // 并发的 PUT 已经以同一编号创建
                    return Err(TicketingError::concurrent_modification());
                }
                let ticket = tickets::ActiveModel {
                    code: Set(code),
                    event_id: Set(body.event_id),
                    packet_id: Set(body.packet_id),
                    created_at: Set(Utc::now().naive_utc()),
                };
                Ok(ticket.insert(txn).await?)
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Tickets,
            "ticket_created",
            &format!(
                "门票已售出: code={} event={:?} packet={:?}",
                model.code, model.event_id, model.packet_id
            )
        );
        Ok(model)
    }

    /// 以调用方给定的编号创建或替换门票
    pub async fn put(
        &self,
        principal: &Principal,
        code: TicketCode,
        body: TicketBody,
    ) -> Result<Upserted> {
        let raw = code.to_string();
        let Some(existing) = repository::find_ticket(&self.state.db, &raw).await? else {
            let target = self.requested_target(body).await?;
            self.state
                .authorizer
                .authorize(principal, Action::Create, &target)?;
            let model = self.insert(code, body).await?;
            return Ok(Upserted::Created(self.respond(model)));
        };

        let current = body_of(&existing);
        if current == body {
            ldebug!(
                "system",
                LogStage::Db,
                LogComponent::Tickets,
                "ticket_put_replay",
                &format!("门票内容未变化: code={raw}")
            );
            // 重放按创建授权
            let target = self.current_target(current).await?;
            self.state
                .authorizer
                .authorize(principal, Action::Create, &target)?;
            return Ok(Upserted::Unchanged(self.respond(existing)));
        }

        let model = self.replace(principal, &raw, current, body).await?;
        Ok(Upserted::Replaced(self.respond(model)))
    }

    /// 部分更新引用
    pub async fn update(
        &self,
        principal: &Principal,
        code: TicketCode,
        request: UpdateTicketRequest,
    ) -> Result<TicketResponse> {
        if request.is_empty() {
            return Err(TicketingError::invalid_request(
                "update must contain at least one field",
            ));
        }
        let raw = code.to_string();
        let existing = repository::find_ticket(&self.state.db, &raw)
            .await?
            .ok_or_else(|| ticket_not_found(&raw))?;
        let current = body_of(&existing);
        let next = request.apply(current);
        if next == current {
            let target = self.current_target(current).await?;
            self.state
                .authorizer
                .authorize(principal, Action::Update, &target)?;
            return Ok(self.respond(existing));
        }
        let model = self.replace(principal, &raw, current, next).await?;
        Ok(self.respond(model))
    }

    /// 对新旧两组引用都授权后替换
    async fn replace(
        &self,
        principal: &Principal,
        code: &str,
        current: TicketBody,
        next: TicketBody,
    ) -> Result<tickets::Model> {
        let old_target = self.current_target(current).await?;
        self.state
            .authorizer
            .authorize(principal, Action::Update, &old_target)?;
        let new_target = self.requested_target(next).await?;
        self.state
            .authorizer
            .authorize(principal, Action::Update, &new_target)?;

        let code = code.to_string();
        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                check_in_txn(txn, next, Some(current), Some(&code)).await?;
                let ticket = repository::find_ticket(txn, &code)
                    .await?
                    .ok_or_else(|| ticket_not_found(&code))?;
                let mut active: tickets::ActiveModel = ticket.into();
                active.event_id = Set(next.event_id);
                active.packet_id = Set(next.packet_id);
                Ok(active.update(txn).await?)
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Tickets,
            "ticket_replaced",
            &format!(
                "门票引用已修改: code={} {:?}/{:?} -> {:?}/{:?}",
                model.code, current.event_id, current.packet_id, next.event_id, next.packet_id
            )
        );
        Ok(model)
    }

    /// 删除门票，返回被删除的实体
    pub async fn delete(&self, principal: &Principal, code: TicketCode) -> Result<TicketResponse> {
        let raw = code.to_string();
        let existing = repository::find_ticket(&self.state.db, &raw)
            .await?
            .ok_or_else(|| ticket_not_found(&raw))?;
        let target = self.current_target(body_of(&existing)).await?;
        self.state
            .authorizer
            .authorize(principal, Action::Delete, &target)?;

        let model = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                let current = body_of(&existing);
                repository::lock_all(txn, &[current.event_id], &[current.packet_id]).await?;
                let ticket = repository::find_ticket(txn, &raw)
                    .await?
                    .ok_or_else(|| ticket_not_found(&raw))?;
                tickets::Entity::delete_by_id(raw.clone()).exec(txn).await?;
                Ok(ticket)
            })
        })
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Tickets,
            "ticket_deleted",
            &format!("门票已删除: code={}", model.code)
        );
        Ok(self.respond(model))
    }
}
