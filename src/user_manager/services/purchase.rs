//! # 购票流程
//!
//! 先在本地生成门票编号，再以服务账号在 Event Manager 中创建门票；只有
//! Event Manager 接受之后才把门票写入档案。Event Manager 的 PUT 是幂等的，
//! 写档案失败时可以用同一编号重试。

use entity::user_profiles;
use sea_orm::{ActiveModelTrait, Set};
use serde::Serialize;

use super::users::{PurchasedTicket, find_profile, ticket_list};
use crate::authorization::{Action, Target};
use crate::database::serializable;
use crate::domain::{TicketCode, Violation};
use crate::error::Result;
use crate::event_manager::services::tickets::TicketBody;
use crate::identity::Principal;
use crate::user_manager::server::UserManagerState;
use crate::{lerror, linfo, logging::{LogComponent, LogStage}};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurchaseResponse {
    pub ticket_code: TicketCode,
}

/// 购票服务
pub struct PurchaseService<'a> {
    state: &'a UserManagerState,
}

impl<'a> PurchaseService<'a> {
    #[must_use]
    pub const fn new(state: &'a UserManagerState) -> Self {
        Self { state }
    }

    /// 为 `user_id` 购买一张门票
    pub async fn purchase(
        &self,
        principal: &Principal,
        user_id: i32,
        body: TicketBody,
    ) -> Result<PurchaseResponse> {
        if body.event_id.is_none() && body.packet_id.is_none() {
            return Err(Violation::MissingTicketTarget.into());
        }
        self.state.authorizer.authorize(
            principal,
            Action::Update,
            &Target::Profile { user_id },
        )?;
        find_profile(&self.state.db, user_id).await?;

        let code = TicketCode::generate();
        self.state.tickets.place_ticket(code, body).await?;

        let entry = PurchasedTicket {
            code: code.to_string(),
            event_id: body.event_id,
            packet_id: body.packet_id,
        };
        let recorded = serializable(&self.state.db, |txn| {
            Box::pin(async move {
                let profile = find_profile(txn, user_id).await?;
                let mut tickets = ticket_list(&profile)?;
                tickets.push(entry);
                let ticket_list = serde_json::to_value(&tickets)?;

                let mut active: user_profiles::ActiveModel = profile.into();
                active.ticket_list = Set(ticket_list);
                active.updated_at = Set(chrono::Utc::now().naive_utc());
                active.update(txn).await?;
                Ok(())
            })
        })
        .await;

        if let Err(e) = recorded {
            lerror!(
                "system",
                LogStage::Db,
                LogComponent::Purchase,
                "record_failed",
                &format!(
                    "门票已在 Event Manager 创建但未写入档案: user={user_id} code={code} error={}",
                    e.cause_chain()
                )
            );
            return Err(e);
        }

        linfo!(
            "system",
            LogStage::Response,
            LogComponent::Purchase,
            "ticket_purchased",
            &format!(
                "购票成功: user={user_id} code={code} event={:?} packet={:?}",
                body.event_id, body.packet_id
            )
        );
        Ok(PurchaseResponse { ticket_code: code })
    }
}
