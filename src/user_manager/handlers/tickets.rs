//! 购票处理器

use axum::extract::State;

use super::{Auth, HandlerResult};
use crate::event_manager::services::tickets::TicketBody;
use crate::user_manager::server::UserManagerState;
use crate::user_manager::services::PurchaseService;
use crate::user_manager::services::purchase::PurchaseResponse;
use crate::web::{PositiveId, StrictJson, created};

/// `POST /clients/{user_id}/tickets`，成功返回 201 与门票编号
pub async fn purchase_ticket(
    State(state): State<UserManagerState>,
    PositiveId(user_id): PositiveId,
    auth: Auth,
    StrictJson(body): StrictJson<TicketBody>,
) -> HandlerResult<PurchaseResponse> {
    let principal = auth?.0;
    Ok(created(
        PurchaseService::new(&state)
            .purchase(&principal, user_id, body)
            .await?,
    ))
}
