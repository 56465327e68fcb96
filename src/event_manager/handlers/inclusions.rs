//! 包含关系处理器

use axum::extract::State;

use super::{Auth, HandlerResult};
use crate::event_manager::server::EventManagerState;
use crate::event_manager::services::InclusionsService;
use crate::event_manager::services::inclusions::{
    CreateInclusionRequest, DeleteInclusionQuery, DeletedInclusion, InclusionResponse,
    UpdateInclusionRequest,
};
use crate::web::{
    PositiveId, PositiveIdPair, StrictJson, StrictQuery, created, success, success_with_message,
};

/// `POST /events/event-packets` 与 `POST /event-packets/events`
pub async fn create_inclusion(
    State(state): State<EventManagerState>,
    auth: Auth,
    StrictJson(request): StrictJson<CreateInclusionRequest>,
) -> HandlerResult<InclusionResponse> {
    let principal = auth?.0;
    Ok(created(
        InclusionsService::new(&state)
            .create(&principal, request)
            .await?,
    ))
}

pub async fn get_inclusion(
    State(state): State<EventManagerState>,
    PositiveIdPair(event_id, packet_id): PositiveIdPair,
) -> HandlerResult<InclusionResponse> {
    Ok(success(
        InclusionsService::new(&state).get(event_id, packet_id).await?,
    ))
}

pub async fn update_inclusion(
    State(state): State<EventManagerState>,
    PositiveIdPair(event_id, packet_id): PositiveIdPair,
    auth: Auth,
    StrictJson(request): StrictJson<UpdateInclusionRequest>,
) -> HandlerResult<InclusionResponse> {
    let principal = auth?.0;
    Ok(success(
        InclusionsService::new(&state)
            .update(&principal, event_id, packet_id, request)
            .await?,
    ))
}

pub async fn delete_inclusion(
    State(state): State<EventManagerState>,
    PositiveIdPair(event_id, packet_id): PositiveIdPair,
    StrictQuery(query): StrictQuery<DeleteInclusionQuery>,
    auth: Auth,
) -> HandlerResult<DeletedInclusion> {
    let principal = auth?.0;
    let deleted = InclusionsService::new(&state)
        .delete(
            &principal,
            event_id,
            packet_id,
            query.cascade_tickets.unwrap_or(false),
        )
        .await?;
    if deleted.deleted_tickets > 0 {
        let message = format!("{} tickets were deleted", deleted.deleted_tickets);
        return Ok(success_with_message(deleted, message));
    }
    Ok(success(deleted))
}

/// 活动包含的套票
pub async fn list_event_packets(
    State(state): State<EventManagerState>,
    PositiveId(event_id): PositiveId,
) -> HandlerResult<Vec<InclusionResponse>> {
    Ok(success(
        InclusionsService::new(&state).list_for_event(event_id).await?,
    ))
}

/// 套票包含的活动
pub async fn list_packet_events(
    State(state): State<EventManagerState>,
    PositiveId(packet_id): PositiveId,
) -> HandlerResult<Vec<InclusionResponse>> {
    Ok(success(
        InclusionsService::new(&state).list_for_packet(packet_id).await?,
    ))
}
