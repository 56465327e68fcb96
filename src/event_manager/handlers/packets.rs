//! 套票处理器

use axum::extract::State;

use super::{Auth, HandlerResult};
use crate::event_manager::server::EventManagerState;
use crate::event_manager::services::PacketsService;
use crate::event_manager::services::packets::{
    CreatePacketRequest, PacketResponse, UpdatePacketRequest,
};
use crate::event_manager::services::shared::CatalogQuery;
use crate::web::{PositiveId, StrictJson, StrictQuery, created, paginated, success};

pub async fn list_packets(
    State(state): State<EventManagerState>,
    StrictQuery(query): StrictQuery<CatalogQuery>,
) -> HandlerResult<PacketResponse> {
    let (packets, pagination) = PacketsService::new(&state).list(query).await?;
    Ok(paginated(packets, pagination))
}

pub async fn get_packet(
    State(state): State<EventManagerState>,
    PositiveId(packet_id): PositiveId,
) -> HandlerResult<PacketResponse> {
    Ok(success(PacketsService::new(&state).get(packet_id).await?))
}

pub async fn create_packet(
    State(state): State<EventManagerState>,
    auth: Auth,
    StrictJson(request): StrictJson<CreatePacketRequest>,
) -> HandlerResult<PacketResponse> {
    let principal = auth?.0;
    Ok(created(
        PacketsService::new(&state).create(&principal, request).await?,
    ))
}

pub async fn update_packet(
    State(state): State<EventManagerState>,
    PositiveId(packet_id): PositiveId,
    auth: Auth,
    StrictJson(request): StrictJson<UpdatePacketRequest>,
) -> HandlerResult<PacketResponse> {
    let principal = auth?.0;
    Ok(success(
        PacketsService::new(&state)
            .update(&principal, packet_id, request)
            .await?,
    ))
}

pub async fn delete_packet(
    State(state): State<EventManagerState>,
    PositiveId(packet_id): PositiveId,
    auth: Auth,
) -> HandlerResult<PacketResponse> {
    let principal = auth?.0;
    Ok(success(
        PacketsService::new(&state).delete(&principal, packet_id).await?,
    ))
}
