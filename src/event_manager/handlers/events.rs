//! 活动处理器

use axum::extract::State;

use super::{Auth, HandlerResult};
use crate::event_manager::server::EventManagerState;
use crate::event_manager::services::EventsService;
use crate::event_manager::services::events::{CreateEventRequest, EventResponse, UpdateEventRequest};
use crate::event_manager::services::shared::CatalogQuery;
use crate::web::{PositiveId, StrictJson, StrictQuery, created, paginated, success};

pub async fn list_events(
    State(state): State<EventManagerState>,
    StrictQuery(query): StrictQuery<CatalogQuery>,
) -> HandlerResult<EventResponse> {
    let (events, pagination) = EventsService::new(&state).list(query).await?;
    Ok(paginated(events, pagination))
}

pub async fn get_event(
    State(state): State<EventManagerState>,
    PositiveId(event_id): PositiveId,
) -> HandlerResult<EventResponse> {
    Ok(success(EventsService::new(&state).get(event_id).await?))
}

pub async fn create_event(
    State(state): State<EventManagerState>,
    auth: Auth,
    StrictJson(request): StrictJson<CreateEventRequest>,
) -> HandlerResult<EventResponse> {
    let principal = auth?.0;
    Ok(created(
        EventsService::new(&state).create(&principal, request).await?,
    ))
}

pub async fn update_event(
    State(state): State<EventManagerState>,
    PositiveId(event_id): PositiveId,
    auth: Auth,
    StrictJson(request): StrictJson<UpdateEventRequest>,
) -> HandlerResult<EventResponse> {
    let principal = auth?.0;
    Ok(success(
        EventsService::new(&state)
            .update(&principal, event_id, request)
            .await?,
    ))
}

pub async fn delete_event(
    State(state): State<EventManagerState>,
    PositiveId(event_id): PositiveId,
    auth: Auth,
) -> HandlerResult<EventResponse> {
    let principal = auth?.0;
    Ok(success(
        EventsService::new(&state).delete(&principal, event_id).await?,
    ))
}
