//! 门票处理器

use axum::extract::State;

use super::{Auth, HandlerResult};
use crate::event_manager::server::EventManagerState;
use crate::event_manager::services::TicketsService;
use crate::event_manager::services::tickets::{
    TicketBody, TicketQuery, TicketResponse, UpdateTicketRequest, Upserted,
};
use crate::web::{StrictJson, StrictQuery, TicketCodePath, created, paginated, success};

pub async fn list_tickets(
    State(state): State<EventManagerState>,
    StrictQuery(query): StrictQuery<TicketQuery>,
) -> HandlerResult<TicketResponse> {
    let (tickets, pagination) = TicketsService::new(&state).list(query).await?;
    Ok(paginated(tickets, pagination))
}

pub async fn get_ticket(
    State(state): State<EventManagerState>,
    TicketCodePath(code): TicketCodePath,
) -> HandlerResult<TicketResponse> {
    Ok(success(TicketsService::new(&state).get(code).await?))
}

pub async fn create_ticket(
    State(state): State<EventManagerState>,
    auth: Auth,
    StrictJson(body): StrictJson<TicketBody>,
) -> HandlerResult<TicketResponse> {
    let principal = auth?.0;
    Ok(created(
        TicketsService::new(&state).create(&principal, body).await?,
    ))
}

/// 新建返回 201，重放或替换返回 200
pub async fn put_ticket(
    State(state): State<EventManagerState>,
    TicketCodePath(code): TicketCodePath,
    auth: Auth,
    StrictJson(body): StrictJson<TicketBody>,
) -> HandlerResult<TicketResponse> {
    let principal = auth?.0;
    let response = match TicketsService::new(&state)
        .put(&principal, code, body)
        .await?
    {
        Upserted::Created(ticket) => created(ticket),
        Upserted::Unchanged(ticket) | Upserted::Replaced(ticket) => success(ticket),
    };
    Ok(response)
}

pub async fn update_ticket(
    State(state): State<EventManagerState>,
    TicketCodePath(code): TicketCodePath,
    auth: Auth,
    StrictJson(request): StrictJson<UpdateTicketRequest>,
) -> HandlerResult<TicketResponse> {
    let principal = auth?.0;
    Ok(success(
        TicketsService::new(&state)
            .update(&principal, code, request)
            .await?,
    ))
}

pub async fn delete_ticket(
    State(state): State<EventManagerState>,
    TicketCodePath(code): TicketCodePath,
    auth: Auth,
) -> HandlerResult<TicketResponse> {
    let principal = auth?.0;
    Ok(success(
        TicketsService::new(&state).delete(&principal, code).await?,
    ))
}
