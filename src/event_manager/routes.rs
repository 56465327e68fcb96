//! # 活动管理路由
//!
//! 所有业务路由挂在 `/api/event-manager` 下；GET 可匿名访问。
//! 集合路径同时接受带与不带结尾斜杠的写法。

use axum::{
    Router,
    routing::{MethodRouter, get, post},
};

use super::handlers::{events, inclusions, packets, tickets};
use super::links::API_PREFIX;
use super::server::EventManagerState;
use crate::web::server::health;

/// 创建 Event Manager 路由
pub fn create_routes(state: EventManagerState) -> Router {
    let event_collection: MethodRouter<EventManagerState> =
        get(events::list_events).post(events::create_event);
    let packet_collection: MethodRouter<EventManagerState> =
        get(packets::list_packets).post(packets::create_packet);
    let ticket_collection: MethodRouter<EventManagerState> =
        get(tickets::list_tickets).post(tickets::create_ticket);

    let api = Router::new()
        // 活动
        .route("/events", event_collection.clone())
        .route("/events/", event_collection)
        .route(
            "/events/{event_id}",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        // 套票
        .route("/event-packets", packet_collection.clone())
        .route("/event-packets/", packet_collection)
        .route(
            "/event-packets/{packet_id}",
            get(packets::get_packet)
                .patch(packets::update_packet)
                .delete(packets::delete_packet),
        )
        // 包含关系
        .route("/events/event-packets", post(inclusions::create_inclusion))
        .route("/event-packets/events", post(inclusions::create_inclusion))
        .route(
            "/events/{event_id}/event-packets/{packet_id}",
            get(inclusions::get_inclusion)
                .patch(inclusions::update_inclusion)
                .delete(inclusions::delete_inclusion),
        )
        .route("/events/{event_id}/event-packets", get(inclusions::list_event_packets))
        .route("/events/{event_id}/events-packets", get(inclusions::list_event_packets))
        .route("/event-packets/{packet_id}/events", get(inclusions::list_packet_events))
        .route("/events-packets/{packet_id}/events", get(inclusions::list_packet_events))
        // 门票
        .route("/tickets", ticket_collection.clone())
        .route("/tickets/", ticket_collection)
        .route(
            "/tickets/{code}",
            get(tickets::get_ticket)
                .put(tickets::put_ticket)
                .patch(tickets::update_ticket)
                .delete(tickets::delete_ticket),
        );

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health::<EventManagerState>))
        .with_state(state)
}
