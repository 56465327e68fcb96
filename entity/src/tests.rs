//! # 实体定义测试

use crate::{event_packet_inclusions, events, tickets, user_profiles};
use sea_orm::Set;

#[tokio::test]
async fn test_event_active_model() {
    let event = events::ActiveModel {
        owner_id: Set(1),
        name: Set("Gala".to_string()),
        seats: Set(Some(2)),
        version: Set(0),
        ..Default::default()
    };

    assert_eq!(event.name.as_ref(), "Gala");
    assert_eq!(event.seats.as_ref(), &Some(2));
}

#[tokio::test]
async fn test_inclusion_composite_key() {
    let inclusion = event_packet_inclusions::ActiveModel {
        event_id: Set(3),
        packet_id: Set(7),
        allocated_seats: Set(0),
    };

    assert_eq!(inclusion.event_id.as_ref(), &3);
    assert_eq!(inclusion.packet_id.as_ref(), &7);
}

#[tokio::test]
async fn test_ticket_optional_references() {
    let ticket = tickets::ActiveModel {
        code: Set("6f9619ff-8b86-4d11-b42d-00c04fc964ff".to_string()),
        event_id: Set(None),
        packet_id: Set(Some(4)),
        ..Default::default()
    };

    assert_eq!(ticket.code.as_ref().len(), 36);
    assert!(ticket.event_id.as_ref().is_none());
}

#[tokio::test]
async fn test_profile_ticket_list_is_json() {
    let profile = user_profiles::ActiveModel {
        id: Set(7),
        email: Set("a@b.c".to_string()),
        ticket_list: Set(serde_json::json!([])),
        ..Default::default()
    };

    assert!(profile.ticket_list.as_ref().is_array());
}
