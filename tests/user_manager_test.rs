//! User Manager 购票流程：IDM 与 Event Manager 以 wiremock 代替

mod common;

use axum::Router;
use axum::http::StatusCode;
use chrono::Utc;
use migration::UserManagerMigrator;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ADMIN, CLIENT, OWNER, SERVICE, TokenTable, call, memory_db};
use event_ticketing::authorization::RoleAuthorizer;
use event_ticketing::config::Credentials;
use event_ticketing::idm::IdmClient;
use event_ticketing::user_manager::{
    EventManagerClient, ServiceTokenCache, UserManagerState, create_routes,
};

const API: &str = "/api/user-manager";

struct Harness {
    app: Router,
    idm: MockServer,
    events: MockServer,
}

async fn harness() -> Harness {
    let idm = MockServer::start().await;
    let events = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idm.v1.IdentityService/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "svc-token",
            "user_id": 1,
            "role": "serviciu_clienti",
            "expires_at": Utc::now() + chrono::Duration::hours(1),
        })))
        .mount(&idm)
        .await;

    let client = IdmClient::new(&idm.uri(), Duration::from_secs(2)).expect("IDM 地址无效");
    let tokens = Arc::new(ServiceTokenCache::new(
        client,
        Credentials {
            email: "svc@tickets.local".into(),
            password: "svc-secret".into(),
        },
    ));
    let tickets = EventManagerClient::new(&events.uri(), Duration::from_secs(2), tokens)
        .expect("Event Manager 地址无效");
    let app = create_routes(UserManagerState {
        db: memory_db::<UserManagerMigrator>().await,
        identity: Arc::new(TokenTable::standard()),
        authorizer: Arc::new(RoleAuthorizer),
        tickets: Arc::new(tickets),
    });
    Harness { app, idm, events }
}

async fn create_client_profile(app: &Router) {
    let (status, body) = call(
        app,
        "POST",
        &format!("{API}/users"),
        Some(SERVICE),
        Some(json!({"id": 7, "email": "client@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[tokio::test]
async fn test_failed_purchase_leaves_ticket_list_unchanged() {
    let h = harness().await;
    create_client_profile(&h.app).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/api/event-manager/tickets/[0-9a-f-]{36}$"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "success": false,
            "error": {
                "code": "CONFLICT",
                "message": "event 3 is sold out",
                "field": "event_id",
                "details": {"violation": "EventSoldOut", "counts": {"seats": 1, "sold": 1}}
            },
            "timestamp": Utc::now(),
        })))
        .expect(1)
        .mount(&h.events)
        .await;

    let (status, body) = call(
        &h.app,
        "POST",
        &format!("{API}/clients/7/tickets"),
        Some(CLIENT),
        Some(json!({"event_id": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["field"], "event_id");
    assert_eq!(body["error"]["details"]["violation"], "EventSoldOut");

    let (_, profile) = call(&h.app, "GET", &format!("{API}/users/7"), Some(CLIENT), None).await;
    assert_eq!(profile["data"]["ticket_list"], json!([]));
}

#[tokio::test]
async fn test_successful_purchase_is_recorded() {
    let h = harness().await;
    create_client_profile(&h.app).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/api/event-manager/tickets/[0-9a-f-]{36}$"))
        .and(header("authorization", "Bearer svc-token"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&h.events)
        .await;

    let (status, first) = call(
        &h.app,
        "POST",
        &format!("{API}/clients/7/tickets"),
        Some(CLIENT),
        Some(json!({"event_id": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    let code = first["data"]["ticket_code"].as_str().expect("缺少门票编号");

    // 客服代客户购买
    let (status, _) = call(
        &h.app,
        "POST",
        &format!("{API}/clients/7/tickets"),
        Some(SERVICE),
        Some(json!({"packet_id": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, profile) = call(&h.app, "GET", &format!("{API}/users/7"), Some(CLIENT), None).await;
    let tickets = profile["data"]["ticket_list"].as_array().expect("门票列表缺失");
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0]["code"], code);
    assert_eq!(tickets[0]["event_id"], 3);
    assert_eq!(tickets[1]["packet_id"], 2);

    // 服务令牌只登录一次
    let logins = h.idm.received_requests().await.unwrap_or_default();
    assert_eq!(logins.len(), 1);
}

#[tokio::test]
async fn test_purchase_rules_are_checked_before_calling_event_manager() {
    let h = harness().await;
    create_client_profile(&h.app).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&h.events)
        .await;

    let (status, _) = call(
        &h.app,
        "POST",
        &format!("{API}/clients/7/tickets"),
        Some(OWNER),
        Some(json!({"event_id": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &h.app,
        "POST",
        &format!("{API}/clients/7/tickets"),
        Some(CLIENT),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "event_id");

    let (status, _) = call(
        &h.app,
        "POST",
        &format!("{API}/clients/7/tickets"),
        None,
        Some(json!({"event_id": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_event_manager_outage_is_a_bad_gateway() {
    let h = harness().await;
    create_client_profile(&h.app).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.events)
        .await;

    let (status, body) = call(
        &h.app,
        "POST",
        &format!("{API}/clients/7/tickets"),
        Some(CLIENT),
        Some(json!({"event_id": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_profile_lifecycle() {
    let h = harness().await;
    create_client_profile(&h.app).await;

    let (status, _) = call(
        &h.app,
        "POST",
        &format!("{API}/users/"),
        Some(SERVICE),
        Some(json!({"id": 7, "email": "again@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &h.app,
        "PATCH",
        &format!("{API}/users/7"),
        Some(CLIENT),
        Some(json!({"first_name": "Ana", "last_name": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["first_name"], "Ana");

    let (status, _) = call(&h.app, "GET", &format!("{API}/users/7"), Some(OWNER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&h.app, "DELETE", &format!("{API}/users/7"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&h.app, "GET", &format!("{API}/users/7"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
