//! IDM RPC 端到端测试：注册、登录、校验与吊销

mod common;

use axum::Router;
use axum::http::StatusCode;
use migration::{EventManagerMigrator, IdmMigrator};
use pretty_assertions::assert_eq;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{NoopProvisioner, call, event_manager_app_with, memory_db};
use event_ticketing::config::Credentials;
use event_ticketing::identity::LocalIdentityProvider;
use event_ticketing::idm::blacklist::MemoryBlacklist;
use event_ticketing::idm::provisioning::{HttpProfileProvisioner, ProfileProvisioner};
use event_ticketing::idm::relationships::MemoryRelationshipStore;
use event_ticketing::idm::rpc::{IdmState, SERVICE_PATH, rpc_router};
use event_ticketing::idm::{IdmService, JwtManager};

async fn idm_service(
    provisioner: Arc<dyn ProfileProvisioner>,
) -> (Arc<IdmService>, DatabaseConnection) {
    let db = memory_db::<IdmMigrator>().await;
    let service = IdmService::new(
        db.clone(),
        JwtManager::new("integration-secret", "idm.test", 3600),
        Arc::new(MemoryBlacklist::new()),
        Arc::new(MemoryRelationshipStore::new()),
        provisioner,
        4,
    );
    service
        .seed_service_account(&Credentials {
            email: "svc@tickets.local".into(),
            password: "svc-secret".into(),
        })
        .await
        .expect("服务账号初始化失败");
    (Arc::new(service), db)
}

async fn idm_app(provisioner: Arc<dyn ProfileProvisioner>) -> Router {
    let (service, db) = idm_service(provisioner).await;
    rpc_router(IdmState { service, db })
}

async fn rpc(app: &Router, rpc_method: &str, body: Value) -> (StatusCode, Value) {
    call(app, "POST", &format!("{SERVICE_PATH}/{rpc_method}"), None, Some(body)).await
}

async fn register_and_login(app: &Router, email: &str) -> String {
    let (status, body) = rpc(
        app,
        "Register",
        json!({"email": email, "password": "hunter2", "role": "client"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = rpc(app, "Login", json!({"email": email, "password": "hunter2"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().expect("缺少令牌").to_string()
}

#[tokio::test]
async fn test_register_login_verify_revoke() {
    let app = idm_app(Arc::new(NoopProvisioner)).await;
    let token = register_and_login(&app, "ana@example.com").await;

    let (status, verified) = rpc(&app, "VerifyToken", json!({"token": token})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["status"], "valid");
    assert_eq!(verified["role"], "client");
    assert_eq!(verified["email"], "ana@example.com");
    assert_eq!(verified["issuer"], "idm.test");

    let (status, revoked) = rpc(&app, "RevokeToken", json!({"token": token})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revoked["revoked"], true);

    let (status, body) = rpc(&app, "VerifyToken", json!({"token": token})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "Unauthenticated");
    assert_eq!(body["token_status"], "blacklisted");

    // 重复吊销仍然成功
    let (status, _) = rpc(&app, "RevokeToken", json!({"token": token})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_registration_names_the_email_field() {
    let app = idm_app(Arc::new(NoopProvisioner)).await;
    register_and_login(&app, "dup@example.com").await;

    let (status, body) = rpc(
        &app,
        "Register",
        json!({"email": "DUP@example.com", "password": "other"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidArgument");
    assert_eq!(body["field"], "email");
}

#[tokio::test]
async fn test_tampered_token_is_corrupted_then_blacklisted() {
    let app = idm_app(Arc::new(NoopProvisioner)).await;
    let token = register_and_login(&app, "eve@example.com").await;

    let (head, signature) = token.rsplit_once('.').expect("令牌格式错误");
    let mut forged: Vec<char> = signature.chars().collect();
    forged[0] = if forged[0] == 'A' { 'B' } else { 'A' };
    let tampered = format!("{head}.{}", forged.into_iter().collect::<String>());

    let (status, body) = rpc(&app, "VerifyToken", json!({"token": tampered})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["token_status"], "corrupted");

    let (_, body) = rpc(&app, "VerifyToken", json!({"token": tampered})).await;
    assert_eq!(body["token_status"], "blacklisted");

    // 原令牌不受影响
    let (status, _) = rpc(&app, "VerifyToken", json!({"token": token})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_password_and_privileged_role() {
    let app = idm_app(Arc::new(NoopProvisioner)).await;
    register_and_login(&app, "bob@example.com").await;

    let (status, body) = rpc(
        &app,
        "Login",
        json!({"email": "bob@example.com", "password": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("token_status").is_none());

    let (status, body) = rpc(
        &app,
        "Register",
        json!({"email": "root@example.com", "password": "x", "role": "admin"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "role");
}

#[tokio::test]
async fn test_strict_messages_and_unknown_methods() {
    let app = idm_app(Arc::new(NoopProvisioner)).await;

    let (status, body) = rpc(&app, "VerifyToken", json!({"token": "x", "ttl": 3})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidArgument");
    assert_eq!(body["field"], "ttl");

    let (status, body) = rpc(&app, "Impersonate", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");
}

#[tokio::test]
async fn test_relationships_grant_permissions_through_usersets() {
    let app = idm_app(Arc::new(NoopProvisioner)).await;
    let (status, body) = rpc(
        &app,
        "WriteRelationships",
        json!({"updates": [
            {"operation": "touch", "relationship": {
                "resource": {"object_type": "event", "object_id": "3"},
                "relation": "manage",
                "subject": {"object": {"object_type": "team", "object_id": "crew"}, "relation": "member"}
            }},
            {"operation": "touch", "relationship": {
                "resource": {"object_type": "team", "object_id": "crew"},
                "relation": "member",
                "subject": {"object": {"object_type": "user", "object_id": "7"}}
            }}
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["written"], 2);

    let check = |user: &str| {
        json!({
            "resource": {"object_type": "event", "object_id": "3"},
            "permission": "manage_permission",
            "subject": {"object": {"object_type": "user", "object_id": user}}
        })
    };
    let (_, body) = rpc(&app, "CheckPermission", check("7")).await;
    assert_eq!(body["allowed"], true);
    let (_, body) = rpc(&app, "CheckPermission", check("8")).await;
    assert_eq!(body["allowed"], false);

    let (_, body) = rpc(
        &app,
        "ReadRelationships",
        json!({"filter": {"resource_type": "team"}}),
    )
    .await;
    assert_eq!(body["relationships"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_registration_provisions_profile_with_service_token() {
    let user_manager = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user-manager/users"))
        .and(header_exists("authorization"))
        .and(body_json(json!({"id": 2, "email": "new@example.com"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&user_manager)
        .await;
    let provisioner = HttpProfileProvisioner::new(
        &user_manager.uri(),
        std::time::Duration::from_secs(2),
    )
    .expect("地址无效");
    let app = idm_app(Arc::new(provisioner)).await;

    // 服务账号占用编号 1
    let (status, body) = rpc(
        &app,
        "Register",
        json!({"email": "new@example.com", "password": "pw"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user_id"], 2);
    assert_eq!(body["role"], "owner-event");
}

#[tokio::test]
async fn test_failed_provisioning_is_internal() {
    let user_manager = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&user_manager)
        .await;
    let provisioner = HttpProfileProvisioner::new(
        &user_manager.uri(),
        std::time::Duration::from_secs(2),
    )
    .expect("地址无效");
    let app = idm_app(Arc::new(provisioner)).await;

    let (status, body) = rpc(
        &app,
        "Register",
        json!({"email": "late@example.com", "password": "pw"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "Internal");
}

#[tokio::test]
async fn test_issued_tokens_authenticate_event_manager_requests() {
    let (service, db) = idm_service(Arc::new(NoopProvisioner)).await;
    let idm = rpc_router(IdmState {
        service: service.clone(),
        db,
    });
    let (status, registered) = rpc(
        &idm,
        "Register",
        json!({"email": "host@example.com", "password": "pw"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{registered}");
    let owner_id = registered["user_id"].clone();
    let (_, login) = rpc(
        &idm,
        "Login",
        json!({"email": "host@example.com", "password": "pw"}),
    )
    .await;
    let token = login["token"].as_str().expect("缺少令牌").to_string();

    let events = event_manager_app_with(
        memory_db::<EventManagerMigrator>().await,
        Arc::new(LocalIdentityProvider::new(service)),
    );
    let create = json!({"owner_id": owner_id, "name": "Premiere", "seats": 40});
    let (status, body) = call(
        &events,
        "POST",
        "/api/event-manager/events",
        Some(&token),
        Some(create),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    rpc(&idm, "RevokeToken", json!({"token": token})).await;
    let (status, _) = call(
        &events,
        "POST",
        "/api/event-manager/events",
        Some(&token),
        Some(json!({"owner_id": owner_id, "name": "Encore"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
