//! # HTTP 服务器启动
//!
//! 三个服务共用的中间件栈、监听与优雅关闭。

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, Method, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::auth::HasDatabase;
use super::middleware::{REQUEST_ID_HEADER, request_id_middleware};
use crate::config::CommonConfig;
use crate::error::{Result, TicketingError};
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let parsed = origins
        .iter()
        .map(|origin| origin.parse::<axum::http::HeaderValue>())
        .collect::<std::result::Result<Vec<_>, _>>();
    match parsed {
        Ok(origins) => layer.allow_origin(origins),
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::ServerSetup,
                "cors_config_fail",
                &format!("CORS 来源配置无效: {e}，改为允许任意来源")
            );
            layer.allow_origin(Any)
        }
    }
}

/// 为路由加上公共中间件：追踪、CORS、超时、请求编号
pub fn with_common_layers(router: Router, config: &CommonConfig) -> Router {
    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.tuning.http.cors_allowed_origins))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .layer(axum::middleware::from_fn(request_id_middleware))
}

/// 健康检查
pub async fn health<S>(State(state): State<S>) -> impl IntoResponse
where
    S: HasDatabase + Clone + Send + Sync + 'static,
{
    match crate::database::ping(state.database()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": Utc::now() })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "unreachable", "timestamp": Utc::now() })),
        ),
    }
}

/// 绑定监听地址
pub async fn bind(bind_address: &str, port: u16) -> Result<TcpListener> {
    let ip = bind_address.parse::<IpAddr>().map_err(|e| {
        TicketingError::config(format!("invalid bind address {bind_address:?}: {e}"))
    })?;
    let addr = SocketAddr::new(ip, port);
    TcpListener::bind(addr)
        .await
        .map_err(|e| TicketingError::config_with_source(format!("cannot listen on {addr}"), e))
}

/// 在已绑定的监听器上提供服务，直到 `shutdown` 被取消
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    service_name: &str,
) -> Result<()> {
    let addr = listener.local_addr()?;
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::ServerSetup,
        "server_start",
        &format!("{service_name} 监听于 {addr}")
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| TicketingError::internal_with_source(format!("{service_name} server error"), e))?;

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::ServerSetup,
        "server_stop",
        &format!("{service_name} 已停止")
    );
    Ok(())
}

/// 收到 Ctrl-C 后取消令牌
pub async fn shutdown_on_ctrl_c(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                lwarn!(
                    "system",
                    LogStage::Shutdown,
                    LogComponent::ServerSetup,
                    "signal_fail",
                    &format!("无法监听 Ctrl-C: {e}")
                );
                return;
            }
            linfo!("system", LogStage::Shutdown, LogComponent::ServerSetup, "ctrl_c", "收到关闭信号");
            token.cancel();
        }
        () = token.cancelled() => {}
    }
}
