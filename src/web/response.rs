//! # API 响应结构
//!
//! 定义了标准的 JSON API 响应格式，包括成功、失败和分页响应。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TicketingError;
use crate::{lerror, lwarn, logging::{LogComponent, LogStage}};

/// # 分页信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub pages: u64,
}

/// # 标准成功响应
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// # 分页成功响应
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
    pub timestamp: DateTime<Utc>,
}

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

/// # API响应枚举
///
/// 统一所有API出口，方便转换为 `axum::response::Response`
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Success(T),
    SuccessWithMessage(T, String),
    /// 201，新建资源
    Created(T),
    Paginated(Vec<T>, Pagination),
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let (status, data, message) = match self {
            Self::Success(data) => (StatusCode::OK, data, None),
            Self::SuccessWithMessage(data, message) => (StatusCode::OK, data, Some(message)),
            Self::Created(data) => (StatusCode::CREATED, data, None),
            Self::Paginated(data, pagination) => {
                return (
                    StatusCode::OK,
                    Json(PaginatedResponse {
                        success: true,
                        data,
                        pagination,
                        timestamp: Utc::now(),
                    }),
                )
                    .into_response();
            }
        };
        (
            status,
            Json(SuccessResponse {
                success: true,
                data: Some(data),
                message,
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for TicketingError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();

        if status.is_server_error() {
            lerror!(
                "system",
                LogStage::Error,
                LogComponent::Http,
                "server_error",
                &format!("请求处理失败: {}", self.cause_chain())
            );
        } else if status == StatusCode::CONFLICT {
            lwarn!(
                "system",
                LogStage::Validation,
                LogComponent::Http,
                "conflict",
                &self.to_string()
            );
        }

        let error_response = ErrorResponse {
            success: false,
            error: ErrorInfo {
                code: code.to_string(),
                message: self.client_message(),
                field: self.field().map(str::to_string),
                details: self.details().cloned(),
            },
            timestamp: Utc::now(),
        };
        (status, Json(error_response)).into_response()
    }
}

/// # 便捷函数：成功响应
pub fn success<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::Success(data)
}

/// # 便捷函数：带消息的成功响应
pub fn success_with_message<T: Serialize>(data: T, message: impl Into<String>) -> ApiResponse<T> {
    ApiResponse::SuccessWithMessage(data, message.into())
}

pub fn created<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::Created(data)
}

pub fn paginated<T: Serialize>(data: Vec<T>, pagination: Pagination) -> ApiResponse<T> {
    ApiResponse::Paginated(data, pagination)
}
