//! IDM RPC 的请求与响应消息

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::relationships::{ObjectRef, Relationship, RelationshipFilter, RelationshipUpdate, SubjectRef};
use crate::error::RpcCode;
use crate::identity::{Role, TokenStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// 省略时为 `owner-event`，只接受 `owner-event` 与 `client`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i32,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// `VerifyToken` 与 `RevokeToken` 的请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    pub token: String,
}

/// 令牌有效时的内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedToken {
    pub status: TokenStatus,
    pub user_id: i32,
    pub role: Role,
    pub email: String,
    pub issuer: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeTokenResponse {
    pub revoked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckPermissionRequest {
    pub resource: ObjectRef,
    /// 可带 `_permission` 后缀
    pub permission: String,
    pub subject: SubjectRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPermissionResponse {
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteRelationshipsRequest {
    pub updates: Vec<RelationshipUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRelationshipsResponse {
    pub written: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadRelationshipsRequest {
    pub filter: RelationshipFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRelationshipsResponse {
    pub relationships: Vec<Relationship>,
}

/// RPC 错误体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: RpcCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_status: Option<TokenStatus>,
}
