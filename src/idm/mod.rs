//! # 身份管理服务（IDM）
//!
//! 注册、登录、令牌校验与吊销，以及基于关系元组的权限检查。

pub mod blacklist;
pub mod client;
pub mod jwt;
pub mod messages;
pub mod password;
pub mod provisioning;
pub mod relationships;
pub mod rpc;
pub mod server;
pub mod service;

pub use client::IdmClient;
pub use jwt::JwtManager;
pub use service::IdmService;
