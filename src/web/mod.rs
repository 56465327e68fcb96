//! # Web 层
//!
//! 三个 HTTP 服务共用的提取器、响应信封、认证与服务器启动。

pub mod auth;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod server;

pub use auth::{Authenticated, HasDatabase, HasIdentity, bearer_token};
pub use extract::{PositiveId, PositiveIdPair, StrictJson, StrictQuery, TicketCodePath};
pub use response::{ApiResponse, Pagination, created, paginated, success, success_with_message};
