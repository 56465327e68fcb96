//! # 用户管理服务（User Manager）
//!
//! 用户档案的增删改查，以及代用户向 Event Manager 购票。

pub mod event_client;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod service_token;
pub mod services;

pub use event_client::{EventManagerClient, TicketGateway};
pub use routes::create_routes;
pub use server::UserManagerState;
pub use service_token::ServiceTokenCache;
