//! # 活动管理服务（Event Manager）
//!
//! 活动、套票、包含关系与门票的 REST 接口。每个写操作在一个可串行化事务中
//! 完成：锁定相关行、重新读取快照、运行一致性规则、写入。

pub mod handlers;
pub mod links;
pub mod repository;
pub mod routes;
pub mod server;
pub mod services;

pub use links::LinkBuilder;
pub use routes::create_routes;
pub use server::EventManagerState;
