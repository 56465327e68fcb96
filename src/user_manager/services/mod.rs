//! # 用户管理服务层

pub mod purchase;
pub mod users;

pub use purchase::PurchaseService;
pub use users::ProfilesService;
