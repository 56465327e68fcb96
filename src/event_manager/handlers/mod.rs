//! # 活动管理 HTTP 处理器
//!
//! 写操作先完成路径与请求体的解码，再解析调用方身份。

pub mod events;
pub mod inclusions;
pub mod packets;
pub mod tickets;

use crate::error::TicketingError;
use crate::web::Authenticated;

/// 延迟到请求体解码之后再检查的认证结果
pub type Auth = Result<Authenticated, TicketingError>;

/// 处理器返回类型
pub type HandlerResult<T> = Result<crate::web::ApiResponse<T>, TicketingError>;
