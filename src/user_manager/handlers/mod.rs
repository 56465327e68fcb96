//! # 用户管理 HTTP 处理器

pub mod tickets;
pub mod users;

use crate::error::TicketingError;
use crate::web::Authenticated;

/// 延迟到请求体解码之后再检查的认证结果
pub type Auth = Result<Authenticated, TicketingError>;

pub type HandlerResult<T> = Result<crate::web::ApiResponse<T>, TicketingError>;
