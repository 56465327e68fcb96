//! # 错误处理宏

/// 快速创建配置错误的宏
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::TicketingError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TicketingError::config(format!($fmt, $($arg)*))
    };
}

/// 快速创建内部错误的宏
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::TicketingError::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TicketingError::internal(format!($fmt, $($arg)*))
    };
}

/// 快速创建字段校验错误的宏
#[macro_export]
macro_rules! validation_error {
    ($field:expr, $msg:expr) => {
        $crate::error::TicketingError::validation($field, $msg)
    };
    ($field:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::TicketingError::validation($field, format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回字段校验错误
#[macro_export]
macro_rules! ensure_validation {
    ($cond:expr, $field:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::validation_error!($field, $msg));
        }
    };
    ($cond:expr, $field:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::validation_error!($field, $fmt, $($arg)*));
        }
    };
}
