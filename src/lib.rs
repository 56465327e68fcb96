//! # Event Ticketing
//!
//! 活动票务后端：活动管理（Event Manager）、身份管理（IDM）与用户管理
//! （User Manager）三个服务共用的核心库。

pub mod authorization;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod event_manager;
pub mod identity;
pub mod idm;
pub mod logging;
pub mod testing;
pub mod user_manager;
pub mod web;

// Re-export commonly used types
pub use error::{Result, TicketingError};

#[cfg(test)]
mod tests {
    use std::path::Path;

    #[test]
    fn manifest_files_exist() {
        let readme = env!("CARGO_PKG_README");
        assert!(
            readme.is_empty() || Path::new(env!("CARGO_MANIFEST_DIR")).join(readme).exists(),
            "{readme}"
        );
    }
}
