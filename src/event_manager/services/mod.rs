//! # 活动管理服务层

pub mod events;
pub mod inclusions;
pub mod packets;
pub mod shared;
pub mod tickets;


pub use events::EventsService;
pub use inclusions::InclusionsService;
pub use packets::PacketsService;
pub use tickets::TicketsService;
