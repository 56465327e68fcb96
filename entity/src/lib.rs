//! # Entity 模块
//!
//! 包含三个服务的全部 Sea-ORM 实体定义：
//! - 活动管理：`events`、`event_packets`、`event_packet_inclusions`、`tickets`
//! - 身份管理：`idm_users`、`relationship_tuples`
//! - 用户管理：`user_profiles`

pub mod event_packet_inclusions;
pub mod event_packets;
pub mod events;
pub mod idm_users;
pub mod relationship_tuples;
pub mod tickets;
pub mod user_profiles;

pub use event_packet_inclusions::Entity as EventPacketInclusions;
pub use event_packets::Entity as EventPackets;
pub use events::Entity as Events;
pub use idm_users::Entity as IdmUsers;
pub use relationship_tuples::Entity as RelationshipTuples;
pub use tickets::Entity as Tickets;
pub use user_profiles::Entity as UserProfiles;

#[cfg(test)]
mod tests;
