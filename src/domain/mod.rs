//! # 领域核心
//!
//! 活动、套票、包含关系与门票之间的一致性规则。本模块不依赖存储，
//! 只对调用方提供的快照做判断。

pub mod invariants;
pub mod ticket_code;

pub use invariants::{
    EventCapacity, PacketCapacity, TicketRequest, Violation, ViolationKind, check_allocation,
    check_inclusion_removal, check_new_entity, check_seat_change, check_ticket,
    excess_after_removal, validate_name, validate_owner, validate_seats,
};
pub use ticket_code::TicketCode;
