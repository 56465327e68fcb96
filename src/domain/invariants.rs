//! # 一致性规则引擎
//!
//! 纯函数实现的容量规则，输入是事务内重新加载的快照：
//! - 活动售出的门票数不超过座位数
//! - 同一活动上各套票的预留座位之和不超过座位数
//! - 套票售出数不超过其所含活动中最小的预留数
//! - 同时引用活动与套票的门票必须对应已存在的包含关系
//!
//! 计数统一使用 `i64`，`seats` 为 `None` 表示容量不限。

use serde_json::{Value, json};
use thiserror::Error;

/// 名称最大长度（字符数）
pub const MAX_NAME_LEN: usize = 255;

/// 规则违反的类别，决定对外的错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// 字段级错误，对应 400
    Validation,
    /// 容量或引用约束会被破坏，对应 409
    Conflict,
}

/// 具名的规则违反
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("name must not be empty")]
    EmptyName,

    #[error("name must be at most {max} characters, got {len}")]
    NameTooLong { len: usize, max: usize },

    #[error("owner_id must be a positive integer")]
    NonPositiveOwner,

    #[error("{field} must not be negative")]
    NegativeSeats { field: &'static str },

    #[error("ticket must reference an event, a packet, or both")]
    MissingTicketTarget,

    #[error("event {event_id} does not exist")]
    UnknownEvent { event_id: i32 },

    #[error("packet {packet_id} does not exist")]
    UnknownPacket { packet_id: i32 },

    #[error("packet {packet_id} does not include event {event_id}")]
    InclusionMissing { event_id: i32, packet_id: i32 },

    #[error("event {event_id} is sold out ({sold} of {seats} seats taken)")]
    EventSoldOut { event_id: i32, seats: i64, sold: i64 },

    #[error("packet {packet_id} does not include any event")]
    PacketHasNoEvents { packet_id: i32 },

    #[error("packet {packet_id} is sold out ({sold} of {limit} slots taken)")]
    PacketSoldOut { packet_id: i32, limit: i64, sold: i64 },

    #[error(
        "seats cannot be lowered to {requested}: {sold} tickets sold and {allocated} seats allocated to packets"
    )]
    SeatShrinkViolation {
        requested: i64,
        sold: i64,
        allocated: i64,
    },

    #[error("allocation of {requested} seats exceeds the {remaining} seats remaining on the event")]
    AllocationExceedsRemaining { requested: i64, remaining: i64 },

    #[error("allocation of {requested} seats is below the {sold} tickets already sold for the packet")]
    AllocationBelowExistingSales { requested: i64, sold: i64 },

    #[error("packet has {sold} tickets sold but the remaining inclusions allow {}", describe_limit(.remaining))]
    PacketSalesWouldExceedRemainingAllocations { sold: i64, remaining: Option<i64> },

    #[error("{tickets} tickets still reference event {event_id} through packet {packet_id}")]
    InclusionHasTickets {
        event_id: i32,
        packet_id: i32,
        tickets: i64,
    },
}

impl Violation {
    /// 违反对应的请求字段
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyName | Self::NameTooLong { .. } => "name",
            Self::NonPositiveOwner => "owner_id",
            Self::NegativeSeats { field } => *field,
            Self::MissingTicketTarget | Self::UnknownEvent { .. } | Self::EventSoldOut { .. } => {
                "event_id"
            }
            Self::UnknownPacket { .. }
            | Self::InclusionMissing { .. }
            | Self::PacketHasNoEvents { .. }
            | Self::PacketSoldOut { .. }
            | Self::PacketSalesWouldExceedRemainingAllocations { .. }
            | Self::InclusionHasTickets { .. } => "packet_id",
            Self::SeatShrinkViolation { .. } => "seats",
            Self::AllocationExceedsRemaining { .. } | Self::AllocationBelowExistingSales { .. } => {
                "allocated_seats"
            }
        }
    }

    /// 机器可读的违反名称
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyName => "EmptyName",
            Self::NameTooLong { .. } => "NameTooLong",
            Self::NonPositiveOwner => "NonPositiveOwner",
            Self::NegativeSeats { .. } => "NegativeSeats",
            Self::MissingTicketTarget => "MissingTicketTarget",
            Self::UnknownEvent { .. } => "UnknownEvent",
            Self::UnknownPacket { .. } => "UnknownPacket",
            Self::InclusionMissing { .. } => "InclusionMissing",
            Self::EventSoldOut { .. } => "EventSoldOut",
            Self::PacketHasNoEvents { .. } => "PacketHasNoEvents",
            Self::PacketSoldOut { .. } => "PacketSoldOut",
            Self::SeatShrinkViolation { .. } => "SeatShrinkViolation",
            Self::AllocationExceedsRemaining { .. } => "AllocationExceedsRemaining",
            Self::AllocationBelowExistingSales { .. } => "AllocationBelowExistingSales",
            Self::PacketSalesWouldExceedRemainingAllocations { .. } => {
                "PacketSalesWouldExceedRemainingAllocations"
            }
            Self::InclusionHasTickets { .. } => "InclusionHasTickets",
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ViolationKind {
        match self {
            Self::EmptyName
            | Self::NameTooLong { .. }
            | Self::NonPositiveOwner
            | Self::NegativeSeats { .. }
            | Self::MissingTicketTarget
            | Self::UnknownEvent { .. }
            | Self::UnknownPacket { .. }
            | Self::InclusionMissing { .. } => ViolationKind::Validation,
            _ => ViolationKind::Conflict,
        }
    }

    /// 附带的计数信息，供客户端判断
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        let details = match self {
            Self::EventSoldOut { seats, sold, .. } => json!({ "seats": seats, "sold": sold }),
            Self::PacketSoldOut { limit, sold, .. } => json!({ "limit": limit, "sold": sold }),
            Self::SeatShrinkViolation {
                requested,
                sold,
                allocated,
            } => json!({ "requested": requested, "sold": sold, "allocated": allocated }),
            Self::AllocationExceedsRemaining {
                requested,
                remaining,
            } => json!({ "requested": requested, "remaining": remaining }),
            Self::AllocationBelowExistingSales { requested, sold } => {
                json!({ "requested": requested, "sold": sold })
            }
            Self::PacketSalesWouldExceedRemainingAllocations { sold, remaining } => {
                json!({ "sold": sold, "remaining": remaining })
            }
            Self::InclusionHasTickets { tickets, .. } => json!({ "tickets": tickets }),
            _ => return None,
        };
        Some(json!({ "violation": self.code(), "counts": details }))
    }
}

fn describe_limit(limit: &Option<i64>) -> String {
    limit.map_or_else(|| "none".to_string(), |value| value.to_string())
}

/// 活动容量快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCapacity {
    pub event_id: i32,
    pub seats: Option<i64>,
    /// 引用该活动的门票数
    pub sold: i64,
    /// 所有包含关系在该活动上的预留之和
    pub allocated: i64,
}

/// 套票容量快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketCapacity {
    pub packet_id: i32,
    /// 引用该套票的门票数
    pub sold: i64,
    /// `(event_id, allocated_seats)`
    pub allocations: Vec<(i32, i64)>,
}

impl PacketCapacity {
    /// 套票可售上限，没有包含任何活动时为 `None`
    #[must_use]
    pub fn limit(&self) -> Option<i64> {
        self.allocations.iter().map(|(_, seats)| *seats).min()
    }

    /// 去掉某个活动之后的可售上限
    #[must_use]
    pub fn limit_without(&self, event_id: i32) -> Option<i64> {
        self.allocations
            .iter()
            .filter(|(id, _)| *id != event_id)
            .map(|(_, seats)| *seats)
            .min()
    }

    #[must_use]
    pub fn includes(&self, event_id: i32) -> bool {
        self.allocations.iter().any(|(id, _)| *id == event_id)
    }

    #[must_use]
    pub fn allocation_on(&self, event_id: i32) -> Option<i64> {
        self.allocations
            .iter()
            .find(|(id, _)| *id == event_id)
            .map(|(_, seats)| *seats)
    }
}

/// 门票请求引用的目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketRequest {
    pub event_id: Option<i32>,
    pub packet_id: Option<i32>,
}

pub const fn validate_owner(owner_id: i32) -> Result<(), Violation> {
    if owner_id > 0 {
        Ok(())
    } else {
        Err(Violation::NonPositiveOwner)
    }
}

pub fn validate_name(name: &str) -> Result<(), Violation> {
    if name.trim().is_empty() {
        return Err(Violation::EmptyName);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(Violation::NameTooLong {
            len,
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

pub const fn validate_seats(field: &'static str, seats: Option<i32>) -> Result<(), Violation> {
    match seats {
        Some(value) if value < 0 => Err(Violation::NegativeSeats { field }),
        _ => Ok(()),
    }
}

/// 创建活动或套票时的前置条件
pub fn check_new_entity(
    owner_id: i32,
    name: &str,
    seats_field: &'static str,
    seats: Option<i32>,
) -> Result<(), Violation> {
    validate_owner(owner_id)?;
    validate_name(name)?;
    validate_seats(seats_field, seats)
}

/// 修改活动座位数
///
/// 新值必须覆盖已售门票与已预留座位中的较大者；`None` 表示取消容量限制。
pub fn check_seat_change(event: &EventCapacity, new_seats: Option<i32>) -> Result<(), Violation> {
    validate_seats("seats", new_seats)?;
    let Some(requested) = new_seats.map(i64::from) else {
        return Ok(());
    };
    if requested < event.sold.max(event.allocated) {
        return Err(Violation::SeatShrinkViolation {
            requested,
            sold: event.sold,
            allocated: event.allocated,
        });
    }
    Ok(())
}

/// 新建或修改包含关系的预留座位
///
/// `current` 是该套票在该活动上已有的预留（新建时为 0），`event.allocated`
/// 包含它，计算剩余座位时需要扣除。
pub fn check_allocation(
    event: &EventCapacity,
    current: i64,
    packet_sold: i64,
    requested: i32,
) -> Result<(), Violation> {
    if requested < 0 {
        return Err(Violation::NegativeSeats {
            field: "allocated_seats",
        });
    }
    let requested = i64::from(requested);
    let others = event.allocated - current;
    if let Some(seats) = event.seats {
        let remaining = seats - others;
        if requested > remaining {
            return Err(Violation::AllocationExceedsRemaining {
                requested,
                remaining: remaining.max(0),
            });
        }
    }
    if requested < packet_sold {
        return Err(Violation::AllocationBelowExistingSales {
            requested,
            sold: packet_sold,
        });
    }
    Ok(())
}

/// 删除包含关系前的检查，`packet.sold` 应已扣除随之删除的门票
pub fn check_inclusion_removal(packet: &PacketCapacity, event_id: i32) -> Result<(), Violation> {
    match excess_after_removal(packet, event_id) {
        0 => Ok(()),
        _ => Err(Violation::PacketSalesWouldExceedRemainingAllocations {
            sold: packet.sold,
            remaining: packet.limit_without(event_id),
        }),
    }
}

/// 删除包含关系后超出上限的门票数量
///
/// 删除唯一的包含关系时，所有已售门票都视为超出。
#[must_use]
pub fn excess_after_removal(packet: &PacketCapacity, event_id: i32) -> i64 {
    let remaining = packet.limit_without(event_id).unwrap_or(0);
    (packet.sold - remaining).max(0)
}

/// 新增（或按删除再创建处理的修改）门票
///
/// 快照中的 `sold` 不应包含正在修改的门票本身。
pub fn check_ticket(
    request: TicketRequest,
    event: Option<&EventCapacity>,
    packet: Option<&PacketCapacity>,
) -> Result<(), Violation> {
    if request.event_id.is_none() && request.packet_id.is_none() {
        return Err(Violation::MissingTicketTarget);
    }
    if let Some(event_id) = request.event_id {
        if event.is_none() {
            return Err(Violation::UnknownEvent { event_id });
        }
    }
    if let Some(packet_id) = request.packet_id {
        if packet.is_none() {
            return Err(Violation::UnknownPacket { packet_id });
        }
    }

    if let (Some(event_id), Some(packet)) = (request.event_id, packet) {
        if !packet.includes(event_id) {
            return Err(Violation::InclusionMissing {
                event_id,
                packet_id: packet.packet_id,
            });
        }
    }

    if let Some(event) = event {
        if let Some(seats) = event.seats {
            if event.sold + 1 > seats {
                return Err(Violation::EventSoldOut {
                    event_id: event.event_id,
                    seats,
                    sold: event.sold,
                });
            }
        }
    }

    if let Some(packet) = packet {
        let Some(limit) = packet.limit() else {
            return Err(Violation::PacketHasNoEvents {
                packet_id: packet.packet_id,
            });
        };
        if packet.sold + 1 > limit {
            return Err(Violation::PacketSoldOut {
                packet_id: packet.packet_id,
                limit,
                sold: packet.sold,
            });
        }
    }

    Ok(())
}
