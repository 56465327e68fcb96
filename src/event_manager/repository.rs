//! # 活动管理存储层
//!
//! 事务内使用的读写辅助函数。所有涉及容量的写操作先对相关活动、套票执行
//! `version = version + 1`，以此在读取快照之前拿到行写锁；顺序固定为先活动
//! 后套票、同类按 id 升序。

use entity::{event_packet_inclusions, event_packets, events, tickets};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

use super::services::shared::as_count;
use crate::domain::{EventCapacity, PacketCapacity, Violation};
use crate::error::{Result, TicketingError};

/// 递增活动版本号，返回活动是否存在
pub async fn bump_event<C: ConnectionTrait>(conn: &C, event_id: i32) -> Result<bool> {
    let result = events::Entity::update_many()
        .col_expr(events::Column::Version, Expr::col(events::Column::Version).add(1))
        .filter(events::Column::Id.eq(event_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

/// 递增套票版本号，返回套票是否存在
pub async fn bump_packet<C: ConnectionTrait>(conn: &C, packet_id: i32) -> Result<bool> {
    let result = event_packets::Entity::update_many()
        .col_expr(
            event_packets::Column::Version,
            Expr::col(event_packets::Column::Version).add(1),
        )
        .filter(event_packets::Column::Id.eq(packet_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

/// 按固定顺序锁定一组活动与套票，返回不存在的那些
///
/// 传入的 id 可以重复或为空。
pub async fn lock_all<C: ConnectionTrait>(
    conn: &C,
    event_ids: &[Option<i32>],
    packet_ids: &[Option<i32>],
) -> Result<(Vec<i32>, Vec<i32>)> {
    let mut events: Vec<i32> = event_ids.iter().flatten().copied().collect();
    events.sort_unstable();
    events.dedup();
    let mut packets: Vec<i32> = packet_ids.iter().flatten().copied().collect();
    packets.sort_unstable();
    packets.dedup();

    let mut missing_events = Vec::new();
    for id in events {
        if !bump_event(conn, id).await? {
            missing_events.push(id);
        }
    }
    let mut missing_packets = Vec::new();
    for id in packets {
        if !bump_packet(conn, id).await? {
            missing_packets.push(id);
        }
    }
    Ok((missing_events, missing_packets))
}

pub async fn find_event<C: ConnectionTrait>(conn: &C, event_id: i32) -> Result<events::Model> {
    events::Entity::find_by_id(event_id)
        .one(conn)
        .await?
        .ok_or_else(|| TicketingError::not_found("event", event_id))
}

pub async fn find_packet<C: ConnectionTrait>(
    conn: &C,
    packet_id: i32,
) -> Result<event_packets::Model> {
    event_packets::Entity::find_by_id(packet_id)
        .one(conn)
        .await?
        .ok_or_else(|| TicketingError::not_found("event packet", packet_id))
}

/// 请求体引用的活动，不存在时按字段错误返回
pub async fn referenced_event<C: ConnectionTrait>(
    conn: &C,
    event_id: i32,
) -> Result<events::Model> {
    events::Entity::find_by_id(event_id)
        .one(conn)
        .await?
        .ok_or_else(|| Violation::UnknownEvent { event_id }.into())
}

/// 请求体引用的套票，不存在时按字段错误返回
pub async fn referenced_packet<C: ConnectionTrait>(
    conn: &C,
    packet_id: i32,
) -> Result<event_packets::Model> {
    event_packets::Entity::find_by_id(packet_id)
        .one(conn)
        .await?
        .ok_or_else(|| Violation::UnknownPacket { packet_id }.into())
}

pub async fn find_inclusion<C: ConnectionTrait>(
    conn: &C,
    event_id: i32,
    packet_id: i32,
) -> Result<Option<event_packet_inclusions::Model>> {
    Ok(event_packet_inclusions::Entity::find_by_id((event_id, packet_id))
        .one(conn)
        .await?)
}

pub async fn find_ticket<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<Option<tickets::Model>> {
    Ok(tickets::Entity::find_by_id(code.to_string()).one(conn).await?)
}

/// 活动容量快照，`exclude_ticket` 指定的门票不计入售出数
pub async fn event_capacity<C: ConnectionTrait>(
    conn: &C,
    event: &events::Model,
    exclude_ticket: Option<&str>,
) -> Result<EventCapacity> {
    let mut sold = tickets::Entity::find().filter(tickets::Column::EventId.eq(event.id));
    if let Some(code) = exclude_ticket {
        sold = sold.filter(tickets::Column::Code.ne(code));
    }
    let sold = sold.count(conn).await?;

    let allocated: i64 = event_packet_inclusions::Entity::find()
        .filter(event_packet_inclusions::Column::EventId.eq(event.id))
        .all(conn)
        .await?
        .iter()
        .map(|inclusion| i64::from(inclusion.allocated_seats))
        .sum();

    Ok(EventCapacity {
        event_id: event.id,
        seats: event.seats.map(i64::from),
        sold: as_count(sold),
        allocated,
    })
}

/// 套票容量快照，`exclude_ticket` 指定的门票不计入售出数
pub async fn packet_capacity<C: ConnectionTrait>(
    conn: &C,
    packet_id: i32,
    exclude_ticket: Option<&str>,
) -> Result<PacketCapacity> {
    let mut sold = tickets::Entity::find().filter(tickets::Column::PacketId.eq(packet_id));
    if let Some(code) = exclude_ticket {
        sold = sold.filter(tickets::Column::Code.ne(code));
    }
    let sold = sold.count(conn).await?;

    let allocations = event_packet_inclusions::Entity::find()
        .filter(event_packet_inclusions::Column::PacketId.eq(packet_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|inclusion| (inclusion.event_id, i64::from(inclusion.allocated_seats)))
        .collect();

    Ok(PacketCapacity {
        packet_id,
        sold: as_count(sold),
        allocations,
    })
}

/// 同时引用某活动与某套票的门票数
pub async fn count_pair_tickets<C: ConnectionTrait>(
    conn: &C,
    event_id: i32,
    packet_id: i32,
) -> Result<i64> {
    let count = tickets::Entity::find()
        .filter(tickets::Column::EventId.eq(event_id))
        .filter(tickets::Column::PacketId.eq(packet_id))
        .count(conn)
        .await?;
    Ok(as_count(count))
}

pub async fn event_name_taken<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<i32>,
) -> Result<bool> {
    let mut query = events::Entity::find().filter(events::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(events::Column::Id.ne(id));
    }
    Ok(query.count(conn).await? > 0)
}

pub async fn packet_name_taken<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<i32>,
) -> Result<bool> {
    let mut query = event_packets::Entity::find().filter(event_packets::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(event_packets::Column::Id.ne(id));
    }
    Ok(query.count(conn).await? > 0)
}

/// 删除同时引用 `(event_id, packet_id)` 的门票，返回删除数量
pub async fn delete_pair_tickets<C: ConnectionTrait>(
    conn: &C,
    event_id: i32,
    packet_id: i32,
) -> Result<u64> {
    let result = tickets::Entity::delete_many()
        .filter(tickets::Column::EventId.eq(event_id))
        .filter(tickets::Column::PacketId.eq(packet_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// 删除套票最新售出的 `count` 张门票
pub async fn delete_newest_packet_tickets<C: ConnectionTrait>(
    conn: &C,
    packet_id: i32,
    count: u64,
) -> Result<u64> {
    if count == 0 {
        return Ok(0);
    }
    let codes: Vec<String> = tickets::Entity::find()
        .select_only()
        .column(tickets::Column::Code)
        .filter(tickets::Column::PacketId.eq(packet_id))
        .order_by_desc(tickets::Column::CreatedAt)
        .order_by_desc(tickets::Column::Code)
        .limit(count)
        .into_tuple()
        .all(conn)
        .await?;
    if codes.is_empty() {
        return Ok(0);
    }
    let result = tickets::Entity::delete_many()
        .filter(tickets::Column::Code.is_in(codes))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// 清除门票上对某活动的引用
pub async fn detach_tickets_from_event<C: ConnectionTrait>(conn: &C, event_id: i32) -> Result<u64> {
    let result = tickets::Entity::update_many()
        .col_expr(tickets::Column::EventId, Expr::value(Option::<i32>::None))
        .filter(tickets::Column::EventId.eq(event_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// 清除门票上对某套票的引用
pub async fn detach_tickets_from_packet<C: ConnectionTrait>(
    conn: &C,
    packet_id: i32,
) -> Result<u64> {
    let result = tickets::Entity::update_many()
        .col_expr(tickets::Column::PacketId, Expr::value(Option::<i32>::None))
        .filter(tickets::Column::PacketId.eq(packet_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// 删除既无活动也无套票的门票
pub async fn delete_orphan_tickets<C: ConnectionTrait>(conn: &C) -> Result<u64> {
    let result = tickets::Entity::delete_many()
        .filter(tickets::Column::EventId.is_null())
        .filter(tickets::Column::PacketId.is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
