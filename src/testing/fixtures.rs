//! # 测试数据 Fixtures
//!
//! 请求方、活动、套票、包含关系与门票的预设数据

use chrono::{Duration, Utc};
use entity::{event_packet_inclusions, event_packets, events, tickets, user_profiles};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::json;

use crate::domain::TicketCode;
use crate::identity::{Principal, Role};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const OWNER_TOKEN: &str = "owner-token";
pub const OTHER_OWNER_TOKEN: &str = "other-owner-token";
pub const CLIENT_TOKEN: &str = "client-token";
pub const SERVICE_TOKEN: &str = "service-token";

/// 活动与套票默认所有者
pub const OWNER_ID: i32 = 1;
pub const OTHER_OWNER_ID: i32 = 2;
pub const CLIENT_ID: i32 = 7;

#[must_use]
pub const fn admin() -> Principal {
    Principal::new(100, Role::Admin)
}

#[must_use]
pub const fn owner() -> Principal {
    Principal::new(OWNER_ID, Role::OwnerEvent)
}

#[must_use]
pub const fn other_owner() -> Principal {
    Principal::new(OTHER_OWNER_ID, Role::OwnerEvent)
}

#[must_use]
pub const fn client() -> Principal {
    Principal::new(CLIENT_ID, Role::Client)
}

#[must_use]
pub const fn service() -> Principal {
    Principal::new(200, Role::ServiciuClienti)
}

/// 预置全部测试令牌的身份验证
#[must_use]
pub fn all_tokens() -> super::mocks::StaticIdentityProvider {
    super::mocks::StaticIdentityProvider::new()
        .with(ADMIN_TOKEN, admin())
        .with(OWNER_TOKEN, owner())
        .with(OTHER_OWNER_TOKEN, other_owner())
        .with(CLIENT_TOKEN, client())
        .with(SERVICE_TOKEN, service())
}

/// 活动测试数据构建器
pub struct EventFixture {
    pub owner_id: i32,
    pub name: String,
    pub location: Option<String>,
    pub seats: Option<i32>,
}

impl EventFixture {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            owner_id: OWNER_ID,
            name: name.to_string(),
            location: None,
            seats: None,
        }
    }

    #[must_use]
    pub const fn seats(mut self, seats: i32) -> Self {
        self.seats = Some(seats);
        self
    }

    #[must_use]
    pub const fn owner(mut self, owner_id: i32) -> Self {
        self.owner_id = owner_id;
        self
    }

    #[must_use]
    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub async fn insert(self, db: &DatabaseConnection) -> events::Model {
        let now = Utc::now().naive_utc();
        events::ActiveModel {
            owner_id: Set(self.owner_id),
            name: Set(self.name),
            location: Set(self.location),
            description: Set(None),
            seats: Set(self.seats),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("插入活动失败")
    }
}

/// 套票测试数据构建器
pub struct PacketFixture {
    pub owner_id: i32,
    pub name: String,
    pub allocated_seats: Option<i32>,
}

impl PacketFixture {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            owner_id: OWNER_ID,
            name: name.to_string(),
            allocated_seats: None,
        }
    }

    #[must_use]
    pub const fn owner(mut self, owner_id: i32) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub async fn insert(self, db: &DatabaseConnection) -> event_packets::Model {
        let now = Utc::now().naive_utc();
        event_packets::ActiveModel {
            owner_id: Set(self.owner_id),
            name: Set(self.name),
            location: Set(None),
            description: Set(None),
            allocated_seats: Set(self.allocated_seats),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("插入套票失败")
    }
}

pub async fn insert_inclusion(
    db: &DatabaseConnection,
    event_id: i32,
    packet_id: i32,
    allocated_seats: i32,
) -> event_packet_inclusions::Model {
    event_packet_inclusions::ActiveModel {
        event_id: Set(event_id),
        packet_id: Set(packet_id),
        allocated_seats: Set(allocated_seats),
    }
    .insert(db)
    .await
    .expect("插入包含关系失败")
}

/// 直接写入门票，不做容量检查
///
/// `age_secs` 越大售出时间越早，用于控制级联删除的顺序。
pub async fn insert_ticket(
    db: &DatabaseConnection,
    event_id: Option<i32>,
    packet_id: Option<i32>,
    age_secs: i64,
) -> tickets::Model {
    tickets::ActiveModel {
        code: Set(TicketCode::generate().to_string()),
        event_id: Set(event_id),
        packet_id: Set(packet_id),
        created_at: Set((Utc::now() - Duration::seconds(age_secs)).naive_utc()),
    }
    .insert(db)
    .await
    .expect("插入门票失败")
}

pub async fn insert_profile(db: &DatabaseConnection, id: i32, email: &str) -> user_profiles::Model {
    let now = Utc::now().naive_utc();
    user_profiles::ActiveModel {
        id: Set(id),
        email: Set(email.to_string()),
        first_name: Set(None),
        last_name: Set(None),
        ticket_list: Set(json!([])),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("插入档案失败")
}
