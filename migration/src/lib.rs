pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_events_table;
mod m20250301_000002_create_event_packets_table;
mod m20250301_000003_create_event_packet_inclusions_table;
mod m20250301_000004_create_tickets_table;
mod m20250301_000005_create_idm_users_table;
mod m20250301_000006_create_relationship_tuples_table;
mod m20250301_000007_create_user_profiles_table;

/// 活动管理服务的迁移集合
pub struct EventManagerMigrator;

#[async_trait::async_trait]
impl MigratorTrait for EventManagerMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_events_table::Migration),
            Box::new(m20250301_000002_create_event_packets_table::Migration),
            Box::new(m20250301_000003_create_event_packet_inclusions_table::Migration),
            Box::new(m20250301_000004_create_tickets_table::Migration),
        ]
    }
}

/// 身份管理服务的迁移集合
pub struct IdmMigrator;

#[async_trait::async_trait]
impl MigratorTrait for IdmMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000005_create_idm_users_table::Migration),
            Box::new(m20250301_000006_create_relationship_tuples_table::Migration),
        ]
    }
}

/// 用户管理服务的迁移集合
pub struct UserManagerMigrator;

#[async_trait::async_trait]
impl MigratorTrait for UserManagerMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20250301_000007_create_user_profiles_table::Migration,
        )]
    }
}

/// 全量迁移，供开发环境共享同一个数据库时使用
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        let mut migrations = EventManagerMigrator::migrations();
        migrations.extend(IdmMigrator::migrations());
        migrations.extend(UserManagerMigrator::migrations());
        migrations
    }
}
