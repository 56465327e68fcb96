use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EventPackets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventPackets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EventPackets::OwnerId).integer().not_null())
                    .col(
                        ColumnDef::new(EventPackets::Name)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(EventPackets::Location).string_len(255))
                    .col(ColumnDef::new(EventPackets::Description).text())
                    .col(ColumnDef::new(EventPackets::AllocatedSeats).integer())
                    .col(
                        ColumnDef::new(EventPackets::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(EventPackets::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EventPackets::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_packets_owner_id")
                    .table(EventPackets::Table)
                    .col(EventPackets::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventPackets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EventPackets {
    Table,
    Id,
    OwnerId,
    Name,
    Location,
    Description,
    AllocatedSeats,
    Version,
    CreatedAt,
    UpdatedAt,
}
