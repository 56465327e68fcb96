use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EventPacketInclusions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventPacketInclusions::EventId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventPacketInclusions::PacketId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventPacketInclusions::AllocatedSeats)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(EventPacketInclusions::EventId)
                            .col(EventPacketInclusions::PacketId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inclusions_event_id")
                            .from(EventPacketInclusions::Table, EventPacketInclusions::EventId)
                            .to(Events::Table, Events::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inclusions_packet_id")
                            .from(EventPacketInclusions::Table, EventPacketInclusions::PacketId)
                            .to(EventPackets::Table, EventPackets::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_inclusions_packet_id")
                    .table(EventPacketInclusions::Table)
                    .col(EventPacketInclusions::PacketId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventPacketInclusions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EventPacketInclusions {
    Table,
    EventId,
    PacketId,
    AllocatedSeats,
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum EventPackets {
    Table,
    Id,
}
