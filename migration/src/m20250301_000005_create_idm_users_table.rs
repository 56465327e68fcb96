use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IdmUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdmUsers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IdmUsers::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(IdmUsers::PasswordHash)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IdmUsers::Role)
                            .string_len(32)
                            .not_null()
                            .default("owner-event"),
                    )
                    .col(
                        ColumnDef::new(IdmUsers::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IdmUsers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum IdmUsers {
    Table,
    Id,
    Email,
    PasswordHash,
    Role,
    CreatedAt,
}
