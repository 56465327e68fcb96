use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RelationshipTuples::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RelationshipTuples::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RelationshipTuples::ResourceType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RelationshipTuples::ResourceId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RelationshipTuples::Relation)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RelationshipTuples::SubjectType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RelationshipTuples::SubjectId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RelationshipTuples::SubjectRelation).string_len(64))
                    .col(
                        ColumnDef::new(RelationshipTuples::CreatedAt)
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
                    .name("idx_relationship_tuples_resource_relation")
                    .table(RelationshipTuples::Table)
                    .col(RelationshipTuples::ResourceType)
                    .col(RelationshipTuples::ResourceId)
                    .col(RelationshipTuples::Relation)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RelationshipTuples::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RelationshipTuples {
    Table,
    Id,
    ResourceType,
    ResourceId,
    Relation,
    SubjectType,
    SubjectId,
    SubjectRelation,
    CreatedAt,
}
