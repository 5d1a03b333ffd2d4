use sea_orm_migration::prelude::*;

/// Prize items shown in the draw
#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Title,
    ImageUrl,
    CreatedAt,
}

/// Single-use codes handed out to visitors
#[derive(DeriveIden)]
enum AccessKeys {
    Table,
    Id,
    Code,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Products::ImageUrl).text().not_null())
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AccessKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccessKeys::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccessKeys::Code).string_len(255).not_null())
                    .col(
                        ColumnDef::new(AccessKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // consumption relies on at most one row per code
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_access_keys_code_unique")
                    .table(AccessKeys::Table)
                    .col(AccessKeys::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(AccessKeys::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Products::Table).to_owned())
            .await?;

        Ok(())
    }
}
