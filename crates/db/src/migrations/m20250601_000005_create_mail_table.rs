//! Create outgoing mail table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Mail::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Mail::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Mail::To).string_len(320).not_null())
                    .col(ColumnDef::new(Mail::Subject).string().not_null())
                    .col(ColumnDef::new(Mail::Html).text().not_null())
                    .col(
                        ColumnDef::new(Mail::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Mail::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Mail {
    Table,
    Id,
    To,
    Subject,
    Html,
    CreatedAt,
}
