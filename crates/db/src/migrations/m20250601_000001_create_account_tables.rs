//! Create credential and app_user tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Credential::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Credential::Uid)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Credential::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Credential::PasswordHash).string().not_null())
                    .col(
                        ColumnDef::new(Credential::IsAdmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Credential::Token).string_len(64).unique_key())
                    .col(ColumnDef::new(Credential::ResetCode).string_len(16))
                    .col(ColumnDef::new(Credential::ResetExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Credential::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppUser::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppUser::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AppUser::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AppUser::Username).string_len(128).not_null())
                    .col(ColumnDef::new(AppUser::PhotoUrl).string().not_null())
                    .col(
                        ColumnDef::new(AppUser::Disabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AppUser::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: username (admin prefix search)
        manager
            .create_index(
                Index::create()
                    .name("idx_app_user_username")
                    .table(AppUser::Table)
                    .col(AppUser::Username)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppUser::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Credential::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Credential {
    Table,
    Uid,
    Email,
    PasswordHash,
    IsAdmin,
    Token,
    ResetCode,
    ResetExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
enum AppUser {
    Table,
    Id,
    Email,
    Username,
    PhotoUrl,
    Disabled,
    CreatedAt,
}
