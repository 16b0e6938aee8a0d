//! Create survey_definition and survey_answers tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SurveyDefinition::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SurveyDefinition::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SurveyDefinition::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(SurveyDefinition::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SurveyDefinition::Questions).json().not_null())
                    .col(
                        ColumnDef::new(SurveyDefinition::IsHidden)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SurveyAnswers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SurveyAnswers::UserId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SurveyAnswers::Entries).json().not_null())
                    .col(
                        ColumnDef::new(SurveyAnswers::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SurveyAnswers::UpdatedAt)
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
            .drop_table(Table::drop().table(SurveyAnswers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SurveyDefinition::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SurveyDefinition {
    Table,
    Id,
    Name,
    CreatedAt,
    Questions,
    IsHidden,
}

#[derive(Iden)]
enum SurveyAnswers {
    Table,
    UserId,
    Entries,
    Version,
    UpdatedAt,
}
