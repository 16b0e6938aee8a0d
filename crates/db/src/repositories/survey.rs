//! Survey definition and answers repository.

use std::sync::Arc;

use chrono::Utc;
use companion_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, prelude::Json, sea_query::Expr,
};

use super::{db_err, expect_one};
use crate::entities::{SurveyAnswers, SurveyDefinition, survey_answers, survey_definition};

/// Survey repository for database operations.
#[derive(Clone)]
pub struct SurveyRepository {
    db: Arc<DatabaseConnection>,
}

impl SurveyRepository {
    /// Create a new survey repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ==================== Definitions ====================

    /// Find a survey definition by ID.
    pub async fn find_definition(&self, id: &str) -> AppResult<Option<survey_definition::Model>> {
        SurveyDefinition::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Create a survey definition.
    pub async fn create_definition(
        &self,
        model: survey_definition::ActiveModel,
    ) -> AppResult<survey_definition::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// All survey definitions, newest first.
    pub async fn find_all_definitions(&self) -> AppResult<Vec<survey_definition::Model>> {
        SurveyDefinition::find()
            .order_by_desc(survey_definition::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Visible survey definitions, newest first.
    pub async fn find_visible_definitions(&self) -> AppResult<Vec<survey_definition::Model>> {
        SurveyDefinition::find()
            .filter(survey_definition::Column::IsHidden.eq(false))
            .order_by_desc(survey_definition::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Show or hide a survey. Returns whether the survey exists.
    pub async fn set_hidden(&self, id: &str, hidden: bool) -> AppResult<bool> {
        let result = SurveyDefinition::update_many()
            .col_expr(survey_definition::Column::IsHidden, Expr::value(hidden))
            .filter(survey_definition::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    // ==================== Answers ====================

    /// Find a user's answers document.
    pub async fn find_answers(&self, user_id: &str) -> AppResult<Option<survey_answers::Model>> {
        SurveyAnswers::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a user's answers document inside a transaction.
    pub async fn find_answers_tx(
        &self,
        txn: &DatabaseTransaction,
        user_id: &str,
    ) -> AppResult<Option<survey_answers::Model>> {
        SurveyAnswers::find_by_id(user_id)
            .one(txn)
            .await
            .map_err(db_err)
    }

    /// Write a user's answers document.
    ///
    /// `version` is the version read in this transaction, or `None` when the
    /// document did not exist yet.
    pub async fn save_answers_tx(
        &self,
        txn: &DatabaseTransaction,
        user_id: &str,
        version: Option<i32>,
        entries: Json,
    ) -> AppResult<()> {
        match version {
            None => {
                survey_answers::ActiveModel {
                    user_id: Set(user_id.to_string()),
                    entries: Set(entries),
                    version: Set(0),
                    updated_at: Set(Utc::now().into()),
                }
                .insert(txn)
                .await
                .map_err(|e| crate::map_write_err("survey answers", e))?;
                Ok(())
            }
            Some(version) => expect_one(
                SurveyAnswers::update_many()
                    .col_expr(survey_answers::Column::Entries, Expr::value(entries))
                    .col_expr(survey_answers::Column::UpdatedAt, Expr::value(Utc::now()))
                    .col_expr(survey_answers::Column::Version, Expr::value(version + 1))
                    .filter(survey_answers::Column::UserId.eq(user_id))
                    .filter(survey_answers::Column::Version.eq(version))
                    .exec(txn)
                    .await,
                "survey answers",
            ),
        }
    }

    /// A page of answers documents ordered by owner, starting after `after_user_id`.
    pub async fn scan_answers_page(
        &self,
        after_user_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<survey_answers::Model>> {
        let mut query = SurveyAnswers::find().order_by_asc(survey_answers::Column::UserId);
        if let Some(after) = after_user_id {
            query = query.filter(survey_answers::Column::UserId.gt(after));
        }
        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
