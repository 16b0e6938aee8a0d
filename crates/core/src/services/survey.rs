//! Survey service.
//!
//! Definitions are managed by admins. Each user has one answers document
//! mapping survey id to entry; submissions merge into it so answers to other
//! surveys are never overwritten.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use companion_common::{AppError, AppResult, IdGenerator};
use companion_db::{
    entities::{survey_answers, survey_definition},
    repositories::{SCAN_PAGE_SIZE, SurveyRepository, UserRepository, decode_json, encode_json},
    run_transaction,
};
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::services::event_publisher::{EventPublisherService, StoreEvent, publish_quietly};
use crate::services::identity::Identity;
use crate::services::mail::MailService;

/// A survey definition with its questions decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDefinition {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<FixedOffset>,
    pub questions: Vec<String>,
    pub is_hidden: bool,
}

impl TryFrom<survey_definition::Model> for SurveyDefinition {
    type Error = AppError;

    fn try_from(model: survey_definition::Model) -> AppResult<Self> {
        Ok(Self {
            questions: decode_json(&model.questions, "survey questions")?,
            id: model.id,
            name: model.name,
            created_at: model.created_at,
            is_hidden: model.is_hidden,
        })
    }
}

fn to_definitions(models: Vec<survey_definition::Model>) -> AppResult<Vec<SurveyDefinition>> {
    models.into_iter().map(SurveyDefinition::try_from).collect()
}

/// One user's answers to one survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnswerEntry {
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// `responses[i]` answers `questions[i]`.
    #[serde(default)]
    pub responses: Vec<f64>,
}

/// A user's answers document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSurveyAnswers {
    pub entries: BTreeMap<String, SurveyAnswerEntry>,
}

impl UserSurveyAnswers {
    /// Whether the user has completed the survey.
    #[must_use]
    pub fn has_completed(&self, survey_id: &str) -> bool {
        self.entries.get(survey_id).is_some_and(|e| e.completed)
    }
}

type Entries = BTreeMap<String, SurveyAnswerEntry>;

fn decode_entries(model: &survey_answers::Model) -> AppResult<Entries> {
    decode_json(&model.entries, "survey answers")
}

/// Input for creating a survey definition.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSurveyInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1, max = 100))]
    pub questions: Vec<String>,
}

/// Per-question statistics of a survey.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyStatistics {
    pub survey_id: String,
    pub questions: Vec<String>,
    pub respondents: usize,
    pub mean: Vec<f64>,
    pub stddev: Vec<f64>,
}

/// Mean and population standard deviation per question.
///
/// Rows whose length differs from `question_count` are skipped. With no
/// usable rows both vectors are all zeros.
#[must_use]
pub fn compute_statistics(question_count: usize, responses: &[Vec<f64>]) -> (usize, Vec<f64>, Vec<f64>) {
    let rows: Vec<&Vec<f64>> = responses
        .iter()
        .filter(|row| {
            let ok = row.len() == question_count;
            if !ok {
                warn!(
                    expected = question_count,
                    actual = row.len(),
                    "Skipping survey response with mismatched length"
                );
            }
            ok
        })
        .collect();

    let n = rows.len();
    if n == 0 {
        return (0, vec![0.0; question_count], vec![0.0; question_count]);
    }

    #[allow(clippy::cast_precision_loss)]
    let count = n as f64;
    let mean: Vec<f64> = (0..question_count)
        .map(|i| rows.iter().map(|row| row[i]).sum::<f64>() / count)
        .collect();
    let stddev = (0..question_count)
        .map(|i| {
            let variance = rows
                .iter()
                .map(|row| (row[i] - mean[i]).powi(2))
                .sum::<f64>()
                / count;
            variance.sqrt()
        })
        .collect();

    (n, mean, stddev)
}

/// Survey service for business logic.
#[derive(Clone)]
pub struct SurveyService {
    db: Arc<DatabaseConnection>,
    survey_repo: SurveyRepository,
    user_repo: UserRepository,
    mail: MailService,
    event_publisher: EventPublisherService,
    max_attempts: u32,
    id_gen: IdGenerator,
}

impl SurveyService {
    /// Create a new survey service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        mail: MailService,
        event_publisher: EventPublisherService,
        max_attempts: u32,
    ) -> Self {
        Self {
            survey_repo: SurveyRepository::new(db.clone()),
            user_repo: UserRepository::new(db.clone()),
            db,
            mail,
            event_publisher,
            max_attempts,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Definitions ====================

    /// Create a survey definition and announce it to every user by mail.
    pub async fn create_definition(
        &self,
        actor: &Identity,
        input: CreateSurveyInput,
    ) -> AppResult<SurveyDefinition> {
        actor.require_admin()?;
        input.validate()?;

        let name = input.name.trim().to_string();
        let questions: Vec<String> = input
            .questions
            .iter()
            .map(|q| q.trim().to_string())
            .collect();
        if name.is_empty() {
            return Err(AppError::BadRequest("Survey name is empty".to_string()));
        }
        if questions.iter().any(String::is_empty) {
            return Err(AppError::BadRequest("Survey questions must not be empty".to_string()));
        }

        let model = survey_definition::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(name),
            created_at: Set(Utc::now().into()),
            questions: Set(encode_json(&questions, "survey questions")?),
            is_hidden: Set(false),
        };
        let created = SurveyDefinition::try_from(self.survey_repo.create_definition(model).await?)?;
        info!(survey_id = %created.id, questions = created.questions.len(), "Survey created");

        match self.user_repo.find_all_emails().await {
            Ok(emails) => {
                if let Err(e) = self
                    .mail
                    .announce_survey(&emails, &created.id, &created.name)
                    .await
                {
                    warn!(survey_id = %created.id, error = %e, "Failed to announce survey");
                }
            }
            Err(e) => warn!(survey_id = %created.id, error = %e, "Failed to list survey recipients"),
        }

        publish_quietly(&self.event_publisher, StoreEvent::SurveyDefinitionsChanged).await;
        Ok(created)
    }

    /// Hide or show a survey definition.
    pub async fn set_hidden(&self, actor: &Identity, survey_id: &str, hidden: bool) -> AppResult<()> {
        actor.require_admin()?;
        if !self.survey_repo.set_hidden(survey_id, hidden).await? {
            return Err(AppError::SurveyNotFound(survey_id.to_string()));
        }
        info!(survey_id = %survey_id, hidden, "Survey visibility changed");
        publish_quietly(&self.event_publisher, StoreEvent::SurveyDefinitionsChanged).await;
        Ok(())
    }

    /// Every survey definition including hidden ones.
    pub async fn list_all(&self, actor: &Identity) -> AppResult<Vec<SurveyDefinition>> {
        actor.require_admin()?;
        to_definitions(self.survey_repo.find_all_definitions().await?)
    }

    /// Visible survey definitions, newest first.
    pub async fn list_visible(&self) -> AppResult<Vec<SurveyDefinition>> {
        to_definitions(self.survey_repo.find_visible_definitions().await?)
    }

    /// Get a survey definition.
    pub async fn get_definition(&self, survey_id: &str) -> AppResult<SurveyDefinition> {
        self.survey_repo
            .find_definition(survey_id)
            .await?
            .ok_or_else(|| AppError::SurveyNotFound(survey_id.to_string()))
            .and_then(SurveyDefinition::try_from)
    }

    // ==================== Answers ====================

    /// A user's answers document. Empty when the user has answered nothing.
    pub async fn get_user_answers(&self, user_id: &str) -> AppResult<UserSurveyAnswers> {
        let entries = match self.survey_repo.find_answers(user_id).await? {
            Some(model) => decode_entries(&model)?,
            None => Entries::new(),
        };
        Ok(UserSurveyAnswers { entries })
    }

    /// Record a completed survey, replacing any earlier entry for it.
    pub async fn submit_answers(
        &self,
        user_id: &str,
        survey_id: &str,
        responses: Vec<f64>,
    ) -> AppResult<()> {
        if user_id.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let definition = self.get_definition(survey_id).await?;
        if definition.is_hidden {
            return Err(AppError::Forbidden("Survey is closed".to_string()));
        }
        if responses.len() != definition.questions.len() {
            return Err(AppError::BadRequest(format!(
                "Expected {} responses, got {}",
                definition.questions.len(),
                responses.len()
            )));
        }
        if responses.iter().any(|r| !r.is_finite()) {
            return Err(AppError::BadRequest("Responses must be numbers".to_string()));
        }

        let entry = SurveyAnswerEntry {
            completed: true,
            completed_at: Some(Utc::now()),
            responses,
        };

        run_transaction(&self.db, self.max_attempts, |txn| {
            let repo = self.survey_repo.clone();
            let user_id = user_id.to_string();
            let survey_id = survey_id.to_string();
            let entry = entry.clone();
            Box::pin(async move {
                let existing = repo.find_answers_tx(txn, &user_id).await?;
                let (mut entries, version) = match &existing {
                    Some(model) => (decode_entries(model)?, Some(model.version)),
                    None => (Entries::new(), None),
                };
                entries.insert(survey_id, entry);
                repo.save_answers_tx(txn, &user_id, version, encode_json(&entries, "survey answers")?)
                    .await
            })
        })
        .await?;

        info!(user_id = %user_id, survey_id = %survey_id, "Survey answers submitted");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::SurveyAnswersChanged {
                user_id: user_id.to_string(),
            },
        )
        .await;
        Ok(())
    }

    /// Visible surveys the user has not completed.
    pub async fn get_incomplete(&self, user_id: &str) -> AppResult<Vec<SurveyDefinition>> {
        let definitions = self.list_visible().await?;
        let answers = self.get_user_answers(user_id).await?;
        Ok(definitions
            .into_iter()
            .filter(|d| !answers.has_completed(&d.id))
            .collect())
    }

    /// Watch the incomplete set of a user.
    ///
    /// The watch yields the current set first and again after every change to
    /// survey definitions or to that user's answers. Dropping it unsubscribes.
    #[must_use]
    pub fn watch_incomplete(&self, user_id: &str) -> IncompleteSurveysWatch {
        IncompleteSurveysWatch {
            events: self.event_publisher.subscribe(),
            service: self.clone(),
            user_id: user_id.to_string(),
            primed: false,
        }
    }

    // ==================== Aggregation ====================

    /// Response arrays of every completed entry for a survey, across all users.
    pub async fn get_all_responses(&self, survey_id: &str) -> AppResult<Vec<Vec<f64>>> {
        let mut responses = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .survey_repo
                .scan_answers_page(cursor.as_deref(), SCAN_PAGE_SIZE)
                .await?;
            let Some(last) = page.last() else { break };
            cursor = Some(last.user_id.clone());
            let full_page = page.len() as u64 == SCAN_PAGE_SIZE;

            for model in &page {
                match decode_entries(model) {
                    Ok(mut entries) => match entries.remove(survey_id) {
                        Some(entry) if entry.completed => responses.push(entry.responses),
                        _ => {}
                    },
                    Err(e) => {
                        warn!(user_id = %model.user_id, error = %e, "Skipping malformed answers document");
                    }
                }
            }

            if !full_page {
                break;
            }
        }

        debug!(survey_id = %survey_id, count = responses.len(), "Collected survey responses");
        Ok(responses)
    }

    /// Mean and population standard deviation of each question.
    pub async fn get_statistics(&self, actor: &Identity, survey_id: &str) -> AppResult<SurveyStatistics> {
        actor.require_admin()?;
        let definition = self.get_definition(survey_id).await?;
        let responses = self.get_all_responses(survey_id).await?;
        let (respondents, mean, stddev) =
            compute_statistics(definition.questions.len(), &responses);

        Ok(SurveyStatistics {
            survey_id: definition.id,
            questions: definition.questions,
            respondents,
            mean,
            stddev,
        })
    }
}

/// Subscription to a user's incomplete surveys.
pub struct IncompleteSurveysWatch {
    service: SurveyService,
    user_id: String,
    events: broadcast::Receiver<StoreEvent>,
    primed: bool,
}

impl IncompleteSurveysWatch {
    fn is_relevant(&self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::SurveyDefinitionsChanged => true,
            StoreEvent::SurveyAnswersChanged { user_id } => *user_id == self.user_id,
            _ => false,
        }
    }

    /// The next value of the incomplete set.
    ///
    /// Returns `None` once the change feed is closed.
    pub async fn next(&mut self) -> Option<AppResult<Vec<SurveyDefinition>>> {
        if self.primed {
            loop {
                match self.events.recv().await {
                    Ok(event) if self.is_relevant(&event) => break,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Incomplete survey watch lagged; recomputing");
                        break;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        } else {
            self.primed = true;
        }

        Some(self.service.get_incomplete(&self.user_id).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_use_population_stddev() {
        let (n, mean, stddev) = compute_statistics(2, &[vec![1.0, 3.0], vec![3.0, 5.0]]);
        assert_eq!(n, 2);
        assert_eq!(mean, vec![2.0, 4.0]);
        assert_eq!(stddev, vec![1.0, 1.0]);
    }

    #[test]
    fn test_statistics_without_responses_are_zero() {
        let (n, mean, stddev) = compute_statistics(3, &[]);
        assert_eq!(n, 0);
        assert_eq!(mean, vec![0.0; 3]);
        assert_eq!(stddev, vec![0.0; 3]);
    }

    #[test]
    fn test_statistics_skip_mismatched_rows() {
        let (n, mean, _) = compute_statistics(2, &[vec![2.0, 2.0], vec![9.0]]);
        assert_eq!(n, 1);
        assert_eq!(mean, vec![2.0, 2.0]);
    }

    #[test]
    fn test_entry_uses_camel_case() {
        let entry: SurveyAnswerEntry = serde_json::from_value(serde_json::json!({
            "completed": true,
            "completedAt": "2025-06-01T10:00:00Z",
            "responses": [4, 5, 6]
        }))
        .unwrap();
        assert!(entry.completed);
        assert_eq!(entry.responses, vec![4.0, 5.0, 6.0]);
        assert!(entry.completed_at.is_some());
    }
}
