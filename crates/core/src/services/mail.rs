//! Mail queue service.
//!
//! Mail is not delivered here. Each message becomes a row in the mail table,
//! which an external delivery process drains.

use chrono::Utc;
use companion_common::{AppResult, IdGenerator};
use companion_db::{entities::mail, repositories::MailRepository};
use sea_orm::Set;
use tracing::info;

/// Mail queue service.
#[derive(Clone)]
pub struct MailService {
    mail_repo: MailRepository,
    server_url: String,
    id_gen: IdGenerator,
}

impl MailService {
    /// Create a new mail service.
    #[must_use]
    pub fn new(mail_repo: MailRepository, server_url: String) -> Self {
        Self {
            mail_repo,
            server_url: server_url.trim_end_matches('/').to_string(),
            id_gen: IdGenerator::new(),
        }
    }

    fn build(&self, to: &str, subject: &str, html: &str) -> mail::ActiveModel {
        mail::ActiveModel {
            id: Set(self.id_gen.generate()),
            to: Set(to.to_string()),
            subject: Set(subject.to_string()),
            html: Set(html.to_string()),
            created_at: Set(Utc::now().into()),
        }
    }

    /// Enqueue one mail.
    pub async fn enqueue(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        self.mail_repo.enqueue(self.build(to, subject, html)).await?;
        Ok(())
    }

    /// Enqueue the same mail to every recipient in one atomic batch.
    ///
    /// Duplicate addresses receive a single copy.
    pub async fn enqueue_to_all(
        &self,
        recipients: &[String],
        subject: &str,
        html: &str,
    ) -> AppResult<usize> {
        let mut unique: Vec<&str> = recipients.iter().map(String::as_str).collect();
        unique.sort_unstable();
        unique.dedup();

        let models = unique
            .into_iter()
            .map(|to| self.build(to, subject, html))
            .collect();
        let count = self.mail_repo.enqueue_batch(models).await?;
        info!(count, subject = %subject, "Mail batch enqueued");
        Ok(count)
    }

    /// Announce a new survey to every recipient.
    pub async fn announce_survey(
        &self,
        recipients: &[String],
        survey_id: &str,
        survey_name: &str,
    ) -> AppResult<usize> {
        let subject = format!("New Survey Available: {survey_name}");
        let html = format!(
            "<p>A new survey, <strong>{survey_name}</strong>, is waiting for you.</p>\
             <p><a href=\"{}/surveys/{survey_id}\">Take the survey</a></p>",
            self.server_url
        );
        self.enqueue_to_all(recipients, &subject, &html).await
    }

    /// Send a password reset code.
    pub async fn send_password_reset(&self, to: &str, code: &str) -> AppResult<()> {
        let html = format!(
            "<p>Your password reset code is <strong>{code}</strong>.</p>\
             <p>If you did not ask to reset your password, ignore this mail.</p>"
        );
        self.enqueue(to, "Reset your password", &html).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use companion_db::test_utils::TestDatabase;

    #[tokio::test]
    async fn test_survey_announcement_deduplicates_recipients() {
        let db = TestDatabase::new().await.unwrap();
        let repo = MailRepository::new(db.shared());
        let service = MailService::new(repo.clone(), "https://companion.example/".into());

        let recipients = vec![
            "b@example.com".to_string(),
            "a@example.com".to_string(),
            "b@example.com".to_string(),
        ];
        let sent = service
            .announce_survey(&recipients, "s1", "Weekly check-in")
            .await
            .unwrap();
        assert_eq!(sent, 2);

        let mails = repo.find_all().await.unwrap();
        assert_eq!(mails.len(), 2);
        assert!(mails.iter().all(|m| m.subject == "New Survey Available: Weekly check-in"));
        assert!(mails[0].html.contains("https://companion.example/surveys/s1"));
    }
}
