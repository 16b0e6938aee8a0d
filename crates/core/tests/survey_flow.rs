//! Survey flow tests: submission, incomplete sets, statistics and guards.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use companion_common::AppError;
use companion_core::{
    BroadcastEventPublisher, CreateSurveyInput, EventPublisherService, GuardOutcome, Identity,
    MailService, Redirect, SurveyDefinition, SurveyService, survey_guard,
};
use companion_db::{repositories::MailRepository, test_utils::TestDatabase};

struct Surveys {
    _db: TestDatabase,
    service: SurveyService,
    mail_repo: MailRepository,
}

async fn surveys() -> Surveys {
    let db = TestDatabase::new().await.unwrap();
    let shared = db.shared();
    let events: EventPublisherService = Arc::new(BroadcastEventPublisher::new());
    let mail_repo = MailRepository::new(shared.clone());
    let mail = MailService::new(mail_repo.clone(), "http://localhost:3000".to_string());

    Surveys {
        service: SurveyService::new(shared, mail, events, 5),
        mail_repo,
        _db: db,
    }
}

fn admin() -> Identity {
    Identity {
        uid: "admin".into(),
        email: "admin@example.com".into(),
        is_admin: true,
    }
}

fn user(uid: &str) -> Identity {
    Identity {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
        is_admin: false,
    }
}

async fn define(surveys: &Surveys, name: &str, questions: &[&str]) -> SurveyDefinition {
    surveys
        .service
        .create_definition(
            &admin(),
            CreateSurveyInput {
                name: name.to_string(),
                questions: questions.iter().map(ToString::to_string).collect(),
            },
        )
        .await
        .unwrap()
}

fn ids(definitions: &[SurveyDefinition]) -> Vec<&str> {
    definitions.iter().map(|d| d.id.as_str()).collect()
}

#[tokio::test]
async fn test_only_admins_define_surveys() {
    let surveys = surveys().await;
    let err = surveys
        .service
        .create_definition(
            &user("u1"),
            CreateSurveyInput {
                name: "Sneaky".into(),
                questions: vec!["Q1".into()],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = surveys
        .service
        .create_definition(
            &admin(),
            CreateSurveyInput {
                name: "Blank question".into(),
                questions: vec!["Q1".into(), "  ".into()],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_incomplete_set_shrinks_as_surveys_are_completed() {
    let surveys = surveys().await;
    let first = define(&surveys, "First", &["Q1"]).await;
    let second = define(&surveys, "Second", &["Q1", "Q2"]).await;
    let hidden = define(&surveys, "Hidden", &["Q1"]).await;
    surveys
        .service
        .set_hidden(&admin(), &hidden.id, true)
        .await
        .unwrap();

    let incomplete = surveys.service.get_incomplete("u1").await.unwrap();
    assert_eq!(incomplete.len(), 2);
    assert!(!ids(&incomplete).contains(&hidden.id.as_str()));

    surveys
        .service
        .submit_answers("u1", &first.id, vec![3.0])
        .await
        .unwrap();
    let incomplete = surveys.service.get_incomplete("u1").await.unwrap();
    assert_eq!(ids(&incomplete), vec![second.id.as_str()]);

    surveys
        .service
        .submit_answers("u1", &second.id, vec![1.0, 2.0])
        .await
        .unwrap();
    assert!(surveys.service.get_incomplete("u1").await.unwrap().is_empty());

    // Other users are unaffected.
    assert_eq!(surveys.service.get_incomplete("u2").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_submit_validation() {
    let surveys = surveys().await;
    let survey = define(&surveys, "Check-in", &["Q1", "Q2"]).await;

    let err = surveys
        .service
        .submit_answers("u1", &survey.id, vec![1.0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = surveys
        .service
        .submit_answers("u1", "missing", vec![1.0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SurveyNotFound(_)));

    let err = surveys
        .service
        .submit_answers("", &survey.id, vec![1.0, 2.0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    surveys
        .service
        .set_hidden(&admin(), &survey.id, true)
        .await
        .unwrap();
    let err = surveys
        .service
        .submit_answers("u1", &survey.id, vec![1.0, 2.0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert!(
        surveys
            .service
            .get_user_answers("u1")
            .await
            .unwrap()
            .entries
            .is_empty()
    );
}

#[tokio::test]
async fn test_resubmission_replaces_only_that_entry() {
    let surveys = surveys().await;
    let d = define(&surveys, "D", &["Q1", "Q2", "Q3"]).await;
    let other = define(&surveys, "Other", &["Q1"]).await;

    surveys
        .service
        .submit_answers("u", &other.id, vec![7.0])
        .await
        .unwrap();
    surveys
        .service
        .submit_answers("u", &d.id, vec![4.0, 5.0, 6.0])
        .await
        .unwrap();

    let answers = surveys.service.get_user_answers("u").await.unwrap();
    let entry = &answers.entries[&d.id];
    assert!(entry.completed);
    assert!(entry.completed_at.is_some());
    assert_eq!(entry.responses, vec![4.0, 5.0, 6.0]);

    surveys
        .service
        .submit_answers("u", &d.id, vec![1.0, 2.0, 3.0])
        .await
        .unwrap();

    let answers = surveys.service.get_user_answers("u").await.unwrap();
    assert_eq!(answers.entries.len(), 2);
    assert_eq!(answers.entries[&d.id].responses, vec![1.0, 2.0, 3.0]);
    assert_eq!(answers.entries[&other.id].responses, vec![7.0]);
}

#[tokio::test]
async fn test_statistics_across_users() {
    let surveys = surveys().await;
    let survey = define(&surveys, "Two questions", &["Q1", "Q2"]).await;

    let empty = surveys
        .service
        .get_statistics(&admin(), &survey.id)
        .await
        .unwrap();
    assert_eq!(empty.respondents, 0);
    assert_eq!(empty.mean, vec![0.0, 0.0]);
    assert_eq!(empty.stddev, vec![0.0, 0.0]);

    surveys
        .service
        .submit_answers("u1", &survey.id, vec![1.0, 3.0])
        .await
        .unwrap();
    surveys
        .service
        .submit_answers("u2", &survey.id, vec![3.0, 5.0])
        .await
        .unwrap();

    let responses = surveys.service.get_all_responses(&survey.id).await.unwrap();
    assert_eq!(responses.len(), 2);

    let stats = surveys
        .service
        .get_statistics(&admin(), &survey.id)
        .await
        .unwrap();
    assert_eq!(stats.respondents, 2);
    assert_eq!(stats.mean, vec![2.0, 4.0]);
    assert_eq!(stats.stddev, vec![1.0, 1.0]);

    let err = surveys
        .service
        .get_statistics(&user("u1"), &survey.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_watch_recomputes_after_submission() {
    let surveys = surveys().await;
    let survey = define(&surveys, "Watched", &["Q1"]).await;

    let mut watch = surveys.service.watch_incomplete("u1");
    let initial = watch.next().await.unwrap().unwrap();
    assert_eq!(ids(&initial), vec![survey.id.as_str()]);

    surveys
        .service
        .submit_answers("u1", &survey.id, vec![5.0])
        .await
        .unwrap();
    let after = watch.next().await.unwrap().unwrap();
    assert!(after.is_empty());

    let added = define(&surveys, "Another", &["Q1"]).await;
    let after = watch.next().await.unwrap().unwrap();
    assert_eq!(ids(&after), vec![added.id.as_str()]);
}

#[tokio::test]
async fn test_survey_guard() {
    let surveys = surveys().await;
    let survey = define(&surveys, "Guarded", &["Q1"]).await;
    let u1 = user("u1");

    assert_eq!(
        survey_guard(&surveys.service, None, &survey.id).await,
        GuardOutcome::Redirect(Redirect::Profile)
    );
    assert_eq!(
        survey_guard(&surveys.service, Some(&u1), &survey.id).await,
        GuardOutcome::Allow
    );

    surveys
        .service
        .submit_answers(&u1.uid, &survey.id, vec![2.0])
        .await
        .unwrap();
    assert_eq!(
        survey_guard(&surveys.service, Some(&u1), &survey.id).await,
        GuardOutcome::Redirect(Redirect::Profile)
    );
}

#[tokio::test]
async fn test_new_survey_without_users_queues_no_mail() {
    let surveys = surveys().await;
    define(&surveys, "Quiet", &["Q1"]).await;
    assert!(surveys.mail_repo.find_all().await.unwrap().is_empty());
}
