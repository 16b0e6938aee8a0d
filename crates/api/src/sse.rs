//! Server-Sent Events over the change feed.
//!
//! `/stream/feed` forwards store events; events scoped to a user (likes,
//! notifications, survey answers) only reach that user. `/stream/surveys`
//! pushes the caller's incomplete survey set whenever it may have changed.

#![allow(missing_docs)]

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use companion_core::{StoreEvent, SurveyDefinition};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
};

/// SSE event types.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SseEvent {
    /// Connection established.
    Connected,
    PostChanged { id: String },
    PostDeleted { id: String },
    #[serde(rename_all = "camelCase")]
    CommentsChanged { post_id: String },
    LikesChanged,
    NotificationsChanged,
    SurveysChanged,
    SurveyAnswersChanged,
    ArticlesChanged,
    /// Current incomplete survey set of the subscriber.
    IncompleteSurveys { surveys: Vec<SurveyDefinition> },
    Error { message: String },
}

impl SseEvent {
    /// Translate a store event for a subscriber. `None` when the subscriber
    /// may not see it.
    #[must_use]
    pub fn for_subscriber(event: StoreEvent, uid: Option<&str>) -> Option<Self> {
        let owned_by = |owner: &str| uid == Some(owner);
        match event {
            StoreEvent::PostChanged { id } => Some(Self::PostChanged { id }),
            StoreEvent::PostDeleted { id } => Some(Self::PostDeleted { id }),
            StoreEvent::CommentsChanged { post_id } => Some(Self::CommentsChanged { post_id }),
            StoreEvent::SurveyDefinitionsChanged => Some(Self::SurveysChanged),
            StoreEvent::ArticlesChanged => Some(Self::ArticlesChanged),
            StoreEvent::LikesChanged { user_id } => {
                owned_by(user_id.as_str()).then_some(Self::LikesChanged)
            }
            StoreEvent::NotificationsChanged { user_id } => {
                owned_by(user_id.as_str()).then_some(Self::NotificationsChanged)
            }
            StoreEvent::SurveyAnswersChanged { user_id } => {
                owned_by(user_id.as_str()).then_some(Self::SurveyAnswersChanged)
            }
        }
    }

    fn into_event(self) -> Event {
        Event::default()
            .json_data(&self)
            .unwrap_or_else(|_| Event::default().data("error"))
    }
}

fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(30))
        .text("ping")
}

/// Change feed stream.
async fn feed(
    MaybeAuthUser(identity): MaybeAuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let uid = identity.map(|i| i.uid);
    let rx = state.event_publisher.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        result
            .ok()
            .and_then(|event| SseEvent::for_subscriber(event, uid.as_deref()))
            .map(|event| Ok(event.into_event()))
    });

    let initial = stream::once(async { Ok(SseEvent::Connected.into_event()) });

    Sse::new(initial.chain(stream)).keep_alive(keep_alive())
}

/// Incomplete survey stream of the caller.
async fn incomplete_surveys(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let watch = state.survey_service.watch_incomplete(&identity.uid);

    let stream = stream::unfold(watch, |mut watch| async move {
        let next = watch.next().await?;
        let event = match next {
            Ok(surveys) => SseEvent::IncompleteSurveys { surveys },
            Err(e) => SseEvent::Error {
                message: e.to_string(),
            },
        };
        Some((Ok(event.into_event()), watch))
    });

    Sse::new(stream).keep_alive(keep_alive())
}

/// Create SSE router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed", get(feed))
        .route("/surveys", get(incomplete_surveys))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_scoped_events_reach_only_their_owner() {
        let event = StoreEvent::NotificationsChanged {
            user_id: "alice".into(),
        };
        assert!(SseEvent::for_subscriber(event.clone(), Some("alice")).is_some());
        assert!(SseEvent::for_subscriber(event.clone(), Some("bob")).is_none());
        assert!(SseEvent::for_subscriber(event, None).is_none());

        let public = StoreEvent::PostDeleted { id: "p1".into() };
        assert!(SseEvent::for_subscriber(public, None).is_some());
    }

    #[test]
    fn test_event_serialization() {
        let event = SseEvent::CommentsChanged {
            post_id: "p1".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"commentsChanged\""));
        assert!(json.contains("\"postId\":\"p1\""));
    }
}
