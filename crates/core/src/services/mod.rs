//! Business logic services.

#![allow(missing_docs)]

pub mod admin;
pub mod article;
pub mod auth;
pub mod comment;
pub mod event_publisher;
pub mod guards;
pub mod identity;
pub mod jobs;
pub mod like;
pub mod mail;
pub mod notification;
pub mod post;
pub mod session;
pub mod survey;

pub use admin::{AdminService, BroadcastMailInput, USER_SEARCH_LIMIT};
pub use article::{
    Article, ArticleBlock, ArticleBlockInput, ArticleService, CreateArticleInput,
    LATEST_ARTICLES_LIMIT,
};
pub use auth::{AuthService, AuthenticatedUser, RegisterInput};
pub use comment::{CommentInput, CommentService, comment_notification_message};
pub use event_publisher::{
    BroadcastEventPublisher, EventPublisher, EventPublisherService, NoOpEventPublisher, StoreEvent,
};
pub use guards::{
    GuardOutcome, Redirect, admin_guard, auth_guard, post_exists_guard, survey_guard,
};
pub use identity::{
    Identity, IdentityProvider, IdentityProviderService, LocalIdentityProvider, ResetCode,
    SignedIn,
};
pub use jobs::{JobExecutor, SchedulerConfig, spawn_scheduler};
pub use like::LikeService;
pub use mail::MailService;
pub use notification::NotificationService;
pub use post::{
    CreatePostInput, EditPostInput, ImageUpload, LATEST_POSTS_LIMIT, MAX_FILTERED_POSTS, Post,
    PostSearch, PostService,
};
pub use session::Session;
pub use survey::{
    CreateSurveyInput, IncompleteSurveysWatch, SurveyAnswerEntry, SurveyDefinition,
    SurveyService, SurveyStatistics, UserSurveyAnswers, compute_statistics,
};
