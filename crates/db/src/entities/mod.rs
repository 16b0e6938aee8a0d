//! Database entities.

#![allow(missing_docs)]

pub mod app_user;
pub mod article;
pub mod comment;
pub mod credential;
pub mod mail;
pub mod notification;
pub mod post;
pub mod survey_answers;
pub mod survey_definition;
pub mod user_likes;

pub use app_user::Entity as AppUser;
pub use article::Entity as Article;
pub use comment::Entity as Comment;
pub use credential::Entity as Credential;
pub use mail::Entity as Mail;
pub use notification::Entity as Notification;
pub use post::Entity as Post;
pub use survey_answers::Entity as SurveyAnswers;
pub use survey_definition::Entity as SurveyDefinition;
pub use user_likes::Entity as UserLikes;
