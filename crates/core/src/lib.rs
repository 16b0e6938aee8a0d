//! Core business logic for companion.
//!
//! The forum consistency core (likes, comments, posts and the notifications
//! they fan out), articles, the survey aggregator, identity and session handling, and
//! the access guards that sit in front of navigation.

pub mod services;

pub use services::*;
