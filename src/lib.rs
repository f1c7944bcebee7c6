//! Inbox agent — polls an inbox for new unread mail, classifies each
//! message with a local language model, and dispatches replies in
//! priority order through the same provider.

pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mail;
pub mod report;
pub mod store;
