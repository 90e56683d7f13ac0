//! Skypost - mirror published content to Bluesky
//!
//! This library turns a "content published" notification from a content
//! management system into a Bluesky post made of the content's title and
//! permalink, with the host's option store, activity log and metadata
//! store injected as traits.

pub mod activity_log;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod publisher;
pub mod text;
pub mod types;

// Re-export commonly used types
pub use config::{Config, SettingsProvider};
pub use db::{Database, ShareStore};
pub use error::{Result, SkypostError};
pub use publisher::{PostPublisher, PublishOutcome, PublishState, SkipReason};
pub use types::{ContentItem, ShareRecord};
