//! Publish-event to Bluesky post workflow
//!
//! [`PostPublisher`] reacts to a "content published" notification. When the
//! content qualifies it logs in to Bluesky and creates a post made of the
//! plain-text title and the permalink. Every failure is terminal for that
//! invocation: it is written to the activity log and reported as a
//! [`PublishOutcome`], never as an error to the caller.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libskypost::activity_log::MemoryActivityLog;
//! use libskypost::config::{MapSettings, ALLOWED_CATEGORIES_KEY};
//! use libskypost::db::MemoryShareStore;
//! use libskypost::platforms::BlueskyClient;
//! use libskypost::publisher::PostPublisher;
//! use libskypost::types::ContentItem;
//!
//! # async fn example() -> libskypost::Result<()> {
//! let settings = MapSettings::new()
//!     .with_text("bluesky_identifier", "me.bsky.social")
//!     .with_text("bluesky_password", "xxxx-xxxx-xxxx-xxxx")
//!     .with_list(ALLOWED_CATEGORIES_KEY, [3]);
//!
//! let publisher = PostPublisher::new(
//!     Arc::new(settings),
//!     Arc::new(MemoryActivityLog::new()),
//!     Arc::new(MemoryShareStore::new()),
//!     BlueskyClient::new("https://bsky.social")?,
//! );
//!
//! let item = ContentItem {
//!     id: 42,
//!     status: "publish".to_string(),
//!     content_type: "post".to_string(),
//!     categories: [3].into_iter().collect(),
//!     title: "Hello <em>world</em>".to_string(),
//!     permalink: "https://example.com/hello-world".to_string(),
//! };
//!
//! let outcome = publisher.handle_content_published(&item).await;
//! println!("{}", outcome);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::SecondsFormat;
use tracing::{debug, warn};

use crate::activity_log::ActivityLog;
use crate::config::SettingsProvider;
use crate::db::ShareStore;
use crate::error::{PlatformError, SkypostError};
use crate::platforms::BlueskyClient;
use crate::text::compose_post_text;
use crate::types::{ContentItem, PostRecordPayload, ShareRecord, QUALIFYING_TYPE};

/// Phases of a single publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    Authenticating,
    Posting,
    Done,
    Failed,
}

impl PublishState {
    fn can_advance_to(self, next: PublishState) -> bool {
        matches!(
            (self, next),
            (PublishState::Idle, PublishState::Authenticating)
                | (PublishState::Authenticating, PublishState::Posting)
                | (PublishState::Posting, PublishState::Done)
                | (PublishState::Idle, PublishState::Failed)
                | (PublishState::Authenticating, PublishState::Failed)
                | (PublishState::Posting, PublishState::Failed)
        )
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Idle => "idle",
            PublishState::Authenticating => "authenticating",
            PublishState::Posting => "posting",
            PublishState::Done => "done",
            PublishState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a notification did not lead to a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    CategoryNotAllowed,
    NotPublished(String),
    UnsupportedType(String),
    AlreadyShared,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CategoryNotAllowed => {
                write!(f, "categories do not match allowed categories")
            }
            SkipReason::NotPublished(status) => write!(f, "status is '{}'", status),
            SkipReason::UnsupportedType(kind) => {
                write!(f, "type '{}' is not '{}'", kind, QUALIFYING_TYPE)
            }
            SkipReason::AlreadyShared => write!(f, "already shared to Bluesky"),
        }
    }
}

/// What happened to a "content published" notification
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    /// Preconditions failed; no network call was made
    Skipped(SkipReason),
    /// The post was created
    Shared { record_uri: Option<String> },
    /// The attempt stopped in state `at`
    Failed { at: PublishState, error: PlatformError },
}

impl PublishOutcome {
    /// State the attempt ended in
    pub fn final_state(&self) -> PublishState {
        match self {
            PublishOutcome::Skipped(_) => PublishState::Idle,
            PublishOutcome::Shared { .. } => PublishState::Done,
            PublishOutcome::Failed { .. } => PublishState::Failed,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, PublishOutcome::Shared { .. })
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            PublishOutcome::Shared {
                record_uri: Some(uri),
            } => write!(f, "shared: {}", uri),
            PublishOutcome::Shared { record_uri: None } => write!(f, "shared"),
            PublishOutcome::Failed { at, error } => write!(f, "failed while {}: {}", at, error),
        }
    }
}

/// Tracks the state of one publish attempt
struct Attempt {
    content_id: u64,
    state: PublishState,
}

impl Attempt {
    fn start(content_id: u64) -> Self {
        Self {
            content_id,
            state: PublishState::Idle,
        }
    }

    fn advance(&mut self, next: PublishState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid publish transition {} -> {}",
            self.state,
            next
        );
        debug!(
            "Post {}: {} -> {}",
            self.content_id, self.state, next
        );
        self.state = next;
    }

    fn fail(&mut self, error: PlatformError) -> PublishOutcome {
        let at = self.state;
        self.advance(PublishState::Failed);
        PublishOutcome::Failed { at, error }
    }
}

fn into_platform_error(error: SkypostError) -> PlatformError {
    match error {
        SkypostError::Platform(e) => e,
        other => PlatformError::Posting(other.to_string()),
    }
}

/// Mirrors published content to Bluesky
pub struct PostPublisher {
    settings: Arc<dyn SettingsProvider>,
    log: Arc<dyn ActivityLog>,
    store: Arc<dyn ShareStore>,
    client: BlueskyClient,
    skip_already_shared: bool,
}

impl PostPublisher {
    /// Create a publisher from its collaborators
    ///
    /// Already-shared content is skipped by default; see
    /// [`with_skip_already_shared`](Self::with_skip_already_shared).
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        log: Arc<dyn ActivityLog>,
        store: Arc<dyn ShareStore>,
        client: BlueskyClient,
    ) -> Self {
        log.append("Plugin initialized");

        Self {
            settings,
            log,
            store,
            client,
            skip_already_shared: true,
        }
    }

    /// Whether content whose share flag is set should be skipped
    ///
    /// Turning this off sends a new post every time the content is
    /// republished.
    pub fn with_skip_already_shared(mut self, skip: bool) -> Self {
        self.skip_already_shared = skip;
        self
    }

    /// React to a "content published" notification
    pub async fn handle_content_published(&self, item: &ContentItem) -> PublishOutcome {
        if let Some(reason) = self.check_preconditions(item).await {
            let message = match &reason {
                SkipReason::CategoryNotAllowed => {
                    "Post categories do not match allowed categories - skipping".to_string()
                }
                other => format!("Post {} {} - skipping", item.id, other),
            };
            self.log.append(&message);
            return PublishOutcome::Skipped(reason);
        }

        self.publish_to_remote(item).await
    }

    async fn check_preconditions(&self, item: &ContentItem) -> Option<SkipReason> {
        if !self.settings.allowed_categories().intersects(&item.categories) {
            return Some(SkipReason::CategoryNotAllowed);
        }

        if !item.is_published() {
            return Some(SkipReason::NotPublished(item.status.clone()));
        }

        if !item.is_qualifying_type() {
            return Some(SkipReason::UnsupportedType(item.content_type.clone()));
        }

        if self.skip_already_shared {
            match self.store.is_shared(item.id).await {
                Ok(true) => return Some(SkipReason::AlreadyShared),
                Ok(false) => {}
                Err(e) => {
                    // Treat an unreadable flag as not shared
                    warn!("Failed to read share flag for post {}: {}", item.id, e);
                }
            }
        }

        None
    }

    /// Log in and create the Bluesky post for `item`
    ///
    /// Performs no precondition checks; callers go through
    /// [`handle_content_published`](Self::handle_content_published).
    pub async fn publish_to_remote(&self, item: &ContentItem) -> PublishOutcome {
        let mut attempt = Attempt::start(item.id);

        let credentials = self.settings.credentials();
        if !credentials.is_complete() {
            self.log.append("Bluesky credentials not set");
            return attempt.fail(PlatformError::CredentialsMissing);
        }

        attempt.advance(PublishState::Authenticating);
        let session = match self.client.create_session(&credentials).await {
            Ok(session) => session,
            Err(e) => {
                let error = into_platform_error(e);
                self.log.append(&format!("Bluesky authentication failed: {}", error));
                return attempt.fail(error);
            }
        };

        attempt.advance(PublishState::Posting);
        let payload = PostRecordPayload::new(
            &session.did,
            compose_post_text(&item.title, &item.permalink),
            chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        let record = match self.client.create_record(&session, &payload).await {
            Ok(record) => record,
            Err(e) => {
                let error = into_platform_error(e);
                self.log.append(&format!("Failed to post to Bluesky: {}", error));
                return attempt.fail(error);
            }
        };

        attempt.advance(PublishState::Done);
        self.log
            .append(&format!("Successfully posted to Bluesky: post {}", item.id));

        let share = ShareRecord::shared(item.id, record.uri.clone());
        if let Err(e) = self.store.mark_shared(&share).await {
            self.log.append(&format!(
                "Failed to record share flag for post {}: {}",
                item.id, e
            ));
        }

        PublishOutcome::Shared {
            record_uri: record.uri,
        }
    }
}
