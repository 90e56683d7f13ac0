//! Core types for Skypost

use std::collections::BTreeSet;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Collection NSID for Bluesky feed posts
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Status value that marks content as published
pub const PUBLISHED_STATUS: &str = "publish";

/// The only content type that is mirrored
pub const QUALIFYING_TYPE: &str = "post";

/// A piece of content delivered with a "content published" notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    pub id: u64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(rename = "type", default = "default_type")]
    pub content_type: String,
    #[serde(default)]
    pub categories: BTreeSet<u64>,
    pub title: String,
    pub permalink: String,
}

fn default_status() -> String {
    PUBLISHED_STATUS.to_string()
}

fn default_type() -> String {
    QUALIFYING_TYPE.to_string()
}

impl ContentItem {
    pub fn is_published(&self) -> bool {
        self.status == PUBLISHED_STATUS
    }

    pub fn is_qualifying_type(&self) -> bool {
        self.content_type == QUALIFYING_TYPE
    }
}

/// Configured set of category ids that qualify content for mirroring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryAllowList(BTreeSet<u64>);

impl CategoryAllowList {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Build an allow-list from raw setting values.
    ///
    /// Negative numbers are made absolute and anything that does not parse
    /// as an integer is dropped.
    pub fn from_raw<S: AsRef<str>>(values: &[S]) -> Self {
        Self(
            values
                .iter()
                .filter_map(|v| v.as_ref().trim().parse::<i64>().ok())
                .map(|n| n.unsigned_abs())
                .collect(),
        )
    }

    /// True when at least one of `categories` is on the list
    pub fn intersects(&self, categories: &BTreeSet<u64>) -> bool {
        !self.0.is_disjoint(categories)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &u64> {
        self.0.iter()
    }
}

/// Bluesky login details
#[derive(Debug)]
pub struct Credentials {
    pub identifier: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Both the identifier and the app password are non-empty
    pub fn is_complete(&self) -> bool {
        !self.identifier.trim().is_empty() && !self.password.expose_secret().trim().is_empty()
    }
}

/// Result of `com.atproto.server.createSession`, used for a single post
#[derive(Debug)]
pub struct Session {
    pub access_jwt: SecretString,
    pub did: String,
}

/// Body of a `com.atproto.repo.createRecord` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRecordPayload {
    pub repo: String,
    pub collection: String,
    pub record: FeedPost,
}

impl PostRecordPayload {
    pub fn new(did: &str, text: String, created_at: String) -> Self {
        Self {
            repo: did.to_string(),
            collection: POST_COLLECTION.to_string(),
            record: FeedPost {
                record_type: POST_COLLECTION.to_string(),
                text,
                created_at,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedPost {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Persisted marker that a content item has been mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecord {
    pub content_id: u64,
    pub shared: bool,
    pub record_uri: Option<String>,
    pub shared_at: i64,
}

impl ShareRecord {
    pub fn shared(content_id: u64, record_uri: Option<String>) -> Self {
        Self {
            content_id,
            shared: true,
            record_uri,
            shared_at: chrono::Utc::now().timestamp(),
        }
    }
}
