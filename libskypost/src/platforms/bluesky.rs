//! Bluesky (AT Protocol) XRPC client
//!
//! Only the two calls needed to mirror a post are implemented:
//! `com.atproto.server.createSession` and `com.atproto.repo.createRecord`.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, Result};
use crate::types::{Credentials, PostRecordPayload, Session};

const CREATE_SESSION: &str = "/xrpc/com.atproto.server.createSession";
const CREATE_RECORD: &str = "/xrpc/com.atproto.repo.createRecord";

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    did: String,
}

/// Reference to a record created in a repository
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CreatedRecord {
    pub uri: Option<String>,
    pub cid: Option<String>,
}

/// Map a transport-level reqwest error to a PlatformError
fn map_transport_error(error: reqwest::Error, context: &str) -> PlatformError {
    PlatformError::Network(format!(
        "Error during Bluesky {}: {}",
        context, error
    ))
}

pub struct BlueskyClient {
    http: reqwest::Client,
    service: String,
}

impl BlueskyClient {
    /// Create a client for the given service base URL (e.g. "https://bsky.social")
    pub fn new(service: &str) -> Result<Self> {
        Self::with_timeout(service, None)
    }

    /// Create a client with an optional request timeout
    ///
    /// With `None` the HTTP client's own defaults apply.
    pub fn with_timeout(service: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("skypost/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().map_err(|e| {
            PlatformError::Network(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            http,
            service: service.trim_end_matches('/').to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.service, path)
    }

    /// Log in with an identifier and app password
    pub async fn create_session(&self, credentials: &Credentials) -> Result<Session> {
        tracing::debug!("Creating Bluesky session for {}", credentials.identifier);

        let response = self
            .http
            .post(self.endpoint(CREATE_SESSION))
            .json(&CreateSessionRequest {
                identifier: &credentials.identifier,
                password: credentials.password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| map_transport_error(e, "authentication"))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(PlatformError::Status {
                context: "Authentication".to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body: CreateSessionResponse = response.json().await.map_err(|e| {
            PlatformError::Authentication(format!("Unexpected session response: {}", e))
        })?;

        tracing::debug!("Bluesky session created for {}", body.did);

        Ok(Session {
            access_jwt: SecretString::from(body.access_jwt),
            did: body.did,
        })
    }

    /// Create a record in the session's repository
    pub async fn create_record(
        &self,
        session: &Session,
        payload: &PostRecordPayload,
    ) -> Result<CreatedRecord> {
        tracing::debug!(
            "Posting to Bluesky: {} characters",
            payload.record.text.chars().count()
        );

        let response = self
            .http
            .post(self.endpoint(CREATE_RECORD))
            .bearer_auth(session.access_jwt.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| map_transport_error(e, "posting"))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(PlatformError::Status {
                context: "Record creation".to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        // The record exists at this point; a body we can't read only loses the URI
        let record = match response.json::<CreatedRecord>().await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Unreadable createRecord response: {}", e);
                CreatedRecord { uri: None, cid: None }
            }
        };

        if let Some(uri) = &record.uri {
            tracing::debug!("Posted to Bluesky: {}", uri);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SkypostError;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session {
            access_jwt: SecretString::from("tok".to_string()),
            did: "did:plc:abc".to_string(),
        }
    }

    #[test]
    fn test_service_trailing_slash_trimmed() {
        let client = BlueskyClient::new("https://bsky.social/").unwrap();
        assert_eq!(client.service(), "https://bsky.social");
        assert_eq!(
            client.endpoint(CREATE_SESSION),
            "https://bsky.social/xrpc/com.atproto.server.createSession"
        );
    }

    #[tokio::test]
    async fn test_create_session_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CREATE_SESSION))
            .and(body_json(serde_json::json!({
                "identifier": "me.bsky.social",
                "password": "app-pass"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accessJwt": "tok",
                "refreshJwt": "refresh",
                "handle": "me.bsky.social",
                "did": "did:plc:abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BlueskyClient::new(&server.uri()).unwrap();
        let session = client
            .create_session(&Credentials::new("me.bsky.social", "app-pass"))
            .await
            .unwrap();

        assert_eq!(session.did, "did:plc:abc");
        assert_eq!(session.access_jwt.expose_secret(), "tok");
    }

    #[tokio::test]
    async fn test_create_session_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CREATE_SESSION))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "AuthenticationRequired",
                "message": "Invalid identifier or password"
            })))
            .mount(&server)
            .await;

        let client = BlueskyClient::new(&server.uri()).unwrap();
        let result = client
            .create_session(&Credentials::new("me.bsky.social", "wrong"))
            .await;

        match result {
            Err(SkypostError::Platform(PlatformError::Status { status, context })) => {
                assert_eq!(status, 401);
                assert_eq!(context, "Authentication");
            }
            other => panic!("Expected status error, got {:?}", other.map(|s| s.did)),
        }
    }

    #[tokio::test]
    async fn test_create_session_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CREATE_SESSION))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = BlueskyClient::new(&server.uri()).unwrap();
        let result = client
            .create_session(&Credentials::new("me.bsky.social", "app-pass"))
            .await;

        assert!(matches!(
            result,
            Err(SkypostError::Platform(PlatformError::Authentication(_)))
        ));
    }

    #[tokio::test]
    async fn test_create_session_transport_error() {
        // Nothing listens on port 9 (discard) on test hosts
        let client = BlueskyClient::new("http://127.0.0.1:9").unwrap();
        let result = client
            .create_session(&Credentials::new("me.bsky.social", "app-pass"))
            .await;

        assert!(matches!(
            result,
            Err(SkypostError::Platform(PlatformError::Network(_)))
        ));
    }

    #[tokio::test]
    async fn test_create_record_sends_bearer_and_payload() {
        let server = MockServer::start().await;
        let payload = PostRecordPayload::new(
            "did:plc:abc",
            "Hello\nhttps://example.com/hello".to_string(),
            "2024-01-01T00:00:00.000Z".to_string(),
        );

        Mock::given(method("POST"))
            .and(path(CREATE_RECORD))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", "application/json"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uri": "at://did:plc:abc/app.bsky.feed.post/3kabc",
                "cid": "bafyrei"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BlueskyClient::new(&server.uri()).unwrap();
        let record = client.create_record(&session(), &payload).await.unwrap();

        assert_eq!(
            record.uri.as_deref(),
            Some("at://did:plc:abc/app.bsky.feed.post/3kabc")
        );
    }

    #[tokio::test]
    async fn test_create_record_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CREATE_RECORD))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = BlueskyClient::new(&server.uri()).unwrap();
        let payload = PostRecordPayload::new("did:plc:abc", "x".to_string(), "t".to_string());
        let result = client.create_record(&session(), &payload).await;

        match result {
            Err(SkypostError::Platform(PlatformError::Status { status, .. })) => {
                assert_eq!(status, 500)
            }
            _ => panic!("Expected status error"),
        }
    }

    #[tokio::test]
    async fn test_create_record_empty_body_still_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CREATE_RECORD))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = BlueskyClient::new(&server.uri()).unwrap();
        let payload = PostRecordPayload::new("did:plc:abc", "x".to_string(), "t".to_string());
        let record = client.create_record(&session(), &payload).await.unwrap();

        assert!(record.uri.is_none());
    }
}
