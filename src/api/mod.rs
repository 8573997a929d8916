pub mod memory;
pub mod remote;

pub use memory::MemoryGateway;
pub use remote::RemoteGateway;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::GalleryError;
use crate::post::{Category, MediaFile, Post, PostDraft, PostUpdate};
use crate::tip::{Tip, TipDraft};
use crate::user::{Credentials, Registration, Session, User};

const RETRY_LIMIT: u32 = 3;

/// The operation set the rest of the tool is written against. One request
/// (or one mock mutation) per call; no caching, no deduplication, and no
/// recovery — every failure propagates to the caller.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn posts_by_category(&self, category: Category) -> Result<Vec<Post>, GalleryError>;
    async fn post(&self, id: &str) -> Result<Post, GalleryError>;
    async fn create_post(&self, draft: PostDraft) -> Result<Post, GalleryError>;
    async fn update_post(&self, id: &str, update: PostUpdate) -> Result<Post, GalleryError>;
    async fn delete_post(&self, id: &str) -> Result<(), GalleryError>;

    async fn recipes(&self) -> Result<Vec<Post>, GalleryError>;
    async fn recipe(&self, id: &str) -> Result<Post, GalleryError>;
    async fn create_recipe(&self, draft: PostDraft) -> Result<Post, GalleryError>;

    async fn tips(&self) -> Result<Vec<Tip>, GalleryError>;
    async fn tips_by_category(&self, category: &str) -> Result<Vec<Tip>, GalleryError>;
    async fn tip(&self, id: &str) -> Result<Tip, GalleryError>;
    async fn create_tip(&self, draft: TipDraft) -> Result<Tip, GalleryError>;
    async fn update_tip(&self, id: &str, draft: TipDraft) -> Result<Tip, GalleryError>;
    async fn delete_tip(&self, id: &str) -> Result<(), GalleryError>;

    async fn upload_media(&self, file: MediaFile) -> Result<MediaRef, GalleryError>;
    async fn download_media(&self, id: &str, path: &Path) -> Result<(), GalleryError>;

    async fn login(&self, credentials: Credentials) -> Result<Session, GalleryError>;
    async fn register(&self, registration: Registration) -> Result<Session, GalleryError>;
    async fn update_profile(&self, user: User) -> Result<User, GalleryError>;
}

/// What `/media/upload` hands back.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Shared HTTP plumbing: one reusable client wrapped with transient-retry
/// middleware, and a semaphore bounding in-flight requests.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    semaphore: Arc<Semaphore>,
}

impl HttpClient {
    pub fn new(limit: usize) -> Self {
        Self {
            client: Client::new(),
            semaphore: Arc::new(Semaphore::new(limit)),
        }
    }

    pub async fn client(&self) -> (ClientWithMiddleware, SemaphorePermit<'_>) {
        let permit = self.semaphore.acquire().await.expect("semaphore closed");
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(RETRY_LIMIT);
        let client = ClientBuilder::new(self.client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        (client, permit)
    }
}

#[derive(Deserialize, Debug)]
struct ApiMessage {
    message: Option<String>,
    error: Option<String>,
}

/// Map a non-2xx reply to an error. The body is tried as `{ "message" }` or
/// `{ "error" }` first; anything else gets a generic message with the
/// status attached.
pub(crate) fn api_error(status: StatusCode, body: &[u8], what: &'static str) -> GalleryError {
    if status == StatusCode::NOT_FOUND {
        return GalleryError::NotFound(what);
    }
    let message = serde_json::from_slice::<ApiMessage>(body)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .unwrap_or_else(|| "Request failed".to_string());
    GalleryError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_its_own_class() {
        let error = api_error(StatusCode::NOT_FOUND, b"", "Post");
        assert_eq!(error.to_string(), "Post not found");
    }

    #[test]
    fn server_message_is_surfaced() {
        let error = api_error(
            StatusCode::BAD_REQUEST,
            br#"{"message":"Title is required"}"#,
            "Post",
        );
        assert_eq!(error.to_string(), "Title is required (status 400 Bad Request)");

        let error = api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"error":"boom"}"#,
            "Post",
        );
        assert!(error.to_string().contains("boom"));
    }

    #[test]
    fn unparseable_body_gets_generic_message() {
        let error = api_error(StatusCode::BAD_GATEWAY, b"<html>", "Post");
        assert!(error.to_string().starts_with("Request failed"));
    }
}
