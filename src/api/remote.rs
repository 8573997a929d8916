use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use reqwest::header;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use reqwest_middleware::RequestBuilder;
use serde::de::DeserializeOwned;

use super::{api_error, Gateway, HttpClient, MediaRef};
use crate::config::Config;
use crate::error::GalleryError;
use crate::post::{Category, MediaFile, Post, PostDraft, PostUpdate};
use crate::store::LocalState;
use crate::tip::{Tip, TipDraft};
use crate::user::{Credentials, Registration, Session, User};

/// The network gateway. Every call is a single request against the
/// configured base URL; a bearer token from the local state is attached
/// when present, and a 401 reply clears the cached session before the
/// error is surfaced.
#[derive(Clone)]
pub struct RemoteGateway {
    inner: HttpClient,
    base_url: String,
    state: Arc<LocalState>,
}

impl RemoteGateway {
    pub fn new(config: &Config, state: Arc<LocalState>) -> Self {
        Self {
            inner: HttpClient::new(config.limit()),
            base_url: config.api_url().to_string(),
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn wrap_request(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.state.token() {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, GalleryError> {
        let response = builder.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            if let Err(error) = self.state.clear_session() {
                warn!("Failed to clear session: {}", error);
            }
            return Err(GalleryError::Unauthorized);
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &'static str,
    ) -> Result<T, GalleryError> {
        let response = self.send(builder).await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(api_error(status, &bytes, what));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn expect_ok(
        &self,
        builder: RequestBuilder,
        what: &'static str,
    ) -> Result<(), GalleryError> {
        let response = self.send(builder).await?;
        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await?;
            return Err(api_error(status, &bytes, what));
        }
        Ok(())
    }

    async fn draft_form(&self, draft: PostDraft) -> Result<Form, GalleryError> {
        let mut form = Form::new()
            .text("title", draft.title)
            .text("description", draft.description)
            .text("category", draft.category.as_str());
        for (index, step) in draft.steps.into_iter().enumerate() {
            form = form.text(format!("steps[{}]", index), step);
        }
        for file in &draft.media {
            form = form.part("media", media_part(file).await?);
        }
        Ok(form)
    }
}

async fn media_part(file: &MediaFile) -> Result<Part, GalleryError> {
    let bytes = file.bytes().await?;
    Ok(Part::bytes(bytes)
        .file_name(file.file_name().to_string())
        .mime_str(file.mime())?)
}

#[async_trait]
impl Gateway for RemoteGateway {
    async fn posts_by_category(&self, category: Category) -> Result<Vec<Post>, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/posts/category/{}", category.as_str()));
        debug!("GET {}", url);
        let request = self.wrap_request(client.get(url));
        let posts: Vec<Post> = self.fetch(request, "Post").await?;
        Ok(posts.into_iter().map(Post::normalized).collect())
    }

    async fn post(&self, id: &str) -> Result<Post, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/posts/{}", urlencoding::encode(id)));
        debug!("GET {}", url);
        let request = self.wrap_request(client.get(url));
        Ok(self.fetch::<Post>(request, "Post").await?.normalized())
    }

    async fn create_post(&self, draft: PostDraft) -> Result<Post, GalleryError> {
        let form = self.draft_form(draft).await?;
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/posts");
        debug!("POST {}", url);
        let request = self.wrap_request(client.post(url)).multipart(form);
        Ok(self.fetch::<Post>(request, "Post").await?.normalized())
    }

    async fn update_post(&self, id: &str, update: PostUpdate) -> Result<Post, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/posts/{}", urlencoding::encode(id)));
        debug!("PUT {}", url);
        let request = self.wrap_request(client.put(url)).json(&update);
        Ok(self.fetch::<Post>(request, "Post").await?.normalized())
    }

    async fn delete_post(&self, id: &str) -> Result<(), GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/posts/{}", urlencoding::encode(id)));
        debug!("DELETE {}", url);
        let request = self.wrap_request(client.delete(url));
        self.expect_ok(request, "Post").await
    }

    async fn recipes(&self) -> Result<Vec<Post>, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/recipes");
        debug!("GET {}", url);
        let request = self
            .wrap_request(client.get(url))
            .query(&[("category", Category::Recipe.as_str())]);
        let posts: Vec<Post> = self.fetch(request, "Recipe").await?;
        Ok(posts.into_iter().map(Post::normalized).collect())
    }

    async fn recipe(&self, id: &str) -> Result<Post, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/recipes/{}", urlencoding::encode(id)));
        debug!("GET {}", url);
        let request = self.wrap_request(client.get(url));
        Ok(self.fetch::<Post>(request, "Recipe").await?.normalized())
    }

    async fn create_recipe(&self, mut draft: PostDraft) -> Result<Post, GalleryError> {
        draft.category = Category::Recipe;
        let form = self.draft_form(draft).await?;
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/recipes");
        debug!("POST {}", url);
        let request = self.wrap_request(client.post(url)).multipart(form);
        Ok(self.fetch::<Post>(request, "Recipe").await?.normalized())
    }

    async fn tips(&self) -> Result<Vec<Tip>, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/decoration-tips");
        debug!("GET {}", url);
        let request = self.wrap_request(client.get(url));
        self.fetch(request, "Tip").await
    }

    async fn tips_by_category(&self, category: &str) -> Result<Vec<Tip>, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!(
            "/decoration-tips/category/{}",
            urlencoding::encode(category)
        ));
        debug!("GET {}", url);
        let request = self.wrap_request(client.get(url));
        self.fetch(request, "Tip").await
    }

    async fn tip(&self, id: &str) -> Result<Tip, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/decoration-tips/{}", urlencoding::encode(id)));
        debug!("GET {}", url);
        let request = self.wrap_request(client.get(url));
        self.fetch(request, "Tip").await
    }

    async fn create_tip(&self, draft: TipDraft) -> Result<Tip, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/decoration-tips");
        debug!("POST {}", url);
        let request = self.wrap_request(client.post(url)).json(&draft);
        self.fetch(request, "Tip").await
    }

    async fn update_tip(&self, id: &str, draft: TipDraft) -> Result<Tip, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/decoration-tips/{}", urlencoding::encode(id)));
        debug!("PUT {}", url);
        let request = self.wrap_request(client.put(url)).json(&draft);
        self.fetch(request, "Tip").await
    }

    async fn delete_tip(&self, id: &str) -> Result<(), GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/decoration-tips/{}", urlencoding::encode(id)));
        debug!("DELETE {}", url);
        let request = self.wrap_request(client.delete(url));
        self.expect_ok(request, "Tip").await
    }

    async fn upload_media(&self, file: MediaFile) -> Result<MediaRef, GalleryError> {
        let form = Form::new().part("media", media_part(&file).await?);
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/media/upload");
        debug!("POST {}", url);
        let request = self.wrap_request(client.post(url)).multipart(form);
        self.fetch(request, "Media").await
    }

    async fn download_media(&self, id: &str, path: &Path) -> Result<(), GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url(&format!("/media/{}", urlencoding::encode(id)));
        debug!("GET {}", url);
        let request = self.wrap_request(client.get(url));
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await?;
            return Err(api_error(status, &bytes, "Media"));
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        while let Some(bytes) = stream.next().await {
            tokio::io::copy(&mut bytes?.as_ref(), &mut file).await?;
        }
        Ok(())
    }

    async fn login(&self, credentials: Credentials) -> Result<Session, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/auth/login");
        debug!("POST {}", url);
        let response = client.post(url).json(&credentials).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(GalleryError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(api_error(status, &bytes, "User"));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn register(&self, registration: Registration) -> Result<Session, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/auth/register");
        debug!("POST {}", url);
        let response = client.post(url).json(&registration).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if status == StatusCode::CONFLICT {
            return Err(GalleryError::EmailTaken);
        }
        if !status.is_success() {
            return Err(api_error(status, &bytes, "User"));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn update_profile(&self, user: User) -> Result<User, GalleryError> {
        let (client, _permit) = self.inner.client().await;
        let url = self.url("/auth/update-profile");
        debug!("PUT {}", url);
        let request = self.wrap_request(client.put(url)).json(&user);
        self.fetch(request, "User").await
    }
}
