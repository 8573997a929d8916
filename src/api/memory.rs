use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use tokio::time::sleep;

use super::{Gateway, MediaRef};
use crate::error::GalleryError;
use crate::post::{media, Category, MediaFile, Post, PostDraft, PostUpdate};
use crate::tip::{Tip, TipDraft};
use crate::user::{Credentials, Registration, Session, User};

/// The mock gateway: seeded in-memory data instead of a server, with a
/// simulated delay before each reply. Everything created here is lost when
/// the process exits, matching the offline variant of the site.
pub struct MemoryGateway {
    state: Mutex<State>,
    delay: Duration,
}

struct State {
    posts: Vec<Post>,
    tips: Vec<Tip>,
    users: Vec<MockUser>,
    media: HashMap<String, StoredMedia>,
    last_id: i64,
}

struct MockUser {
    id: u32,
    email: String,
    password: String,
    username: String,
}

impl MockUser {
    fn user(&self) -> User {
        User {
            uid: Some(self.id.to_string()),
            email: self.email.clone(),
            display_name: Some(self.username.clone()),
            photo_url: None,
            created_at: None,
        }
    }

    fn session(&self) -> Session {
        Session {
            token: format!("mock-token-{}", self.id),
            user: self.user(),
        }
    }
}

struct StoredMedia {
    mime: String,
    bytes: Vec<u8>,
}

impl State {
    /// Timestamp-derived ids, bumped past the previous one so two creates
    /// in the same millisecond stay distinct.
    fn mint_id(&mut self) -> String {
        let mut id = Utc::now().timestamp_millis();
        if id <= self.last_id {
            id = self.last_id + 1;
        }
        self.last_id = id;
        id.to_string()
    }
}

impl MemoryGateway {
    pub fn new(delay: Duration) -> Self {
        let posts = vec![Post {
            id: "4".to_string(),
            title: "Beautiful Cake Decoration".to_string(),
            description: "A stunning cake decorated with fresh flowers.".to_string(),
            category: Category::Decoration,
            media_urls: vec![
                "https://images.unsplash.com/photo-1546069901-ba9599a7e63c".to_string(),
            ],
            image_url: None,
            additional_images: vec![],
            video_url: None,
            steps: vec![],
            author: None,
            difficulty: None,
            likes: 0,
            comments: vec![],
            created_at: "2025-04-01T10:00:00Z".parse().ok(),
        }];
        let users = vec![MockUser {
            id: 1,
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            username: "TestUser".to_string(),
        }];
        Self {
            state: Mutex::new(State {
                posts,
                tips: vec![],
                users,
                media: HashMap::new(),
                last_id: 0,
            }),
            delay,
        }
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn posts_by_category(&self, category: Category) -> Result<Vec<Post>, GalleryError> {
        self.pause().await;
        let state = self.state();
        Ok(state
            .posts
            .iter()
            .filter(|post| post.category == category)
            .cloned()
            .collect())
    }

    async fn post(&self, id: &str) -> Result<Post, GalleryError> {
        self.pause().await;
        let state = self.state();
        state
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
            .ok_or(GalleryError::NotFound("Post"))
    }

    async fn create_post(&self, draft: PostDraft) -> Result<Post, GalleryError> {
        self.pause().await;
        // Attachments are stored as data URIs, the way the server kept them.
        let media_urls = media::to_data_uris(&draft.media).await?;
        let mut state = self.state();
        let post = Post {
            id: state.mint_id(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            media_urls,
            image_url: None,
            additional_images: vec![],
            video_url: None,
            steps: draft.steps,
            author: None,
            difficulty: None,
            likes: 0,
            comments: vec![],
            created_at: Some(Utc::now()),
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: &str, update: PostUpdate) -> Result<Post, GalleryError> {
        self.pause().await;
        let mut state = self.state();
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(GalleryError::NotFound("Post"))?;
        update.apply(post);
        Ok(post.clone())
    }

    async fn delete_post(&self, id: &str) -> Result<(), GalleryError> {
        self.pause().await;
        let mut state = self.state();
        let before = state.posts.len();
        state.posts.retain(|post| post.id != id);
        if state.posts.len() == before {
            return Err(GalleryError::NotFound("Post"));
        }
        Ok(())
    }

    async fn recipes(&self) -> Result<Vec<Post>, GalleryError> {
        self.posts_by_category(Category::Recipe).await
    }

    async fn recipe(&self, id: &str) -> Result<Post, GalleryError> {
        self.pause().await;
        let state = self.state();
        state
            .posts
            .iter()
            .find(|post| post.id == id && post.category == Category::Recipe)
            .cloned()
            .ok_or(GalleryError::NotFound("Recipe"))
    }

    async fn create_recipe(&self, mut draft: PostDraft) -> Result<Post, GalleryError> {
        draft.category = Category::Recipe;
        self.create_post(draft).await
    }

    async fn tips(&self) -> Result<Vec<Tip>, GalleryError> {
        self.pause().await;
        Ok(self.state().tips.clone())
    }

    async fn tips_by_category(&self, category: &str) -> Result<Vec<Tip>, GalleryError> {
        self.pause().await;
        let state = self.state();
        Ok(state
            .tips
            .iter()
            .filter(|tip| tip.category.as_deref() == Some(category))
            .cloned()
            .collect())
    }

    async fn tip(&self, id: &str) -> Result<Tip, GalleryError> {
        self.pause().await;
        let state = self.state();
        state
            .tips
            .iter()
            .find(|tip| tip.id == id)
            .cloned()
            .ok_or(GalleryError::NotFound("Tip"))
    }

    async fn create_tip(&self, draft: TipDraft) -> Result<Tip, GalleryError> {
        self.pause().await;
        let mut state = self.state();
        let id = state.mint_id();
        let tip = draft.into_tip(id, Utc::now());
        state.tips.push(tip.clone());
        Ok(tip)
    }

    async fn update_tip(&self, id: &str, draft: TipDraft) -> Result<Tip, GalleryError> {
        self.pause().await;
        let mut state = self.state();
        let tip = state
            .tips
            .iter_mut()
            .find(|tip| tip.id == id)
            .ok_or(GalleryError::NotFound("Tip"))?;
        draft.apply(tip);
        Ok(tip.clone())
    }

    async fn delete_tip(&self, id: &str) -> Result<(), GalleryError> {
        self.pause().await;
        let mut state = self.state();
        let before = state.tips.len();
        state.tips.retain(|tip| tip.id != id);
        if state.tips.len() == before {
            return Err(GalleryError::NotFound("Tip"));
        }
        Ok(())
    }

    async fn upload_media(&self, file: MediaFile) -> Result<MediaRef, GalleryError> {
        self.pause().await;
        let bytes = file.bytes().await?;
        let mut state = self.state();
        let id = state.mint_id();
        state.media.insert(
            id.clone(),
            StoredMedia {
                mime: file.mime().to_string(),
                bytes,
            },
        );
        Ok(MediaRef {
            url: format!("/media/{}", id),
            content_type: Some(file.mime().to_string()),
            id,
        })
    }

    async fn download_media(&self, id: &str, path: &Path) -> Result<(), GalleryError> {
        self.pause().await;
        let bytes = {
            let state = self.state();
            let media = state.media.get(id).ok_or(GalleryError::NotFound("Media"))?;
            debug!("serving {} ({})", id, media.mime);
            media.bytes.clone()
        };
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn login(&self, credentials: Credentials) -> Result<Session, GalleryError> {
        self.pause().await;
        let state = self.state();
        state
            .users
            .iter()
            .find(|user| user.email == credentials.email && user.password == credentials.password)
            .map(MockUser::session)
            .ok_or(GalleryError::InvalidCredentials)
    }

    async fn register(&self, registration: Registration) -> Result<Session, GalleryError> {
        self.pause().await;
        let mut state = self.state();
        if state
            .users
            .iter()
            .any(|user| user.email == registration.email)
        {
            return Err(GalleryError::EmailTaken);
        }
        let user = MockUser {
            id: state.users.len() as u32 + 1,
            email: registration.email,
            password: registration.password,
            username: registration.username,
        };
        let session = user.session();
        state.users.push(user);
        Ok(session)
    }

    async fn update_profile(&self, user: User) -> Result<User, GalleryError> {
        self.pause().await;
        let mut state = self.state();
        let existing = state
            .users
            .iter_mut()
            .find(|candidate| candidate.email == user.email)
            .ok_or(GalleryError::NotFound("User"))?;
        if let Some(name) = &user.display_name {
            existing.username = name.clone();
        }
        Ok(existing.user())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gateway() -> MemoryGateway {
        MemoryGateway::new(Duration::ZERO)
    }

    fn draft(title: &str, description: &str, category: Category) -> PostDraft {
        PostDraft {
            title: title.to_string(),
            description: description.to_string(),
            category,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn listing_filters_on_category() {
        let gateway = gateway();
        let decorations = gateway
            .posts_by_category(Category::Decoration)
            .await
            .unwrap();
        assert_eq!(decorations.len(), 1);
        assert!(decorations
            .iter()
            .all(|post| post.category == Category::Decoration));

        let posts = gateway.posts_by_category(Category::Post).await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn created_post_appears_in_its_listing() {
        let gateway = gateway();
        let created = gateway
            .create_post(draft("Pasta", "x", Category::Post))
            .await
            .unwrap();

        let fetched = gateway.post(&created.id).await.unwrap();
        assert_eq!(fetched.title, "Pasta");
        assert_eq!(fetched.description, "x");

        let listing = gateway.posts_by_category(Category::Post).await.unwrap();
        assert!(listing.iter().any(|post| post.id == created.id));
    }

    #[tokio::test]
    async fn attachments_become_data_uris() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bite.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"not a real png")
            .unwrap();

        let gateway = gateway();
        let mut draft = draft("Tart", "lemon", Category::Post);
        draft.media = vec![MediaFile::open(&path).unwrap()];
        let created = gateway.create_post(draft).await.unwrap();
        assert_eq!(created.media_urls.len(), 1);
        assert!(created.media_urls[0].starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn missing_post_is_not_found() {
        let gateway = gateway();
        let error = gateway.post("999").await.unwrap_err();
        assert_eq!(error.to_string(), "Post not found");
    }

    #[tokio::test]
    async fn deleted_post_stops_resolving() {
        let gateway = gateway();
        let created = gateway
            .create_post(draft("Soup", "hot", Category::Post))
            .await
            .unwrap();
        gateway.delete_post(&created.id).await.unwrap();
        assert!(matches!(
            gateway.post(&created.id).await,
            Err(GalleryError::NotFound("Post"))
        ));
        assert!(gateway.delete_post(&created.id).await.is_err());
    }

    #[tokio::test]
    async fn update_merges_without_touching_category() {
        let gateway = gateway();
        let created = gateway
            .create_post(draft("Bread", "plain", Category::Recipe))
            .await
            .unwrap();
        let updated = gateway
            .update_post(
                &created.id,
                PostUpdate {
                    description: Some("sourdough".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Bread");
        assert_eq!(updated.description, "sourdough");
        assert_eq!(updated.category, Category::Recipe);
    }

    #[tokio::test]
    async fn recipes_listing_only_sees_recipes() {
        let gateway = gateway();
        gateway
            .create_post(draft("Plate", "x", Category::Post))
            .await
            .unwrap();
        gateway
            .create_recipe(draft("Ragu", "slow", Category::Post))
            .await
            .unwrap();

        let recipes = gateway.recipes().await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].title, "Ragu");
        assert_eq!(recipes[0].category, Category::Recipe);

        assert!(gateway.recipe(&recipes[0].id).await.is_ok());
        // the seeded decoration post is not reachable as a recipe
        assert!(matches!(
            gateway.recipe("4").await,
            Err(GalleryError::NotFound("Recipe"))
        ));
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let gateway = gateway();
        let session = gateway
            .login(Credentials {
                email: "test@example.com".into(),
                password: "password123".into(),
            })
            .await
            .unwrap();
        assert_eq!(session.token, "mock-token-1");
        assert_eq!(session.user.name(), "TestUser");

        let error = gateway
            .login(Credentials {
                email: "test@example.com".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Invalid email or password");
    }

    #[tokio::test]
    async fn register_rejects_known_email() {
        let gateway = gateway();
        let error = gateway
            .register(Registration {
                email: "test@example.com".into(),
                password: "pw".into(),
                username: "Dup".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(error, GalleryError::EmailTaken));

        let session = gateway
            .register(Registration {
                email: "new@example.com".into(),
                password: "pw".into(),
                username: "New".into(),
            })
            .await
            .unwrap();
        assert_eq!(session.token, "mock-token-2");
    }

    #[tokio::test]
    async fn tips_cycle_through_crud() {
        let gateway = gateway();
        let created = gateway
            .create_tip(TipDraft {
                title: "Piping".into(),
                category: Some("cake".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let listed = gateway.tips_by_category("cake").await.unwrap();
        assert_eq!(listed.len(), 1);

        let updated = gateway
            .update_tip(
                &created.id,
                TipDraft {
                    title: "Piping bags".into(),
                    category: Some("cake".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Piping bags");
        assert_eq!(updated.id, created.id);

        gateway.delete_tip(&created.id).await.unwrap();
        assert!(matches!(
            gateway.tip(&created.id).await,
            Err(GalleryError::NotFound("Tip"))
        ));
    }

    #[tokio::test]
    async fn media_round_trips_through_upload() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("shot.jpg");
        std::fs::write(&source, b"jpeg bytes").unwrap();

        let gateway = gateway();
        let media = gateway
            .upload_media(MediaFile::open(&source).unwrap())
            .await
            .unwrap();
        assert_eq!(media.content_type.as_deref(), Some("image/jpeg"));

        let target = dir.path().join("fetched.jpg");
        gateway.download_media(&media.id, &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"jpeg bytes");

        assert!(matches!(
            gateway.download_media("none", &target).await,
            Err(GalleryError::NotFound("Media"))
        ));
    }

    #[tokio::test]
    async fn minted_ids_stay_unique() {
        let gateway = gateway();
        let a = gateway
            .create_post(draft("A", "", Category::Post))
            .await
            .unwrap();
        let b = gateway
            .create_post(draft("B", "", Category::Post))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }
}
