pub mod comment;
pub mod media;

pub use comment::Comment;
pub use media::MediaFile;

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which listing page a post appears on. Set at creation, never changed by
/// an update.
#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, Hash, ValueEnum, PartialEq, Eq, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    #[default]
    Post,
    Recipe,
    Decoration,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Recipe => "RECIPE",
            Self::Decoration => "DECORATION",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical post shape. Server variants disagree on how media is attached
/// (`imageUrl` vs `mediaUrls` vs `additionalImages`/`videoUrl`), so every
/// spelling is modeled as an optional field and folded into `media_urls` by
/// [`Post::normalized`] at the gateway boundary. Callers only ever look at
/// `media_urls`.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Fold the variant media fields into `media_urls`, in display order.
    pub fn normalized(mut self) -> Self {
        let mut urls = Vec::new();
        if let Some(image) = self.image_url.take() {
            urls.push(image);
        }
        urls.append(&mut self.additional_images);
        urls.append(&mut self.media_urls);
        if let Some(video) = self.video_url.take() {
            urls.push(video);
        }
        urls.dedup();
        self.media_urls = urls;
        self
    }

    pub fn apply_like(&mut self) {
        self.likes = self.likes.saturating_add(1);
    }

    /// Counter is clamped at zero no matter how often it is decremented.
    pub fn apply_unlike(&mut self) {
        self.likes = self.likes.saturating_sub(1);
    }

    pub fn created(&self) -> String {
        self.created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Input for `POST /posts` and `POST /recipes`. Sent as a multipart form,
/// with each attachment under a repeated `media` field.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub steps: Vec<String>,
    pub media: Vec<MediaFile>,
}

/// Partial replacement for `PUT /posts/{id}`. Category is deliberately not
/// here: it is fixed at creation.
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.difficulty.is_none()
            && self.steps.is_none()
    }

    /// Mock-variant merge, field by field, like the network server does.
    pub fn apply(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(description) = self.description {
            post.description = description;
        }
        if let Some(difficulty) = self.difficulty {
            post.difficulty = Some(difficulty);
        }
        if let Some(steps) = self.steps {
            post.steps = steps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(raw: &str) -> Post {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn category_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&Category::Decoration).unwrap(),
            "\"DECORATION\""
        );
        let parsed: Category = serde_json::from_str("\"RECIPE\"").unwrap();
        assert_eq!(parsed, Category::Recipe);
    }

    #[test]
    fn minimal_wire_post_deserializes() {
        let p = post(r#"{"id":"4","title":"Cake","category":"DECORATION"}"#);
        assert_eq!(p.likes, 0);
        assert!(p.comments.is_empty());
        assert!(p.created_at.is_none());
    }

    #[test]
    fn normalized_folds_every_media_spelling() {
        let p = post(
            r#"{
                "id": "1", "title": "Pasta", "category": "POST",
                "imageUrl": "a.jpg",
                "additionalImages": ["b.jpg", "c.jpg"],
                "mediaUrls": ["d.jpg"],
                "videoUrl": "e.mp4"
            }"#,
        )
        .normalized();
        assert_eq!(p.media_urls, vec!["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.mp4"]);
        assert!(p.image_url.is_none());
        assert!(p.additional_images.is_empty());
        assert!(p.video_url.is_none());
    }

    #[test]
    fn unlike_never_goes_below_zero() {
        let mut p = post(r#"{"id":"1","title":"x","category":"POST"}"#);
        assert_eq!(p.likes, 0);
        p.apply_unlike();
        p.apply_unlike();
        assert_eq!(p.likes, 0);
        p.apply_like();
        p.apply_unlike();
        p.apply_unlike();
        assert_eq!(p.likes, 0);
    }

    #[test]
    fn update_keeps_unset_fields() {
        let mut p = post(
            r#"{"id":"1","title":"Pasta","description":"x","category":"POST","likes":2}"#,
        );
        PostUpdate {
            description: Some("al dente".into()),
            ..Default::default()
        }
        .apply(&mut p);
        assert_eq!(p.title, "Pasta");
        assert_eq!(p.description, "al dente");
        assert_eq!(p.likes, 2);
    }
}
