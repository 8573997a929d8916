use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::GalleryError;
use crate::tip::Tip;
use crate::user::{Session, User};

const TOKEN: &str = "token";
const USER: &str = "user";
const LIKED_POSTS: &str = "likedPosts";
const DECORATION_TIPS: &str = "decorationTips";

/// Key/value persistence with JSON-serialized values, the local-storage
/// shape the browser client relied on. Implementations must tolerate
/// missing keys.
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, GalleryError>;
    fn write(&self, key: &str, value: &str) -> Result<(), GalleryError>;
    fn remove(&self, key: &str) -> Result<(), GalleryError>;
}

/// One `<key>.json` file per key under a state directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, GalleryError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), GalleryError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GalleryError> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Ephemeral stand-in, mostly for tests.
#[derive(Default)]
#[allow(dead_code)]
pub struct MemoryStorage(Mutex<HashMap<String, String>>);

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, GalleryError> {
        Ok(self.0.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), GalleryError> {
        self.0
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GalleryError> {
        self.0.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Typed access to the client-side state: the cached session, the set of
/// liked posts, and the offline decoration-tip collection.
///
/// Reads are lenient: a missing or unreadable value behaves like an empty
/// browser storage slot. This is a convenience cache, never a source of
/// truth. Writes propagate their errors.
pub struct LocalState {
    storage: Box<dyn Storage>,
}

impl LocalState {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn open(dir: &Path) -> Self {
        Self::new(Box::new(FileStorage::new(dir)))
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.read(key) {
            Ok(raw) => raw?,
            Err(error) => {
                warn!("Failed to read {}: {}", key, error);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!("Ignoring malformed {}: {}", key, error);
                None
            }
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), GalleryError> {
        self.storage.write(key, &serde_json::to_string(value)?)
    }

    // --- session -----------------------------------------------------------

    pub fn token(&self) -> Option<String> {
        self.get(TOKEN)
    }

    pub fn user(&self) -> Option<User> {
        self.get(USER)
    }

    pub fn session(&self) -> Option<Session> {
        let token = self.token()?;
        let user = self.user()?;
        Some(Session { token, user })
    }

    pub fn store_session(&self, session: &Session) -> Result<(), GalleryError> {
        self.set(TOKEN, &session.token)?;
        self.set(USER, &session.user)
    }

    pub fn store_user(&self, user: &User) -> Result<(), GalleryError> {
        self.set(USER, user)
    }

    pub fn clear_session(&self) -> Result<(), GalleryError> {
        self.storage.remove(TOKEN)?;
        self.storage.remove(USER)
    }

    // --- liked posts -------------------------------------------------------

    pub fn liked_posts(&self) -> BTreeSet<String> {
        self.get(LIKED_POSTS).unwrap_or_default()
    }

    /// Returns whether the post was newly liked.
    pub fn like(&self, id: &str) -> Result<bool, GalleryError> {
        let mut liked = self.liked_posts();
        let inserted = liked.insert(id.to_string());
        if inserted {
            self.set(LIKED_POSTS, &liked)?;
        }
        Ok(inserted)
    }

    /// Returns whether the post had been liked. Unliking a post that was
    /// never liked is a no-op.
    pub fn unlike(&self, id: &str) -> Result<bool, GalleryError> {
        let mut liked = self.liked_posts();
        let removed = liked.remove(id);
        if removed {
            self.set(LIKED_POSTS, &liked)?;
        }
        Ok(removed)
    }

    // --- offline decoration tips -------------------------------------------

    pub fn tips(&self) -> Vec<Tip> {
        self.get(DECORATION_TIPS).unwrap_or_default()
    }

    /// Insert, or replace the stored tip with the same id.
    pub fn save_tip(&self, tip: Tip) -> Result<(), GalleryError> {
        let mut tips = self.tips();
        match tips.iter_mut().find(|existing| existing.id == tip.id) {
            Some(existing) => *existing = tip,
            None => tips.push(tip),
        }
        self.set(DECORATION_TIPS, &tips)
    }

    pub fn delete_tip(&self, id: &str) -> Result<bool, GalleryError> {
        let mut tips = self.tips();
        let before = tips.len();
        tips.retain(|tip| tip.id != id);
        let removed = tips.len() != before;
        if removed {
            self.set(DECORATION_TIPS, &tips)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tip::TipDraft;
    use chrono::Utc;

    fn state() -> LocalState {
        LocalState::new(Box::new(MemoryStorage::default()))
    }

    fn session() -> Session {
        Session {
            token: "mock-token-1".into(),
            user: User {
                uid: Some("u-1".into()),
                email: "test@example.com".into(),
                display_name: Some("TestUser".into()),
                photo_url: None,
                created_at: None,
            },
        }
    }

    #[test]
    fn session_round_trip_and_clear() {
        let state = state();
        assert!(state.session().is_none());

        state.store_session(&session()).unwrap();
        let cached = state.session().unwrap();
        assert_eq!(cached.token, "mock-token-1");
        assert_eq!(cached.user.name(), "TestUser");

        state.clear_session().unwrap();
        assert!(state.token().is_none());
        assert!(state.user().is_none());
    }

    #[test]
    fn like_and_unlike_are_idempotent() {
        let state = state();
        assert!(state.like("7").unwrap());
        assert!(!state.like("7").unwrap());
        assert!(state.liked_posts().contains("7"));

        assert!(state.unlike("7").unwrap());
        assert!(!state.unlike("7").unwrap());
        assert!(!state.unlike("7").unwrap());
        assert!(state.liked_posts().is_empty());
    }

    #[test]
    fn tips_upsert_by_id() {
        let state = state();
        let tip = TipDraft {
            title: "Glaze".into(),
            ..Default::default()
        }
        .into_tip("1".into(), Utc::now());
        state.save_tip(tip.clone()).unwrap();

        let mut replacement = tip;
        replacement.title = "Mirror glaze".into();
        state.save_tip(replacement).unwrap();

        let tips = state.tips();
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].title, "Mirror glaze");

        assert!(state.delete_tip("1").unwrap());
        assert!(!state.delete_tip("1").unwrap());
        assert!(state.tips().is_empty());
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let state = LocalState::open(dir.path());
            state.store_session(&session()).unwrap();
            state.like("4").unwrap();
        }
        let state = LocalState::open(dir.path());
        assert_eq!(state.session().unwrap().token, "mock-token-1");
        assert!(state.liked_posts().contains("4"));
    }

    #[test]
    fn malformed_value_reads_as_empty() {
        let storage = MemoryStorage::default();
        storage.write(LIKED_POSTS, "not json").unwrap();
        let state = LocalState::new(Box::new(storage));
        assert!(state.liked_posts().is_empty());
    }
}
