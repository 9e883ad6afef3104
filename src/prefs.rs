use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::storage::Store;

/// Liked/bookmarked id sets, loaded once from the store and kept in memory
/// for O(1) membership checks. Every mutation writes through to SQLite
/// before the in-memory set moves, and all writers go through this facade,
/// so the durable state never diverges from what the UI shows.
///
/// Constructed once in `app::run` and handed around explicitly; nothing in
/// the codebase reaches for ambient preference state.
pub struct Preferences {
    store: Arc<Store>,
    liked: RwLock<HashSet<String>>,
    bookmarked: RwLock<HashSet<String>>,
}

impl Preferences {
    pub fn load(store: Arc<Store>) -> Result<Self> {
        let liked = store.liked_ids()?.into_iter().collect();
        let bookmarked = store.bookmarked_ids()?.into_iter().collect();
        Ok(Self {
            store,
            liked: RwLock::new(liked),
            bookmarked: RwLock::new(bookmarked),
        })
    }

    pub fn is_liked(&self, post_id: &str) -> bool {
        self.liked.read().contains(post_id)
    }

    pub fn is_bookmarked(&self, post_id: &str) -> bool {
        self.bookmarked.read().contains(post_id)
    }

    pub fn liked_count(&self) -> usize {
        self.liked.read().len()
    }

    pub fn bookmarked_count(&self) -> usize {
        self.bookmarked.read().len()
    }

    /// Bookmark ids in the order they were saved (oldest first).
    pub fn bookmarked_ids(&self) -> Result<Vec<String>> {
        self.store.bookmarked_ids()
    }

    /// Flip the like state; returns the state after the toggle.
    pub fn toggle_like(&self, post_id: &str) -> Result<bool> {
        let now_liked = !self.is_liked(post_id);
        self.store.set_liked(post_id, now_liked)?;
        let mut liked = self.liked.write();
        if now_liked {
            liked.insert(post_id.to_string());
        } else {
            liked.remove(post_id);
        }
        Ok(now_liked)
    }

    /// Flip the bookmark state; returns the state after the toggle.
    pub fn toggle_bookmark(&self, post_id: &str) -> Result<bool> {
        let now_bookmarked = !self.is_bookmarked(post_id);
        self.store.set_bookmarked(post_id, now_bookmarked)?;
        let mut bookmarked = self.bookmarked.write();
        if now_bookmarked {
            bookmarked.insert(post_id.to_string());
        } else {
            bookmarked.remove(post_id);
        }
        Ok(now_bookmarked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Options, Store};
    use tempfile::tempdir;

    #[test]
    fn toggles_flip_and_report_new_state() {
        let dir = tempdir().unwrap();
        let store = Arc::new(
            Store::open(Options {
                path: Some(dir.path().join("state.db")),
            })
            .unwrap(),
        );
        let prefs = Preferences::load(store).unwrap();

        assert!(!prefs.is_liked("p1"));
        assert!(prefs.toggle_like("p1").unwrap());
        assert!(prefs.is_liked("p1"));
        assert!(!prefs.toggle_like("p1").unwrap());
        assert!(!prefs.is_liked("p1"));

        assert!(prefs.toggle_bookmark("p2").unwrap());
        assert!(prefs.is_bookmarked("p2"));
        assert!(!prefs.is_bookmarked("p1"));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let store = Arc::new(
                Store::open(Options {
                    path: Some(path.clone()),
                })
                .unwrap(),
            );
            let prefs = Preferences::load(store).unwrap();
            prefs.toggle_like("p1").unwrap();
            prefs.toggle_bookmark("p2").unwrap();
            prefs.toggle_bookmark("p3").unwrap();
            prefs.toggle_bookmark("p2").unwrap();
        }

        let store = Arc::new(Store::open(Options { path: Some(path) }).unwrap());
        let prefs = Preferences::load(store).unwrap();
        assert!(prefs.is_liked("p1"));
        assert!(!prefs.is_bookmarked("p2"));
        assert!(prefs.is_bookmarked("p3"));
        assert_eq!(prefs.bookmarked_ids().unwrap(), vec!["p3"]);
    }
}
