use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::api::{self, Post, PostKind};

pub trait FeedService: Send + Sync {
    fn feed_page(&self, page: u32) -> Result<Vec<Post>>;
}

pub trait PostService: Send + Sync {
    fn post_details(&self, post_id: &str) -> Result<Post>;
    fn post_ids(&self) -> Result<Vec<String>>;
}

pub struct ApiFeedService {
    client: Arc<api::Client>,
}

impl ApiFeedService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for ApiFeedService {
    fn feed_page(&self, page: u32) -> Result<Vec<Post>> {
        self.client.feed_page(page).context("fetch feed page")
    }
}

pub struct ApiPostService {
    client: Arc<api::Client>,
}

impl ApiPostService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl PostService for ApiPostService {
    fn post_details(&self, post_id: &str) -> Result<Post> {
        self.client
            .post_details(post_id)
            .context("fetch post details")
    }

    fn post_ids(&self) -> Result<Vec<String>> {
        self.client.post_ids().context("fetch post ids")
    }
}

/// Scripted feed pages, page 1 first. Pages past the script are empty,
/// which is exactly how the real feed signals its end.
#[derive(Default)]
pub struct MockFeedService {
    pages: Vec<Vec<Post>>,
    calls: AtomicUsize,
}

impl MockFeedService {
    pub fn with_pages(pages: Vec<Vec<Post>>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeedService for MockFeedService {
    fn feed_page(&self, page: u32) -> Result<Vec<Post>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = page.saturating_sub(1) as usize;
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MockPostService {
    posts: Vec<Post>,
}

impl MockPostService {
    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self { posts }
    }
}

impl PostService for MockPostService {
    fn post_details(&self, post_id: &str) -> Result<Post> {
        self.posts
            .iter()
            .find(|post| post.id == post_id)
            .cloned()
            .ok_or_else(|| anyhow!("memeverse: not found"))
    }

    fn post_ids(&self) -> Result<Vec<String>> {
        Ok(self.posts.iter().map(|post| post.id.clone()).collect())
    }
}

pub fn sample_post(id: &str, kind: PostKind) -> Post {
    Post {
        id: id.to_string(),
        kind,
        file_url: format!("https://cdn.memeverse.in/{id}.bin"),
        images: Vec::new(),
        thumbnail: None,
        title: format!("Sample post {id}"),
        tags: vec!["sample".to_string()],
        device_label: "DEV-SAMPLE001".to_string(),
        likes: 10,
        views: 100,
        comments: 0,
        shares: 0,
        liked: false,
        bookmarked: false,
        created_at: None,
    }
}
