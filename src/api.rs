use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://memeverse.in/";
pub const DEFAULT_SITE_URL: &str = "https://memeverse.in";
pub const DEVICE_ID_HEADER: &str = "x-device-id";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("memeverse: unauthorized")]
    Unauthorized,
    #[error("memeverse: forbidden")]
    Forbidden,
    #[error("memeverse: not found")]
    NotFound,
    #[error("memeverse: rate limited: {0}")]
    RateLimited(String),
    #[error("memeverse: api error {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub device_id: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    device_id: Option<String>,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("memeverse client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            device_id: config.device_id,
            base_url,
        })
    }

    /// One page of the public feed. An empty page means the feed is
    /// exhausted; callers decide what that does to their pagination.
    pub fn feed_page(&self, page: u32) -> Result<Vec<Post>> {
        let params = vec![("page".to_string(), page.to_string())];
        let resp = self.request(Method::GET, "/api/feed", &params)?;
        let payload: Payload<WirePost> = resp.json().context("memeverse: decode feed page")?;
        let mut posts: Vec<Post> = payload.into_items().into_iter().map(normalize_post).collect();
        posts.retain(|post| !post.id.is_empty());
        Ok(posts)
    }

    pub fn post_details(&self, post_id: &str) -> Result<Post> {
        // The server answers a missing post_id with a 400; don't even ask.
        if post_id.trim().is_empty() {
            bail!("memeverse: post id is required");
        }
        let params = vec![("post_id".to_string(), post_id.to_string())];
        let resp = self.request(Method::GET, "/api/post-details", &params)?;
        let payload: DetailsPayload = resp.json().context("memeverse: decode post details")?;
        let post = normalize_post(payload.into_post());
        if post.id.is_empty() {
            bail!("memeverse: post details missing id");
        }
        Ok(post)
    }

    pub fn post_ids(&self) -> Result<Vec<String>> {
        let resp = self.request(Method::GET, "/api/posts/ids", &[])?;
        let payload: Payload<Value> = resp.json().context("memeverse: decode post ids")?;
        let ids = payload
            .into_items()
            .into_iter()
            .filter_map(|value| {
                let id = stringify_id(&value);
                if id.is_empty() {
                    None
                } else {
                    Some(id)
                }
            })
            .collect();
        Ok(ids)
    }

    fn request(&self, method: Method, path: &str, params: &[(String, String)]) -> Result<Response> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        let mut req = self.http.request(method, url);
        req = req.header(USER_AGENT, self.user_agent.clone());
        req = req.headers(self.device_headers());

        let resp = req.send()?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            let err = match status.as_u16() {
                401 => ApiError::Unauthorized,
                403 => ApiError::Forbidden,
                404 => ApiError::NotFound,
                429 => ApiError::RateLimited(body),
                code => ApiError::Status { status: code, body },
            };
            Err(err.into())
        }
    }

    fn device_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(device_id) = &self.device_id {
            if let Ok(value) = HeaderValue::from_str(device_id) {
                headers.insert(DEVICE_ID_HEADER, value);
            }
        }
        headers
    }
}

/// Crawl seed list for the public site: the static pages first, then one
/// entry per known post.
pub fn sitemap_urls(site_url: &str, ids: &[String]) -> Vec<String> {
    let base = site_url.trim_end_matches('/');
    let mut urls = vec![format!("{base}/"), format!("{base}/feed")];
    urls.extend(ids.iter().map(|id| format!("{base}/post/{id}")));
    urls
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostKind {
    Image,
    Video,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Image => "image",
            PostKind::Video => "video",
        }
    }
}

/// The canonical post every screen works with. Produced exclusively by
/// [`normalize_post`]; raw wire shapes never leave this module.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub kind: PostKind,
    pub file_url: String,
    pub images: Vec<String>,
    pub thumbnail: Option<String>,
    pub title: String,
    pub tags: Vec<String>,
    pub device_label: String,
    pub likes: i64,
    pub views: i64,
    pub comments: i64,
    pub shares: i64,
    pub liked: bool,
    pub bookmarked: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_video(&self) -> bool {
        self.kind == PostKind::Video
    }

    pub fn share_url(&self, site_url: &str) -> String {
        format!("{}/post?post_id={}", site_url.trim_end_matches('/'), self.id)
    }

    pub fn download_filename(&self) -> String {
        let ext = match self.kind {
            PostKind::Video => "mp4",
            PostKind::Image => "jpg",
        };
        format!("memeverse-{}.{ext}", self.id)
    }
}

/// Raw feed entry as the backend sends it. Field names have drifted across
/// backend revisions; everything is optional here and reconciled in
/// [`normalize_post`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WirePost {
    #[serde(default)]
    pub id: Value,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Value,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, rename = "deviceId")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub likes: Option<i64>,
    #[serde(default)]
    pub likes_count: Option<i64>,
    #[serde(default)]
    pub views: Option<i64>,
    #[serde(default)]
    pub views_count: Option<i64>,
    #[serde(default)]
    pub comments: Option<i64>,
    #[serde(default)]
    pub shares: Option<i64>,
    #[serde(default)]
    pub is_liked: Option<bool>,
    #[serde(default)]
    pub is_bookmarked: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The single place backend field drift is absorbed. `likes_count` vs
/// `likes`, `user_name` vs `deviceId`, tags as a comma-joined string vs an
/// array, numeric vs string ids: all of it ends here.
pub fn normalize_post(wire: WirePost) -> Post {
    let kind = if wire.kind.eq_ignore_ascii_case("video") {
        PostKind::Video
    } else {
        PostKind::Image
    };

    let device_label = wire
        .user_name
        .or(wire.device_id)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let thumbnail = wire
        .thumbnail
        .filter(|url| !url.trim().is_empty());

    Post {
        id: stringify_id(&wire.id),
        kind,
        file_url: wire.file_url,
        images: wire.images.unwrap_or_default(),
        thumbnail,
        title: wire.title,
        tags: normalize_tags(&wire.tags),
        device_label,
        likes: wire.likes.or(wire.likes_count).unwrap_or(0),
        views: wire.views.or(wire.views_count).unwrap_or(0),
        comments: wire.comments.unwrap_or(0),
        shares: wire.shares.unwrap_or(0),
        liked: wire.is_liked.unwrap_or(false),
        bookmarked: wire.is_bookmarked.unwrap_or(false),
        created_at: wire.created_at.as_deref().and_then(parse_timestamp),
    }
}

fn stringify_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn normalize_tags(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::String(joined) => joined.split(',').map(|tag| tag.to_string()).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(|tag| tag.to_string()))
            .collect(),
        _ => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    None
}

/// Feed responses arrive either as `{"status": ..., "data": [...]}` or as a
/// bare array, depending on which edge served them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Payload<T> {
    Envelope { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Payload<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Payload::Envelope { data } => data,
            Payload::Bare(items) => items,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DetailsPayload {
    Envelope { data: WirePost },
    Bare(WirePost),
}

impl DetailsPayload {
    fn into_post(self) -> WirePost {
        match self {
            DetailsPayload::Envelope { data } => data,
            DetailsPayload::Bare(post) => post,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(value: Value) -> WirePost {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalize_splits_and_dedupes_string_tags() {
        let post = normalize_post(wire(json!({
            "id": 7,
            "type": "image",
            "file_url": "https://cdn.example/7.jpg",
            "tags": " funny, cats ,, funny ,dank "
        })));
        assert_eq!(post.tags, vec!["funny", "cats", "dank"]);
    }

    #[test]
    fn normalize_accepts_array_tags() {
        let post = normalize_post(wire(json!({
            "id": "a1",
            "tags": ["memes", " memes ", "fresh"]
        })));
        assert_eq!(post.tags, vec!["memes", "fresh"]);
    }

    #[test]
    fn normalize_reconciles_count_drift() {
        let post = normalize_post(wire(json!({
            "id": 1,
            "likes_count": 42,
            "views_count": 1000
        })));
        assert_eq!(post.likes, 42);
        assert_eq!(post.views, 1000);

        let post = normalize_post(wire(json!({
            "id": 2,
            "likes": 5,
            "likes_count": 99
        })));
        assert_eq!(post.likes, 5);
    }

    #[test]
    fn normalize_stringifies_numeric_ids() {
        assert_eq!(normalize_post(wire(json!({ "id": 1234 }))).id, "1234");
        assert_eq!(normalize_post(wire(json!({ "id": "p-9" }))).id, "p-9");
        assert_eq!(normalize_post(wire(json!({ "id": null }))).id, "");
    }

    #[test]
    fn normalize_defaults_uploader_and_flags() {
        let post = normalize_post(wire(json!({ "id": 3 })));
        assert_eq!(post.device_label, "Unknown");
        assert!(!post.liked);
        assert!(!post.bookmarked);
        assert_eq!(post.comments, 0);
        assert_eq!(post.shares, 0);
        assert_eq!(post.kind, PostKind::Image);

        let post = normalize_post(wire(json!({ "id": 4, "user_name": "DEV-ABC123XYZ" })));
        assert_eq!(post.device_label, "DEV-ABC123XYZ");
    }

    #[test]
    fn normalize_defaults_unknown_kind_to_image() {
        let post = normalize_post(wire(json!({ "id": 5, "type": "hologram" })));
        assert_eq!(post.kind, PostKind::Image);
        let post = normalize_post(wire(json!({ "id": 6, "type": "VIDEO" })));
        assert_eq!(post.kind, PostKind::Video);
    }

    #[test]
    fn payload_accepts_envelope_and_bare_array() {
        let enveloped: Payload<WirePost> =
            serde_json::from_value(json!({ "status": "ok", "data": [{ "id": 1 }] })).unwrap();
        assert_eq!(enveloped.into_items().len(), 1);

        let bare: Payload<WirePost> = serde_json::from_value(json!([{ "id": 1 }, { "id": 2 }]))
            .unwrap();
        assert_eq!(bare.into_items().len(), 2);
    }

    #[test]
    fn parse_timestamp_tolerates_common_shapes() {
        assert!(parse_timestamp("2026-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2026-05-01 10:00:00").is_some());
        assert!(parse_timestamp("whenever").is_none());
    }

    #[test]
    fn share_url_and_download_filename() {
        let post = normalize_post(wire(json!({ "id": 42, "type": "video" })));
        assert_eq!(
            post.share_url("https://memeverse.in/"),
            "https://memeverse.in/post?post_id=42"
        );
        assert_eq!(post.download_filename(), "memeverse-42.mp4");

        let post = normalize_post(wire(json!({ "id": 43, "type": "image" })));
        assert_eq!(post.download_filename(), "memeverse-43.jpg");
    }

    #[test]
    fn sitemap_lists_static_pages_then_posts() {
        let urls = sitemap_urls("https://memeverse.in", &["1".into(), "2".into()]);
        assert_eq!(
            urls,
            vec![
                "https://memeverse.in/",
                "https://memeverse.in/feed",
                "https://memeverse.in/post/1",
                "https://memeverse.in/post/2",
            ]
        );
    }
}
