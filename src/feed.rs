use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::api::Post;
use crate::data::FeedService;

/// Ask for the next page once the selection is this close to the end.
pub const POST_PRELOAD_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Replace,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Refreshed { count: usize },
    Appended { added: usize, total: usize },
    EndReached,
    Failed { mode: LoadMode, message: String },
}

struct PendingFetch {
    request_id: u64,
    cancel_flag: Arc<AtomicBool>,
    mode: LoadMode,
    page: u32,
}

struct FetchResponse {
    request_id: u64,
    mode: LoadMode,
    page: u32,
    result: Result<Vec<Post>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedOptions {
    /// Keep only video posts from each fetched page (the reels surface).
    pub video_only: bool,
    /// Treat a fetch error as the end of the feed instead of surfacing it.
    /// The reels grid quietly keeps what it has; the main feed reports.
    pub end_on_error: bool,
}

impl FeedOptions {
    pub fn reels() -> Self {
        Self {
            video_only: true,
            end_on_error: true,
        }
    }
}

/// Paginated post list with stale-response protection.
///
/// All fetches run on worker threads; results come home over a channel and
/// are applied by [`Feed::poll`] on the owning thread. A monotonically
/// increasing request id plus a per-fetch cancel flag guarantee that stale
/// or cancelled responses never touch the list and never surface as errors.
pub struct Feed {
    service: Arc<dyn FeedService>,
    options: FeedOptions,
    posts: Vec<Post>,
    page: u32,
    has_more: bool,
    error: Option<String>,
    pending: Option<PendingFetch>,
    next_request_id: u64,
    response_tx: Sender<FetchResponse>,
    response_rx: Receiver<FetchResponse>,
}

impl Feed {
    pub fn new(service: Arc<dyn FeedService>, options: FeedOptions) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            service,
            options,
            posts: Vec::new(),
            page: 0,
            has_more: true,
            error: None,
            pending: None,
            next_request_id: 0,
            response_tx,
            response_rx,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, index: usize) -> Option<&Post> {
        self.posts.get(index)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Update a post in place (like/bookmark toggles render through here).
    pub fn update_post<F>(&mut self, id: &str, apply: F)
    where
        F: FnOnce(&mut Post),
    {
        if let Some(post) = self.posts.iter_mut().find(|post| post.id == id) {
            apply(post);
        }
    }

    /// Drop everything and fetch page 1. An in-flight fetch is cancelled
    /// outright; whatever it eventually returns is ignored.
    pub fn refresh(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }
        self.has_more = true;
        self.dispatch(1, LoadMode::Replace);
    }

    /// Fetch the next page. A no-op while a fetch is pending or once the
    /// feed has ended; callers may invoke this as often as they like.
    pub fn load_more(&mut self) {
        if self.pending.is_some() {
            return;
        }
        if !self.has_more {
            return;
        }
        self.dispatch(self.page + 1, LoadMode::Append);
    }

    /// Pagination trigger: request the next page when the selection gets
    /// within [`POST_PRELOAD_THRESHOLD`] of the end.
    pub fn maybe_load_more(&mut self, selected: usize) {
        if self.posts.is_empty() {
            return;
        }
        let remaining = self.posts.len().saturating_sub(selected + 1);
        if remaining <= POST_PRELOAD_THRESHOLD {
            self.load_more();
        }
    }

    /// Drain worker responses onto the list. Returns the events that
    /// occurred, oldest first; an empty vec means nothing changed.
    pub fn poll(&mut self) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            self.handle_response(response, &mut events);
        }
        events
    }

    fn dispatch(&mut self, page: u32, mode: LoadMode) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.pending = Some(PendingFetch {
            request_id,
            cancel_flag: cancel_flag.clone(),
            mode,
            page,
        });
        self.error = None;

        let tx = self.response_tx.clone();
        let service = self.service.clone();
        thread::spawn(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let result = service.feed_page(page);
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(FetchResponse {
                request_id,
                mode,
                page,
                result,
            });
        });
    }

    fn handle_response(&mut self, response: FetchResponse, events: &mut Vec<FeedEvent>) {
        let Some(pending) = &self.pending else {
            return;
        };
        if pending.cancel_flag.load(Ordering::SeqCst) {
            return;
        }
        if pending.request_id != response.request_id {
            return;
        }
        self.pending = None;

        match response.result {
            Ok(batch) => self.apply_batch(response.page, response.mode, batch, events),
            Err(err) => {
                let message = err.to_string();
                if self.options.end_on_error {
                    self.has_more = false;
                } else {
                    self.error = Some(message.clone());
                }
                events.push(FeedEvent::Failed {
                    mode: response.mode,
                    message,
                });
            }
        }
    }

    fn apply_batch(
        &mut self,
        page: u32,
        mode: LoadMode,
        mut batch: Vec<Post>,
        events: &mut Vec<FeedEvent>,
    ) {
        let fetched = batch.len();
        if self.options.video_only {
            batch.retain(|post| post.is_video());
        }
        // The end-of-feed signal is the fetched page being empty; the reels
        // surface additionally ends when a page has no videos left in it.
        let more = if self.options.video_only {
            !batch.is_empty()
        } else {
            fetched > 0
        };

        match mode {
            LoadMode::Replace => {
                let mut seen = HashSet::new();
                batch.retain(|post| seen.insert(post.id.clone()));
                self.posts = batch;
                self.page = page;
                self.has_more = more;
                events.push(FeedEvent::Refreshed {
                    count: self.posts.len(),
                });
            }
            LoadMode::Append => {
                let mut seen: HashSet<String> =
                    self.posts.iter().map(|post| post.id.clone()).collect();
                batch.retain(|post| seen.insert(post.id.clone()));
                let added = batch.len();
                self.posts.extend(batch);
                self.page = page;
                self.has_more = more;
                events.push(FeedEvent::Appended {
                    added,
                    total: self.posts.len(),
                });
                if !more {
                    events.push(FeedEvent::EndReached);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PostKind;
    use crate::data::{sample_post, MockFeedService};
    use anyhow::anyhow;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    enum Step {
        Ready(Vec<Post>),
        Gated(Receiver<()>, Vec<Post>),
        Fail(String),
    }

    /// Serves one scripted step per call; `Gated` steps block until the
    /// paired sender fires, which lets tests control response ordering.
    struct StepService {
        steps: Mutex<VecDeque<Step>>,
    }

    impl StepService {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().collect()),
            }
        }
    }

    impl FeedService for StepService {
        fn feed_page(&self, _page: u32) -> Result<Vec<Post>> {
            let step = self.steps.lock().pop_front();
            match step {
                Some(Step::Ready(posts)) => Ok(posts),
                Some(Step::Gated(gate, posts)) => {
                    let _ = gate.recv_timeout(Duration::from_secs(5));
                    Ok(posts)
                }
                Some(Step::Fail(message)) => Err(anyhow!(message)),
                None => Ok(Vec::new()),
            }
        }
    }

    fn posts(ids: &[&str]) -> Vec<Post> {
        ids.iter()
            .map(|id| sample_post(id, PostKind::Image))
            .collect()
    }

    fn videos(ids: &[&str]) -> Vec<Post> {
        ids.iter()
            .map(|id| sample_post(id, PostKind::Video))
            .collect()
    }

    fn ids(feed: &Feed) -> Vec<&str> {
        feed.posts().iter().map(|post| post.id.as_str()).collect()
    }

    fn settle(feed: &mut Feed) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        for _ in 0..200 {
            events.extend(feed.poll());
            if !feed.loading() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!feed.loading(), "feed never settled");
        events
    }

    #[test]
    fn refresh_replaces_and_counts() {
        let service = Arc::new(MockFeedService::with_pages(vec![posts(&["a", "b"])]));
        let mut feed = Feed::new(service, FeedOptions::default());

        feed.refresh();
        assert!(feed.loading());
        let events = settle(&mut feed);

        assert_eq!(ids(&feed), vec!["a", "b"]);
        assert_eq!(feed.page(), 1);
        assert!(feed.has_more());
        assert!(feed.error().is_none());
        assert_eq!(events, vec![FeedEvent::Refreshed { count: 2 }]);
    }

    #[test]
    fn append_dedupes_overlapping_page() {
        let service = Arc::new(MockFeedService::with_pages(vec![
            posts(&["a", "b", "c"]),
            posts(&["b", "c", "d", "e"]),
        ]));
        let mut feed = Feed::new(service, FeedOptions::default());

        feed.refresh();
        settle(&mut feed);
        feed.load_more();
        let events = settle(&mut feed);

        assert_eq!(ids(&feed), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(feed.page(), 2);
        assert_eq!(events, vec![FeedEvent::Appended { added: 2, total: 5 }]);
    }

    #[test]
    fn empty_page_ends_feed_and_blocks_load_more() {
        let service = Arc::new(MockFeedService::with_pages(vec![posts(&["a"])]));
        let mut feed = Feed::new(service.clone(), FeedOptions::default());

        feed.refresh();
        settle(&mut feed);
        feed.load_more();
        let events = settle(&mut feed);
        assert!(!feed.has_more());
        assert!(events.contains(&FeedEvent::EndReached));
        assert_eq!(ids(&feed), vec!["a"]);

        // Feed ended: further calls must not even hit the service.
        let calls = service.calls();
        feed.load_more();
        assert!(!feed.loading());
        assert_eq!(service.calls(), calls);
    }

    #[test]
    fn load_more_is_noop_while_pending() {
        let (release, gate) = bounded(1);
        let service = Arc::new(StepService::new(vec![
            Step::Ready(posts(&["a"])),
            Step::Gated(gate, posts(&["b"])),
        ]));
        let mut feed = Feed::new(service, FeedOptions::default());

        feed.refresh();
        settle(&mut feed);
        feed.load_more();
        assert!(feed.loading());

        // Second trigger while the fetch is in flight: swallowed.
        feed.load_more();
        release.send(()).unwrap();
        settle(&mut feed);
        assert_eq!(ids(&feed), vec!["a", "b"]);
    }

    #[test]
    fn refresh_cancels_in_flight_load_more() {
        let (release, gate) = bounded(1);
        let service = Arc::new(StepService::new(vec![
            Step::Ready(posts(&["a", "b"])),
            Step::Gated(gate, posts(&["stale1", "stale2"])),
            Step::Ready(posts(&["fresh1", "fresh2"])),
        ]));
        let mut feed = Feed::new(service, FeedOptions::default());

        feed.refresh();
        settle(&mut feed);
        feed.load_more();
        assert!(feed.loading());

        // Refresh while page 2 is stuck in flight; the refresh wins.
        feed.refresh();
        settle(&mut feed);
        assert_eq!(ids(&feed), vec!["fresh1", "fresh2"]);

        // Now let the stale fetch finish; nothing may change.
        release.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        let events = feed.poll();
        assert!(events.is_empty());
        assert_eq!(ids(&feed), vec!["fresh1", "fresh2"]);
        assert!(feed.error().is_none());
    }

    #[test]
    fn stale_request_id_is_dropped() {
        let service = Arc::new(MockFeedService::with_pages(vec![posts(&["a"])]));
        let mut feed = Feed::new(service, FeedOptions::default());
        feed.refresh();
        let pending_id = feed.pending.as_ref().unwrap().request_id;

        let mut events = Vec::new();
        feed.handle_response(
            FetchResponse {
                request_id: pending_id.wrapping_add(17),
                mode: LoadMode::Replace,
                page: 1,
                result: Ok(posts(&["ghost"])),
            },
            &mut events,
        );
        assert!(events.is_empty());
        assert!(feed.posts().is_empty());
        assert!(feed.loading());

        settle(&mut feed);
        assert_eq!(ids(&feed), vec!["a"]);
    }

    #[test]
    fn fetch_error_keeps_prior_posts() {
        let service = Arc::new(StepService::new(vec![
            Step::Ready(posts(&["a", "b"])),
            Step::Fail("connection reset".to_string()),
        ]));
        let mut feed = Feed::new(service, FeedOptions::default());

        feed.refresh();
        settle(&mut feed);
        feed.load_more();
        let events = settle(&mut feed);

        assert_eq!(ids(&feed), vec!["a", "b"]);
        assert!(feed.error().unwrap().contains("connection reset"));
        assert!(feed.has_more());
        assert!(matches!(
            events.as_slice(),
            [FeedEvent::Failed {
                mode: LoadMode::Append,
                ..
            }]
        ));

        // The next refresh clears the error state.
        feed.refresh();
        assert!(feed.error().is_none());
    }

    #[test]
    fn reels_feed_filters_and_ends_on_videoless_page() {
        let mut page1 = videos(&["v1", "v2"]);
        page1.extend(posts(&["i1"]));
        let service = Arc::new(MockFeedService::with_pages(vec![page1, posts(&["i2", "i3"])]));
        let mut feed = Feed::new(service, FeedOptions::reels());

        feed.refresh();
        settle(&mut feed);
        assert_eq!(ids(&feed), vec!["v1", "v2"]);
        assert!(feed.has_more());

        // Page 2 has no videos at all; the reels feed ends there.
        feed.load_more();
        let events = settle(&mut feed);
        assert_eq!(ids(&feed), vec!["v1", "v2"]);
        assert!(!feed.has_more());
        assert!(events.contains(&FeedEvent::EndReached));
    }

    #[test]
    fn reels_feed_swallows_errors_and_ends() {
        let service = Arc::new(StepService::new(vec![
            Step::Ready(videos(&["v1"])),
            Step::Fail("boom".to_string()),
        ]));
        let mut feed = Feed::new(service, FeedOptions::reels());

        feed.refresh();
        settle(&mut feed);
        feed.load_more();
        settle(&mut feed);

        assert_eq!(ids(&feed), vec!["v1"]);
        assert!(feed.error().is_none());
        assert!(!feed.has_more());
    }

    #[test]
    fn maybe_load_more_respects_threshold() {
        let pages = vec![posts(&["a", "b", "c", "d", "e", "f", "g", "h"]), posts(&["i"])];
        let service = Arc::new(MockFeedService::with_pages(pages));
        let mut feed = Feed::new(service.clone(), FeedOptions::default());

        feed.refresh();
        settle(&mut feed);
        assert_eq!(service.calls(), 1);

        // Selection far from the end: no fetch.
        feed.maybe_load_more(0);
        assert!(!feed.loading());
        assert_eq!(service.calls(), 1);

        // Within the preload window: fetch fires.
        feed.maybe_load_more(3);
        assert!(feed.loading());
        settle(&mut feed);
        assert_eq!(service.calls(), 2);
        assert_eq!(feed.len(), 9);
    }

    #[test]
    fn update_post_touches_only_target() {
        let service = Arc::new(MockFeedService::with_pages(vec![posts(&["a", "b"])]));
        let mut feed = Feed::new(service, FeedOptions::default());
        feed.refresh();
        settle(&mut feed);

        feed.update_post("b", |post| {
            post.liked = true;
            post.likes += 1;
        });
        assert!(!feed.posts()[0].liked);
        assert!(feed.posts()[1].liked);
        assert_eq!(feed.posts()[1].likes, 11);
    }
}
