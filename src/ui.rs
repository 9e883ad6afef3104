use std::collections::{HashMap, HashSet};
use std::env;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseEvent, MouseEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use semver::Version;
use textwrap::wrap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::Post;
use crate::config;
use crate::data::{FeedService, PostService};
use crate::feed::{Feed, FeedEvent, FeedOptions, LoadMode};
use crate::media;
use crate::playback::{self, PlayState, PlayerSet};
use crate::prefs;
use crate::reels::Pager;
use crate::session::{NavStack, RestoreStep, Screen, ScrollRestore, ViewState};
use crate::share::{self, ShareOutcome};
use crate::storage;
use crate::templates::{self, CropData, RenderUpdate};
use crate::update;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TOAST_TTL: Duration = Duration::from_secs(3);
const SEEK_STEP_SECS: f64 = 5.0;
const PAN_STEP_PX: f64 = 25.0;
const SEE_MORE_LABEL: &str = "See more";
const WELCOME_STATUS: &str =
    "Welcome to MemeVerse! j/k browse, Space plays, Tab switches screens.";

fn accent_for_theme(theme: &str) -> Color {
    match theme.trim().to_ascii_lowercase().as_str() {
        "green" => COLOR_SUCCESS,
        "pink" => Color::Rgb(245, 194, 231),
        "mauve" => Color::Rgb(203, 166, 247),
        "peach" => Color::Rgb(250, 179, 135),
        _ => COLOR_ACCENT,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let mut current_width = 0usize;
        for span in &line.spans {
            current_width =
                current_width.saturating_add(UnicodeWidthStr::width(span.content.as_ref()));
        }
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        let padding = " ".repeat(width - current_width);
        line.spans.push(Span::styled(padding, pad_style));
    }
}

/// Counter rendering: 1_500_000 -> "1.5M", 12_300 -> "12.3K", 999 -> "999",
/// anything non-positive -> "0".
fn format_count(value: i64) -> String {
    if value <= 0 {
        return "0".to_string();
    }
    if value >= 1_000_000 {
        return format!("{:.1}M", value as f64 / 1_000_000.0);
    }
    if value >= 1_000 {
        return format!("{:.1}K", value as f64 / 1_000.0);
    }
    value.to_string()
}

fn format_clock(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn progress_bar(progress: f64, width: usize) -> String {
    let clamped = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = ((clamped * width as f64).round() as usize).min(width);
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(width - filled));
    bar
}

fn relative_time(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = created_at else {
        return String::new();
    };
    let elapsed = now.signed_duration_since(ts);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", elapsed.num_days())
}

/// Cuts `text` so its display width fits `max_width`, never splitting a
/// glyph in half.
fn truncate_to_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > max_width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// A caption that fits on one card line renders as-is (`None`); a longer one
/// collapses to a preview with room left for the `See more` affordance.
fn caption_preview(caption: &str, width: usize) -> Option<String> {
    let flat = caption
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if UnicodeWidthStr::width(flat.as_str()) <= width && !caption.contains('\n') {
        return None;
    }
    let reserve = UnicodeWidthStr::width(SEE_MORE_LABEL) + 2;
    Some(truncate_to_width(&flat, width.saturating_sub(reserve)))
}

fn wrap_plain(text: &str, width: usize) -> Vec<String> {
    wrap(text, width.max(1))
        .into_iter()
        .map(|piece| piece.into_owned())
        .collect()
}

fn carousel_count(post: &Post) -> usize {
    if post.images.is_empty() {
        1
    } else {
        post.images.len()
    }
}

/// Carousel paging clamps at both ends; there is no wraparound.
fn carousel_step(current: usize, count: usize, forward: bool) -> usize {
    if count == 0 {
        return 0;
    }
    if forward {
        (current + 1).min(count - 1)
    } else {
        current.saturating_sub(1)
    }
}

/// The rendered like count is the backend count shifted by the local toggle:
/// liking a post the backend doesn't know about yet shows one more, unliking
/// a backend-liked post shows one less.
fn adjusted_likes(backend_likes: i64, backend_liked: bool, local_liked: bool) -> i64 {
    match (backend_liked, local_liked) {
        (false, true) => backend_likes + 1,
        (true, false) => (backend_likes - 1).max(0),
        _ => backend_likes,
    }
}

/// Picks the first list offset that keeps the selected card fully on screen,
/// scrolling forward only as far as needed.
fn window_offset(heights: &[usize], selected: usize, offset: usize, viewport: usize) -> usize {
    if heights.is_empty() || viewport == 0 {
        return 0;
    }
    let selected = selected.min(heights.len() - 1);
    let mut offset = offset.min(selected);
    loop {
        let used: usize = heights[offset..=selected].iter().sum();
        if used <= viewport || offset == selected {
            break;
        }
        offset += 1;
    }
    offset
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ToastKind {
    Success,
    Error,
}

struct Toast {
    message: String,
    kind: ToastKind,
    shown_at: Instant,
}

impl Toast {
    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= TOAST_TTL
    }
}

/// Per-post presentation state, keyed by post id so it survives appends.
#[derive(Clone, Copy, Default)]
struct CardState {
    carousel: usize,
    caption_expanded: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Feed,
    Bookmarks,
}

#[derive(Clone, Copy)]
enum CardAction {
    ToggleLike,
    ToggleBookmark,
    Share,
    Download,
    OpenInBrowser,
}

enum AsyncResponse {
    Update {
        result: Result<Option<update::UpdateInfo>>,
    },
    Bookmarks {
        request_id: u64,
        posts: Vec<Post>,
        failed: usize,
    },
}

struct PendingBookmarks {
    request_id: u64,
}

struct PendingDownload {
    filename: String,
    rx: Receiver<media::ResultEntry>,
}

pub struct Options {
    pub config: config::Config,
    pub config_path: String,
    pub store: Arc<storage::Store>,
    pub preferences: prefs::Preferences,
    pub feed_service: Arc<dyn FeedService>,
    pub post_service: Arc<dyn PostService>,
    pub media: Option<Arc<media::Manager>>,
}

pub struct Model {
    config: config::Config,
    config_path: String,
    accent: Color,
    preferences: prefs::Preferences,
    post_service: Arc<dyn PostService>,
    media: Option<Arc<media::Manager>>,

    screen: Screen,
    nav: NavStack,
    feed: Feed,
    reels: Feed,
    players: PlayerSet,
    cards: HashMap<String, CardState>,
    hydrated: Vec<Post>,

    feed_view: ViewState,
    bookmarks_view: ViewState,
    grid_view: ViewState,
    templates_view: ViewState,
    restore: Option<ScrollRestore>,

    pager: Option<Pager>,
    viewer_posts: Vec<Post>,
    viewer_from_grid: bool,

    editor: Option<templates::Editor>,
    editor_slot: usize,
    editor_input: String,
    editor_input_active: bool,
    render_job: Option<templates::RenderJob>,
    render_status: Option<String>,
    render_progress: Option<u8>,

    manual_share: Option<String>,
    refresh_feedback: bool,

    status_message: String,
    toast: Option<Toast>,
    spinner: Spinner,
    needs_redraw: bool,

    downloads: Vec<PendingDownload>,
    pending_hydration: Option<PendingBookmarks>,

    update_notice: Option<update::UpdateInfo>,
    update_check_in_progress: bool,
    update_checked: bool,
    current_version: Version,

    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let current_version =
            Version::parse(crate::VERSION).expect("crate version is valid semver");
        let (response_tx, response_rx) = unbounded();
        let accent = accent_for_theme(&opts.config.ui.theme);
        let feed = Feed::new(opts.feed_service.clone(), FeedOptions::default());
        let reels = Feed::new(opts.feed_service.clone(), FeedOptions::reels());

        let first_run = matches!(opts.store.get_state(storage::VISITED_KEY), Ok(None));
        if first_run {
            if let Err(err) = opts.store.set_state(storage::VISITED_KEY, "1") {
                playback::debug_log(format!("ui: persist visited flag: {err:#}"));
            }
        }

        let mut model = Self {
            config: opts.config,
            config_path: opts.config_path,
            accent,
            preferences: opts.preferences,
            post_service: opts.post_service,
            media: opts.media,
            screen: Screen::Feed,
            nav: NavStack::new(),
            feed,
            reels,
            players: PlayerSet::new(),
            cards: HashMap::new(),
            hydrated: Vec::new(),
            feed_view: ViewState::default(),
            bookmarks_view: ViewState::default(),
            grid_view: ViewState::default(),
            templates_view: ViewState::default(),
            restore: None,
            pager: None,
            viewer_posts: Vec::new(),
            viewer_from_grid: false,
            editor: None,
            editor_slot: 0,
            editor_input: String::new(),
            editor_input_active: false,
            render_job: None,
            render_status: None,
            render_progress: None,
            manual_share: None,
            refresh_feedback: false,
            status_message: if first_run {
                WELCOME_STATUS.to_string()
            } else {
                "Loading feed...".to_string()
            },
            toast: None,
            spinner: Spinner::new(),
            needs_redraw: true,
            downloads: Vec::new(),
            pending_hydration: None,
            update_notice: None,
            update_check_in_progress: false,
            update_checked: false,
            current_version,
            response_tx,
            response_rx,
            next_request_id: 1,
        };

        model.feed.refresh();
        model.queue_update_check();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => {
                        if let Err(err) = self.handle_mouse(mouse) {
                            self.status_message = format!("Error: {}", err);
                            self.mark_dirty();
                        }
                    }
                    _ => {}
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                let now = Instant::now();
                let mut ticked = false;
                if self.players.active_id().is_some() {
                    ticked = true;
                }
                self.players.tick(now);
                if self.is_loading() && self.spinner.advance() {
                    ticked = true;
                } else if !self.is_loading() {
                    self.spinner.reset();
                }
                if self.expire_toast(now) {
                    ticked = true;
                }
                if self.step_restore() {
                    ticked = true;
                }
                if ticked {
                    self.mark_dirty();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.feed.loading()
            || self.reels.loading()
            || self.pending_hydration.is_some()
            || self.render_job.is_some()
            || !self.downloads.is_empty()
    }

    fn queue_update_check(&mut self) {
        if self.update_checked || self.update_check_in_progress {
            return;
        }
        if cfg!(test) || env::var(update::SKIP_UPDATE_ENV).is_ok() {
            self.update_checked = true;
            return;
        }
        self.update_checked = true;
        self.update_check_in_progress = true;
        let tx = self.response_tx.clone();
        let version = self.current_version.clone();
        thread::spawn(move || {
            let result = update::check_for_update(&version);
            let _ = tx.send(AsyncResponse::Update { result });
        });
    }

    // ----- async plumbing -----

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        let feed_events = self.feed.poll();
        if !feed_events.is_empty() {
            self.handle_feed_events(feed_events);
            changed = true;
        }
        let reels_events = self.reels.poll();
        if !reels_events.is_empty() {
            self.handle_reels_events(reels_events);
            changed = true;
        }
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        if self.poll_downloads() {
            changed = true;
        }
        if self.poll_render() {
            changed = true;
        }
        changed
    }

    fn handle_feed_events(&mut self, events: Vec<FeedEvent>) {
        for event in events {
            match event {
                FeedEvent::Refreshed { count } => {
                    if self.refresh_feedback {
                        self.toast_success("Feed refreshed!");
                        self.refresh_feedback = false;
                    }
                    self.feed_view = ViewState::default();
                    self.status_message = format!("Loaded {count} posts");
                    self.prune_players();
                }
                FeedEvent::Appended { added, total } => {
                    self.status_message = format!("Loaded {added} more posts ({total} total)");
                }
                FeedEvent::EndReached => {
                    self.status_message = "You're all caught up.".to_string();
                }
                FeedEvent::Failed { mode, message } => {
                    match mode {
                        LoadMode::Replace => {
                            if self.refresh_feedback {
                                self.toast_error("Failed to refresh feed");
                                self.refresh_feedback = false;
                            }
                        }
                        LoadMode::Append => self.toast_error("Failed to load more posts"),
                    }
                    self.status_message = format!("Feed error: {message}");
                }
            }
        }
    }

    fn handle_reels_events(&mut self, events: Vec<FeedEvent>) {
        for event in events {
            match event {
                FeedEvent::Refreshed { count } => {
                    self.grid_view = ViewState::default();
                    if matches!(self.screen, Screen::ReelsGrid) {
                        self.status_message = format!("Loaded {count} reels");
                    }
                }
                // The reels provider ends quietly on errors and empty pages;
                // the grid keeps whatever it already has.
                FeedEvent::Appended { .. } | FeedEvent::EndReached | FeedEvent::Failed { .. } => {}
            }
        }
        if self.viewer_from_grid && matches!(self.screen, Screen::ReelsViewer { .. }) {
            self.viewer_posts = self.reels.posts().to_vec();
            if let Some(pager) = &mut self.pager {
                pager.set_count(self.viewer_posts.len());
            }
        }
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Update { result } => {
                self.update_check_in_progress = false;
                match result {
                    Ok(Some(info)) => {
                        self.status_message =
                            format!("Update available: {} -> {}", self.current_version, info.version);
                        self.update_notice = Some(info);
                    }
                    Ok(None) => {}
                    Err(err) => playback::debug_log(format!("update check: {err:#}")),
                }
            }
            AsyncResponse::Bookmarks {
                request_id,
                posts,
                failed,
            } => {
                let Some(pending) = &self.pending_hydration else {
                    return;
                };
                if pending.request_id != request_id {
                    return;
                }
                self.pending_hydration = None;
                let mut known: HashSet<String> =
                    self.hydrated.iter().map(|post| post.id.clone()).collect();
                for post in posts {
                    if known.insert(post.id.clone()) {
                        self.hydrated.push(post);
                    }
                }
                self.status_message = if failed > 0 {
                    format!("Bookmarks loaded ({failed} unavailable)")
                } else {
                    "Bookmarks loaded".to_string()
                };
            }
        }
    }

    fn poll_downloads(&mut self) -> bool {
        let mut changed = false;
        let mut index = 0;
        while index < self.downloads.len() {
            match self.downloads[index].rx.try_recv() {
                Ok(result) => {
                    let download = self.downloads.remove(index);
                    changed = true;
                    if let Some(err) = result.error {
                        playback::debug_log(format!(
                            "download: {}: {err:#}",
                            download.filename
                        ));
                        self.toast_error("Download failed. Please try again.");
                        self.status_message = format!("Download failed for {}", download.filename);
                    } else {
                        let target = result
                            .saved_to
                            .map(|path| path.display().to_string())
                            .unwrap_or(download.filename);
                        self.status_message = format!("Saved {target}");
                    }
                }
                Err(TryRecvError::Empty) => index += 1,
                Err(TryRecvError::Disconnected) => {
                    self.downloads.remove(index);
                    changed = true;
                    self.toast_error("Download failed. Please try again.");
                }
            }
        }
        changed
    }

    fn poll_render(&mut self) -> bool {
        let mut updates = Vec::new();
        if let Some(job) = &mut self.render_job {
            while let Some(update) = job.try_update() {
                let terminal = update.is_terminal();
                updates.push(update);
                if terminal {
                    break;
                }
            }
        }
        if updates.is_empty() {
            return false;
        }
        for update in updates {
            match update {
                RenderUpdate::Progress { percent, message } => {
                    self.render_progress = Some(percent);
                    self.render_status = Some(message);
                }
                RenderUpdate::Finished { message } => {
                    self.render_job = None;
                    self.render_progress = None;
                    self.render_status = Some(message.clone());
                    self.toast_success(message.clone());
                    self.status_message = message;
                }
                RenderUpdate::Failed { message } => {
                    self.render_job = None;
                    self.render_progress = None;
                    self.render_status = Some(message.clone());
                    self.toast_error(message.clone());
                    self.status_message = message;
                }
            }
        }
        true
    }

    /// Drop per-post runtime state for ids no surface can reach anymore.
    fn prune_players(&mut self) {
        let keep: HashSet<String> = self
            .feed
            .posts()
            .iter()
            .chain(self.reels.posts().iter())
            .chain(self.viewer_posts.iter())
            .chain(self.hydrated.iter())
            .map(|post| post.id.clone())
            .collect();
        self.players.retain(|id| keep.contains(id));
        self.cards.retain(|id, _| keep.contains(id));
    }

    fn toast_success(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            kind: ToastKind::Success,
            shown_at: Instant::now(),
        });
        self.mark_dirty();
    }

    fn toast_error(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            kind: ToastKind::Error,
            shown_at: Instant::now(),
        });
        self.mark_dirty();
    }

    fn expire_toast(&mut self, now: Instant) -> bool {
        if self.toast.as_ref().is_some_and(|toast| toast.expired(now)) {
            self.toast = None;
            return true;
        }
        false
    }

    /// Re-applies a saved list position after a pop, waiting a bounded number
    /// of ticks for the list to grow back before clamping.
    fn step_restore(&mut self) -> bool {
        let Some(mut restore) = self.restore.take() else {
            return false;
        };
        let len = self.current_list_len();
        match restore.step(len) {
            RestoreStep::Apply(state) => {
                *self.view_mut() = state;
                if matches!(self.screen, Screen::Feed) {
                    self.feed.maybe_load_more(state.selected);
                }
                true
            }
            RestoreStep::Pending => {
                self.restore = Some(restore);
                false
            }
        }
    }

    // ----- navigation -----

    fn current_list_len(&self) -> usize {
        match &self.screen {
            Screen::Feed => self.feed.len(),
            Screen::Bookmarks => self.bookmark_posts().len(),
            Screen::ReelsGrid => self.reels.len(),
            Screen::Templates => templates::catalog().len(),
            Screen::ReelsViewer { .. } => self.viewer_posts.len(),
            Screen::Editor { .. } => self
                .editor
                .as_ref()
                .map(|editor| editor.template().slots.len())
                .unwrap_or(0),
        }
    }

    fn view_mut(&mut self) -> &mut ViewState {
        match self.screen {
            Screen::Bookmarks => &mut self.bookmarks_view,
            Screen::ReelsGrid => &mut self.grid_view,
            Screen::Templates => &mut self.templates_view,
            _ => &mut self.feed_view,
        }
    }

    fn move_selection(&mut self, delta: i64) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }
        let view = self.view_mut();
        let current = view.selected.min(len - 1) as i64;
        let next = (current + delta).clamp(0, len as i64 - 1) as usize;
        view.selected = next;
        match self.screen {
            Screen::Feed => self.feed.maybe_load_more(next),
            Screen::ReelsGrid => self.reels.maybe_load_more(next),
            _ => {}
        }
        self.mark_dirty();
    }

    fn jump_selection(&mut self, index: usize) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }
        let target = index.min(len - 1);
        self.view_mut().selected = target;
        if matches!(self.screen, Screen::Feed) {
            self.feed.maybe_load_more(target);
        }
        self.mark_dirty();
    }

    fn cycle_screen(&mut self) {
        let next = match &self.screen {
            Screen::Feed => Screen::ReelsGrid,
            Screen::ReelsGrid => Screen::Bookmarks,
            Screen::Bookmarks => Screen::Templates,
            Screen::Templates => Screen::Feed,
            _ => return,
        };
        self.switch_screen(next);
    }

    fn switch_screen(&mut self, next: Screen) {
        if next == self.screen {
            return;
        }
        self.players.pause_all(Instant::now());
        self.screen = next;
        match &self.screen {
            Screen::ReelsGrid => {
                if self.reels.is_empty() && self.reels.has_more() && !self.reels.loading() {
                    self.status_message = "Loading reels...".to_string();
                    self.spinner.reset();
                    self.reels.refresh();
                }
            }
            Screen::Bookmarks => self.hydrate_bookmarks(),
            _ => {}
        }
        self.mark_dirty();
    }

    fn pop_screen(&mut self) {
        match self.nav.pop() {
            Some((screen, state)) => {
                self.screen = screen;
                self.restore = Some(ScrollRestore::new(state));
                self.step_restore();
            }
            None => self.screen = Screen::Feed,
        }
        self.mark_dirty();
    }

    // ----- posts in focus -----

    fn focused_post(&self) -> Option<Post> {
        match &self.screen {
            Screen::Feed => self.feed.get(self.feed_view.selected).cloned(),
            Screen::Bookmarks => {
                let posts = self.bookmark_posts();
                let index = self.bookmarks_view.selected.min(posts.len().checked_sub(1)?);
                posts.into_iter().nth(index)
            }
            Screen::ReelsGrid => self.reels.get(self.grid_view.selected).cloned(),
            Screen::ReelsViewer { .. } => {
                let pager = self.pager.as_ref()?;
                self.viewer_posts.get(pager.active()).cloned()
            }
            _ => None,
        }
    }

    /// Saved posts, newest first. Ids the feed never loaded resolve through
    /// the hydrated post-details cache.
    fn bookmark_posts(&self) -> Vec<Post> {
        let Ok(ids) = self.preferences.bookmarked_ids() else {
            return Vec::new();
        };
        ids.iter()
            .rev()
            .filter_map(|id| {
                self.feed
                    .posts()
                    .iter()
                    .find(|post| &post.id == id)
                    .or_else(|| self.hydrated.iter().find(|post| &post.id == id))
                    .cloned()
            })
            .collect()
    }

    /// Fetch bookmarked ids the feed hasn't seen via post-details, off the
    /// UI thread. Individual failures are skipped, not fatal.
    fn hydrate_bookmarks(&mut self) {
        if self.pending_hydration.is_some() {
            return;
        }
        let ids = match self.preferences.bookmarked_ids() {
            Ok(ids) => ids,
            Err(err) => {
                self.status_message = format!("Failed to read bookmarks: {err}");
                return;
            }
        };
        let known: HashSet<&str> = self
            .feed
            .posts()
            .iter()
            .chain(self.hydrated.iter())
            .map(|post| post.id.as_str())
            .collect();
        let missing: Vec<String> = ids
            .into_iter()
            .filter(|id| !known.contains(id.as_str()))
            .collect();
        if missing.is_empty() {
            return;
        }

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_hydration = Some(PendingBookmarks { request_id });
        self.status_message = "Loading bookmarks...".to_string();
        self.spinner.reset();

        let tx = self.response_tx.clone();
        let service = self.post_service.clone();
        thread::spawn(move || {
            let mut posts = Vec::new();
            let mut failed = 0usize;
            for id in missing {
                match service.post_details(&id) {
                    Ok(post) => posts.push(post),
                    Err(err) => {
                        playback::debug_log(format!("bookmarks: fetch {id}: {err:#}"));
                        failed += 1;
                    }
                }
            }
            let _ = tx.send(AsyncResponse::Bookmarks {
                request_id,
                posts,
                failed,
            });
        });
    }

    // ----- key handling -----

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.manual_share.is_some() {
            self.manual_share = None;
            self.mark_dirty();
            return Ok(false);
        }
        if matches!(self.screen, Screen::Editor { .. }) && self.editor_input_active {
            self.handle_editor_input_key(code);
            return Ok(false);
        }
        if let KeyCode::Char('q') = code {
            return Ok(true);
        }
        match self.screen.clone() {
            Screen::Feed => self.handle_feed_key(code)?,
            Screen::Bookmarks => self.handle_bookmarks_key(code)?,
            Screen::ReelsGrid => self.handle_grid_key(code)?,
            Screen::ReelsViewer { .. } => self.handle_viewer_key(code)?,
            Screen::Templates => self.handle_templates_key(code)?,
            Screen::Editor { .. } => self.handle_editor_key(code)?,
        }
        Ok(false)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        match mouse.kind {
            MouseEventKind::ScrollDown => match &self.screen {
                Screen::ReelsViewer { .. } => self.viewer_move(true),
                Screen::Editor { .. } => self.editor_slot_move(1),
                _ => self.move_selection(1),
            },
            MouseEventKind::ScrollUp => match &self.screen {
                Screen::ReelsViewer { .. } => self.viewer_move(false),
                Screen::Editor { .. } => self.editor_slot_move(-1),
                _ => self.move_selection(-1),
            },
            _ => {}
        }
        Ok(())
    }

    fn handle_feed_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection(1);
                return Ok(());
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection(-1);
                return Ok(());
            }
            KeyCode::PageDown => {
                self.move_selection(5);
                return Ok(());
            }
            KeyCode::PageUp => {
                self.move_selection(-5);
                return Ok(());
            }
            KeyCode::Home => {
                self.jump_selection(0);
                return Ok(());
            }
            KeyCode::End => {
                self.jump_selection(usize::MAX);
                return Ok(());
            }
            KeyCode::Char('r') => {
                self.refresh_feedback = true;
                self.status_message = "Refreshing feed...".to_string();
                self.spinner.reset();
                self.feed.refresh();
                self.mark_dirty();
                return Ok(());
            }
            KeyCode::Char('v') => {
                self.open_viewer_from_feed();
                return Ok(());
            }
            KeyCode::Tab => {
                self.cycle_screen();
                return Ok(());
            }
            _ => {}
        }
        self.handle_card_keys(code)?;
        Ok(())
    }

    fn handle_bookmarks_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection(1);
                return Ok(());
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection(-1);
                return Ok(());
            }
            KeyCode::Char('r') => {
                self.hydrate_bookmarks();
                self.mark_dirty();
                return Ok(());
            }
            KeyCode::Tab => {
                self.cycle_screen();
                return Ok(());
            }
            KeyCode::Esc => {
                self.switch_screen(Screen::Feed);
                return Ok(());
            }
            _ => {}
        }
        self.handle_card_keys(code)?;
        Ok(())
    }

    fn handle_grid_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(5),
            KeyCode::PageUp => self.move_selection(-5),
            KeyCode::Char('r') => {
                self.status_message = "Refreshing reels...".to_string();
                self.spinner.reset();
                self.reels.refresh();
                self.mark_dirty();
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.open_viewer_from_grid(),
            KeyCode::Tab => self.cycle_screen(),
            KeyCode::Esc => self.switch_screen(Screen::Feed),
            _ => {}
        }
        Ok(())
    }

    fn handle_viewer_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.viewer_move(true);
                return Ok(());
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.viewer_move(false);
                return Ok(());
            }
            KeyCode::Esc => {
                self.leave_viewer();
                return Ok(());
            }
            _ => {}
        }
        self.handle_card_keys(code)?;
        Ok(())
    }

    fn handle_templates_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Enter | KeyCode::Char(' ') => self.open_selected_template(),
            KeyCode::Tab => self.cycle_screen(),
            KeyCode::Esc => self.switch_screen(Screen::Feed),
            _ => {}
        }
        Ok(())
    }

    fn handle_editor_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('j') => self.editor_slot_move(1),
            KeyCode::Char('k') => self.editor_slot_move(-1),
            KeyCode::Enter => {
                self.editor_input_active = true;
                self.editor_input.clear();
                self.mark_dirty();
            }
            KeyCode::Char('c') => self.editor_clear_slot(),
            KeyCode::Char('r') => self.editor_render(),
            KeyCode::Left => self.editor_adjust(|crop| crop.drag_by(PAN_STEP_PX, 0.0)),
            KeyCode::Right => self.editor_adjust(|crop| crop.drag_by(-PAN_STEP_PX, 0.0)),
            KeyCode::Up => self.editor_adjust(|crop| crop.drag_by(0.0, PAN_STEP_PX)),
            KeyCode::Down => self.editor_adjust(|crop| crop.drag_by(0.0, -PAN_STEP_PX)),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.editor_adjust(|crop| crop.zoom_by(templates::ZOOM_STEP))
            }
            KeyCode::Char('-') => self.editor_adjust(|crop| crop.zoom_by(-templates::ZOOM_STEP)),
            KeyCode::Esc => self.leave_editor(),
            _ => {}
        }
        Ok(())
    }

    fn handle_editor_input_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.editor_input_active = false;
                self.editor_input.clear();
            }
            KeyCode::Enter => {
                self.editor_input_active = false;
                self.editor_attach();
            }
            KeyCode::Backspace => {
                self.editor_input.pop();
            }
            KeyCode::Char(c) => self.editor_input.push(c),
            _ => {}
        }
        self.mark_dirty();
    }

    /// Actions shared by every card surface: feed, bookmarks, and the
    /// full-screen viewer all run the same machinery.
    fn handle_card_keys(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected_playback(),
            KeyCode::Left => self.selected_media_key(false),
            KeyCode::Right => self.selected_media_key(true),
            KeyCode::Char('m') => self.toggle_selected_mute(),
            KeyCode::Char('f') => self.selected_to_external()?,
            KeyCode::Char('e') => self.toggle_selected_caption(),
            KeyCode::Char('l') => self.selected_card_action(CardAction::ToggleLike)?,
            KeyCode::Char('b') => self.selected_card_action(CardAction::ToggleBookmark)?,
            KeyCode::Char('s') => self.selected_card_action(CardAction::Share)?,
            KeyCode::Char('d') => self.selected_card_action(CardAction::Download)?,
            KeyCode::Char('o') => self.selected_card_action(CardAction::OpenInBrowser)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    // ----- playback on the focused card -----

    fn toggle_selected_playback(&mut self) {
        let Some(post) = self.focused_post() else {
            return;
        };
        if !post.is_video() {
            return;
        }
        self.players.toggle(&post, Instant::now());
        self.mark_dirty();
    }

    fn selected_media_key(&mut self, forward: bool) {
        let Some(post) = self.focused_post() else {
            return;
        };
        let now = Instant::now();
        if post.is_video() {
            let delta = if forward {
                SEEK_STEP_SECS
            } else {
                -SEEK_STEP_SECS
            };
            self.players.player_mut(&post).seek_by(delta, now);
        } else {
            let count = carousel_count(&post);
            if count > 1 {
                let state = self.cards.entry(post.id.clone()).or_default();
                state.carousel = carousel_step(state.carousel, count, forward);
            }
        }
        self.mark_dirty();
    }

    fn toggle_selected_mute(&mut self) {
        let Some(post) = self.focused_post() else {
            return;
        };
        if !post.is_video() {
            return;
        }
        self.players.player_mut(&post).toggle_mute(Instant::now());
        self.mark_dirty();
    }

    fn toggle_selected_caption(&mut self) {
        let Some(post) = self.focused_post() else {
            return;
        };
        let state = self.cards.entry(post.id).or_default();
        state.caption_expanded = !state.caption_expanded;
        self.mark_dirty();
    }

    fn selected_to_external(&mut self) -> Result<()> {
        let Some(post) = self.focused_post() else {
            return Ok(());
        };
        if !post.is_video() {
            return Ok(());
        }
        self.open_external(&post)
    }

    /// Hand the clip to the configured external player, carrying the inline
    /// position. The inline machine stays paused afterwards.
    fn open_external(&mut self, post: &Post) -> Result<()> {
        let position = self.players.player_mut(post).begin_handoff(Instant::now());
        let command = self.config.player.video_command.clone();
        playback::spawn_external(playback::ExternalLaunch {
            command: &command,
            url: &post.file_url,
            start_at: Some(position),
            detach: self.config.player.video_detach,
        })?;
        let program = command
            .first()
            .cloned()
            .unwrap_or_else(|| "external player".to_string());
        self.status_message = format!("Playing in {program} from {}", format_clock(position));
        self.mark_dirty();
        Ok(())
    }

    // ----- card actions -----

    fn selected_card_action(&mut self, action: CardAction) -> Result<()> {
        let Some(post) = self.focused_post() else {
            return Ok(());
        };
        self.run_card_action(&post, action)
    }

    fn run_card_action(&mut self, post: &Post, action: CardAction) -> Result<()> {
        match action {
            CardAction::ToggleLike => {
                let liked = self.preferences.toggle_like(&post.id)?;
                self.status_message = if liked {
                    "Liked.".to_string()
                } else {
                    "Like removed.".to_string()
                };
            }
            CardAction::ToggleBookmark => {
                let bookmarked = self.preferences.toggle_bookmark(&post.id)?;
                if bookmarked {
                    self.toast_success("Added to bookmarks");
                } else {
                    self.toast_success("Removed from bookmarks");
                }
            }
            CardAction::Share => {
                if post.id.is_empty() {
                    self.toast_error("Unable to share. Try copying the link manually.");
                } else {
                    let url = post.share_url(&self.config.api.site_url);
                    match share::share_link(&url) {
                        ShareOutcome::CopiedSystem | ShareOutcome::CopiedTerminal => {
                            self.toast_success("Link copied to clipboard!");
                        }
                        ShareOutcome::Manual => {
                            self.manual_share = Some(url);
                        }
                    }
                }
            }
            CardAction::Download => self.download_post(post),
            CardAction::OpenInBrowser => {
                let url = post.share_url(&self.config.api.site_url);
                webbrowser::open(&url).with_context(|| format!("open {url}"))?;
                self.status_message = "Opened in browser.".to_string();
            }
        }
        self.mark_dirty();
        Ok(())
    }

    fn download_post(&mut self, post: &Post) {
        let Some(manager) = &self.media else {
            self.toast_error("Download failed. Please try again.");
            self.status_message = "Downloads unavailable: no media cache directory.".to_string();
            return;
        };
        match manager.download_post(post) {
            Ok(rx) => {
                self.toast_success("Download started!");
                self.status_message = format!("Downloading {}", post.download_filename());
                self.spinner.reset();
                self.downloads.push(PendingDownload {
                    filename: post.download_filename(),
                    rx,
                });
            }
            Err(err) => {
                playback::debug_log(format!("download: {}: {err:#}", post.id));
                self.toast_error("Download failed. Please try again.");
            }
        }
    }

    // ----- reels viewer -----

    fn open_viewer_from_feed(&mut self) {
        let Some(post) = self.focused_post() else {
            return;
        };
        if !post.is_video() {
            self.status_message = "Not a video post.".to_string();
            self.mark_dirty();
            return;
        }
        let videos: Vec<Post> = self
            .feed
            .posts()
            .iter()
            .filter(|candidate| candidate.is_video())
            .cloned()
            .collect();
        let Some(start) = videos.iter().position(|candidate| candidate.id == post.id) else {
            return;
        };
        let state = self.feed_view;
        self.enter_viewer(videos, start, false, Screen::Feed, state);
    }

    fn open_viewer_from_grid(&mut self) {
        let posts = self.reels.posts().to_vec();
        if posts.is_empty() {
            return;
        }
        let start = self.grid_view.selected.min(posts.len() - 1);
        let state = self.grid_view;
        self.enter_viewer(posts, start, true, Screen::ReelsGrid, state);
    }

    fn enter_viewer(
        &mut self,
        posts: Vec<Post>,
        start: usize,
        from_grid: bool,
        caller: Screen,
        state: ViewState,
    ) {
        if posts.is_empty() {
            return;
        }
        self.nav.push(caller, state);
        self.viewer_posts = posts;
        self.viewer_from_grid = from_grid;
        self.pager = Some(Pager::new(self.viewer_posts.len(), start));
        self.viewer_activate();
    }

    fn viewer_move(&mut self, forward: bool) {
        let moved = match &mut self.pager {
            Some(pager) => {
                if forward {
                    pager.next()
                } else {
                    pager.prev()
                }
            }
            None => false,
        };
        if moved {
            self.viewer_activate();
        }
    }

    /// Activation plays the newly covering reel; the registry pauses the one
    /// it replaces. A viewer item is exempt from the visibility auto-pause.
    fn viewer_activate(&mut self) {
        let Some(active) = self.pager.as_ref().map(|pager| pager.active()) else {
            return;
        };
        let Some(post) = self.viewer_posts.get(active).cloned() else {
            return;
        };
        let now = Instant::now();
        if let Some(previous) = self.players.active_id().map(str::to_string) {
            if previous != post.id {
                if let Some(player) = self.players.get_mut(&previous) {
                    player.set_ignore_visibility(false);
                }
            }
        }
        self.players.play(&post, now);
        if let Some(player) = self.players.get_mut(&post.id) {
            player.set_ignore_visibility(true);
        }
        if self.viewer_from_grid {
            self.reels.maybe_load_more(active);
        }
        self.screen = Screen::ReelsViewer { post_id: post.id };
        self.mark_dirty();
    }

    fn leave_viewer(&mut self) {
        if let Screen::ReelsViewer { post_id } = &self.screen {
            let id = post_id.clone();
            if let Some(player) = self.players.get_mut(&id) {
                player.set_ignore_visibility(false);
            }
        }
        self.players.pause_all(Instant::now());
        self.pager = None;
        self.viewer_posts.clear();
        self.viewer_from_grid = false;
        self.pop_screen();
    }

    // ----- template editor -----

    fn open_selected_template(&mut self) {
        let Some(template) = templates::catalog().get(self.templates_view.selected) else {
            return;
        };
        match templates::Editor::new(template.id) {
            Ok(editor) => {
                self.nav.push(Screen::Templates, self.templates_view);
                self.editor = Some(editor);
                self.editor_slot = 0;
                self.editor_input.clear();
                self.editor_input_active = false;
                self.render_status = None;
                self.render_progress = None;
                self.screen = Screen::Editor {
                    template_id: template.id.to_string(),
                };
            }
            Err(err) => {
                self.status_message = format!("Error: {err}");
            }
        }
        self.mark_dirty();
    }

    fn leave_editor(&mut self) {
        self.editor = None;
        self.editor_slot = 0;
        self.editor_input.clear();
        self.editor_input_active = false;
        self.pop_screen();
    }

    fn editor_slot_move(&mut self, delta: i64) {
        let Some(editor) = &self.editor else {
            return;
        };
        let len = editor.template().slots.len();
        if len == 0 {
            return;
        }
        let current = self.editor_slot.min(len - 1) as i64;
        self.editor_slot = (current + delta).clamp(0, len as i64 - 1) as usize;
        self.mark_dirty();
    }

    fn editor_attach(&mut self) {
        let path = PathBuf::from(self.editor_input.trim());
        self.editor_input.clear();
        if path.as_os_str().is_empty() {
            return;
        }
        let outcome = {
            let Some(editor) = &mut self.editor else {
                return;
            };
            let Some(slot) = editor.template().slots.get(self.editor_slot) else {
                return;
            };
            let slot_id = slot.id;
            editor
                .begin_fill(slot_id, &path)
                .and_then(|crop| editor.confirm_fill(slot_id, crop))
        };
        match outcome {
            Ok(()) => self.toast_success("Media added!"),
            Err(err) => self.toast_error(err.to_string()),
        }
        self.mark_dirty();
    }

    fn editor_clear_slot(&mut self) {
        let Some(editor) = &mut self.editor else {
            return;
        };
        let Some(slot) = editor.template().slots.get(self.editor_slot) else {
            return;
        };
        editor.clear(slot.id);
        self.status_message = format!("Cleared {}.", slot.label);
        self.mark_dirty();
    }

    fn editor_adjust<F: FnOnce(&mut CropData)>(&mut self, apply: F) {
        let Some(editor) = &mut self.editor else {
            return;
        };
        let Some(slot) = editor.template().slots.get(self.editor_slot) else {
            return;
        };
        let slot_id = slot.id;
        let Some(mut crop) = editor.fill(slot_id).cloned() else {
            self.status_message = "Fill the slot before adjusting its crop.".to_string();
            self.mark_dirty();
            return;
        };
        apply(&mut crop);
        if let Err(err) = editor.confirm_fill(slot_id, crop) {
            self.status_message = format!("Error: {err}");
        }
        self.mark_dirty();
    }

    fn editor_render(&mut self) {
        if self.render_job.is_some() {
            return;
        }
        let Some(editor) = &self.editor else {
            return;
        };
        match editor.render() {
            Ok(job) => {
                self.render_job = Some(job);
                self.render_progress = Some(0);
                self.render_status = Some(templates::RENDER_STATUS_WORKING.to_string());
                self.status_message = templates::RENDER_STATUS_WORKING.to_string();
                self.spinner.reset();
            }
            Err(err) => self.toast_error(err.to_string()),
        }
        self.mark_dirty();
    }

    // ----- drawing -----

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(frame.size());

        self.draw_status(frame, layout[0]);

        match self.screen.clone() {
            Screen::Feed => self.draw_feed(frame, layout[1]),
            Screen::Bookmarks => self.draw_bookmarks(frame, layout[1]),
            Screen::ReelsGrid => self.draw_grid(frame, layout[1]),
            Screen::ReelsViewer { .. } => self.draw_viewer(frame, layout[1]),
            Screen::Templates => self.draw_templates(frame, layout[1]),
            Screen::Editor { .. } => self.draw_editor(frame, layout[1]),
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);

        if self.manual_share.is_some() {
            self.draw_share_panel(frame, layout[1]);
        }
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let now = Instant::now();
        if let Some(toast) = &self.toast {
            if !toast.expired(now) {
                let background = match toast.kind {
                    ToastKind::Success => COLOR_SUCCESS,
                    ToastKind::Error => COLOR_ERROR,
                };
                let line = Paragraph::new(format!(" {}", toast.message)).style(
                    Style::default()
                        .fg(COLOR_BG)
                        .bg(background)
                        .add_modifier(Modifier::BOLD),
                );
                frame.render_widget(line, area);
                return;
            }
        }
        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, area);
    }

    fn screen_block(&self, title: &str) -> Block<'static> {
        Block::default()
            .title(Span::styled(
                title.to_string(),
                Style::default().fg(self.accent).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.accent))
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::uniform(1))
    }

    fn draw_message_panel(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        title: &str,
        lines: &[&str],
        tint: Color,
    ) {
        let block = self.screen_block(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let text: Vec<Line> = lines
            .iter()
            .map(|line| {
                Line::from(Span::styled(
                    (*line).to_string(),
                    Style::default().fg(tint).bg(COLOR_PANEL_BG),
                ))
            })
            .collect();
        let panel = Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(panel, centered_rect(80, 50, inner));
    }

    fn draw_loading_panel(&self, frame: &mut Frame<'_>, area: Rect, title: &str) {
        let block = self.screen_block(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let line = Paragraph::new(format!("{} Loading...", self.spinner.frame()))
            .style(
                Style::default()
                    .fg(self.accent)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center);
        frame.render_widget(line, centered_rect(60, 20, inner));
    }

    fn draw_feed(&mut self, frame: &mut Frame<'_>, area: Rect) {
        if self.feed.is_empty() {
            if let Some(error) = self.feed.error().map(str::to_string) {
                self.draw_message_panel(
                    frame,
                    area,
                    "Feed",
                    &["Couldn't load the feed.", &error, "", "Press r to retry."],
                    COLOR_ERROR,
                );
                return;
            }
            if self.feed.loading() {
                self.draw_loading_panel(frame, area, "Feed");
                return;
            }
            let config_hint = format!("Config: {}", self.config_path);
            self.draw_message_panel(
                frame,
                area,
                "Feed",
                &[
                    "Nothing here yet.",
                    "",
                    "Press r to refresh the feed.",
                    &config_hint,
                ],
                COLOR_TEXT_SECONDARY,
            );
            return;
        }
        let posts = self.feed.posts().to_vec();
        self.draw_card_list(frame, area, &posts, ListKind::Feed);
    }

    fn draw_bookmarks(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let posts = self.bookmark_posts();
        if posts.is_empty() {
            if self.pending_hydration.is_some() {
                self.draw_loading_panel(frame, area, "Bookmarks");
                return;
            }
            self.draw_message_panel(
                frame,
                area,
                "Bookmarks",
                &["No bookmarks yet.", "", "Press b on any post to save it."],
                COLOR_TEXT_SECONDARY,
            );
            return;
        }
        self.draw_card_list(frame, area, &posts, ListKind::Bookmarks);
    }

    fn draw_card_list(
        &mut self,
        frame: &mut Frame<'_>,
        area: Rect,
        posts: &[Post],
        kind: ListKind,
    ) {
        if posts.is_empty() {
            return;
        }
        let title = match kind {
            ListKind::Feed => format!("Feed — {} posts", posts.len()),
            ListKind::Bookmarks => format!("Bookmarks — {}", posts.len()),
        };
        let block = self.screen_block(&title);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;
        let pane_width = inner.width;
        let viewport = inner.height as usize;
        let now = Instant::now();

        let (mut selected, old_offset) = match kind {
            ListKind::Feed => (self.feed_view.selected, self.feed_view.offset),
            ListKind::Bookmarks => (self.bookmarks_view.selected, self.bookmarks_view.offset),
        };
        selected = selected.min(posts.len() - 1);

        let heights: Vec<usize> = posts
            .iter()
            .map(|post| self.card_lines(post, width, false, now).len() + 1)
            .collect();
        let banner = if kind == ListKind::Feed && self.update_notice.is_some() {
            1usize
        } else {
            0
        };
        let offset = window_offset(
            &heights,
            selected,
            old_offset,
            viewport.saturating_sub(banner),
        );
        match kind {
            ListKind::Feed => self.feed_view = ViewState { selected, offset },
            ListKind::Bookmarks => self.bookmarks_view = ViewState { selected, offset },
        }

        let mut items: Vec<ListItem> = Vec::new();
        let mut shown: HashMap<String, f64> = HashMap::new();
        let mut used = 0usize;
        let mut rendered = 0usize;

        if offset == 0 && kind == ListKind::Feed {
            if let Some(update) = &self.update_notice {
                let mut lines = vec![Line::from(Span::styled(
                    format!(
                        "Update available: {} -> {} (GitHub Releases)",
                        self.current_version, update.version
                    ),
                    Style::default()
                        .fg(self.accent)
                        .bg(COLOR_PANEL_BG)
                        .add_modifier(Modifier::BOLD),
                ))];
                pad_lines_to_width(&mut lines, pane_width);
                used += 1;
                items.push(ListItem::new(lines));
            }
        }

        for (idx, post) in posts.iter().enumerate().skip(offset) {
            if viewport > 0 && used >= viewport {
                break;
            }
            let selected_card = idx == selected;
            let mut lines = self.card_lines(post, width, selected_card, now);
            lines.push(Line::from(Span::styled(
                String::new(),
                Style::default().bg(COLOR_PANEL_BG),
            )));
            pad_lines_to_width(&mut lines, pane_width);
            let total = lines.len();
            let visible_rows = total.min(viewport.saturating_sub(used));
            shown.insert(post.id.clone(), visible_rows as f64 / total as f64);
            used = used.saturating_add(total);
            rendered += 1;
            items.push(ListItem::new(lines));
        }

        if kind == ListKind::Feed
            && !self.feed.has_more()
            && offset + rendered == posts.len()
            && used < viewport
        {
            let mut lines = vec![Line::from(Span::styled(
                "You're all caught up.".to_string(),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            ))];
            pad_lines_to_width(&mut lines, pane_width);
            items.push(ListItem::new(lines));
        }

        frame.render_widget(List::new(items).block(block), area);

        // Cards scrolled mostly out of the window lose their playback; the
        // player itself enforces the no-auto-resume rule.
        for post in posts {
            if !post.is_video() {
                continue;
            }
            let fraction = shown.get(&post.id).copied().unwrap_or(0.0);
            if let Some(player) = self.players.get_mut(&post.id) {
                player.set_visible_fraction(fraction, now);
            }
        }
    }

    fn card_lines(
        &self,
        post: &Post,
        width: usize,
        selected: bool,
        now: Instant,
    ) -> Vec<Line<'static>> {
        let background = if selected {
            COLOR_PANEL_SELECTED_BG
        } else {
            COLOR_PANEL_BG
        };
        let primary = Style::default().fg(COLOR_TEXT_PRIMARY).bg(background);
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY).bg(background);
        let accent = Style::default().fg(self.accent).bg(background);
        let mut lines = Vec::new();

        let mut header = vec![Span::styled(
            format!("@{}", post.device_label),
            if selected {
                accent.add_modifier(Modifier::BOLD)
            } else {
                primary
            },
        )];
        let age = relative_time(post.created_at, Utc::now());
        if !age.is_empty() {
            header.push(Span::styled(format!("  {age}"), secondary));
        }
        header.push(Span::styled(format!("  [{}]", post.kind.as_str()), secondary));
        lines.push(Line::from(header));

        if post.is_video() {
            lines.push(Line::from(self.video_spans(post, width, background)));
        } else {
            let count = carousel_count(post);
            let index = self
                .cards
                .get(&post.id)
                .map(|card| card.carousel)
                .unwrap_or(0)
                .min(count - 1);
            let mut spans = vec![Span::styled("▣ image".to_string(), secondary)];
            if count > 1 {
                spans.push(Span::styled(format!("  {}/{}", index + 1, count), accent));
                spans.push(Span::styled("  ←/→ browse".to_string(), secondary));
            }
            lines.push(Line::from(spans));
        }

        let caption = post.title.trim();
        if !caption.is_empty() {
            let expanded = self
                .cards
                .get(&post.id)
                .map(|card| card.caption_expanded)
                .unwrap_or(false);
            if expanded {
                for piece in wrap_plain(caption, width) {
                    lines.push(Line::from(Span::styled(piece, primary)));
                }
            } else {
                match caption_preview(caption, width) {
                    Some(preview) => lines.push(Line::from(vec![
                        Span::styled(format!("{preview}… "), primary),
                        Span::styled(SEE_MORE_LABEL.to_string(), accent),
                    ])),
                    None => lines.push(Line::from(Span::styled(caption.to_string(), primary))),
                }
            }
        }

        if !post.tags.is_empty() {
            let tags = post
                .tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(Line::from(Span::styled(
                truncate_to_width(&tags, width),
                secondary,
            )));
        }

        lines.push(Line::from(self.stats_spans(post, background)));

        if post.is_video() {
            if let Some(player) = self.players.get(&post.id) {
                if player.state() != PlayState::Unstarted && player.controls_visible(now) {
                    lines.push(Line::from(Span::styled(
                        "Space pause/resume · ←/→ seek · m mute · f fullscreen".to_string(),
                        secondary,
                    )));
                }
            }
        }

        lines
    }

    fn video_spans(&self, post: &Post, width: usize, background: Color) -> Vec<Span<'static>> {
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY).bg(background);
        let accent = Style::default().fg(self.accent).bg(background);
        match self.players.get(&post.id) {
            Some(player) if player.state() != PlayState::Unstarted => {
                let marker = if player.is_playing() { "▶" } else { "‖" };
                let clock = format!(
                    "{} {} / {}",
                    marker,
                    format_clock(player.position()),
                    format_clock(player.duration())
                );
                let bar_width = width
                    .saturating_sub(UnicodeWidthStr::width(clock.as_str()) + 12)
                    .clamp(8, 30);
                let bar = progress_bar(player.progress(), bar_width);
                let mut spans = vec![
                    Span::styled(clock, if player.is_playing() { accent } else { secondary }),
                    Span::styled(format!(" {bar}"), secondary),
                ];
                if player.muted() {
                    spans.push(Span::styled(" muted".to_string(), secondary));
                }
                spans
            }
            _ => vec![
                Span::styled("▶ video".to_string(), secondary),
                Span::styled("  Space to play".to_string(), secondary),
            ],
        }
    }

    fn stats_spans(&self, post: &Post, background: Color) -> Vec<Span<'static>> {
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY).bg(background);
        let local_liked = self.preferences.is_liked(&post.id);
        let likes = adjusted_likes(post.likes, post.liked, local_liked);
        let mut spans = vec![
            Span::styled(
                format!("♥ {}", format_count(likes)),
                if local_liked {
                    Style::default().fg(COLOR_ERROR).bg(background)
                } else {
                    secondary
                },
            ),
            Span::styled(format!("  ◉ {}", format_count(post.views)), secondary),
            Span::styled(format!("  ✎ {}", format_count(post.comments)), secondary),
            Span::styled(format!("  ↗ {}", format_count(post.shares)), secondary),
        ];
        if self.preferences.is_bookmarked(&post.id) {
            spans.push(Span::styled(
                "  ⚑ saved".to_string(),
                Style::default().fg(self.accent).bg(background),
            ));
        }
        spans
    }

    fn draw_grid(&mut self, frame: &mut Frame<'_>, area: Rect) {
        if self.reels.is_empty() {
            if self.reels.loading() {
                self.draw_loading_panel(frame, area, "Reels");
                return;
            }
            self.draw_message_panel(
                frame,
                area,
                "Reels",
                &["No reels yet.", "", "Press r to fetch the latest videos."],
                COLOR_TEXT_SECONDARY,
            );
            return;
        }
        let posts = self.reels.posts().to_vec();
        let block = self.screen_block(&format!("Reels — {} videos", posts.len()));
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;
        let pane_width = inner.width;
        let viewport = inner.height as usize;

        let selected = self.grid_view.selected.min(posts.len() - 1);
        let heights = vec![3usize; posts.len()];
        let offset = window_offset(&heights, selected, self.grid_view.offset, viewport);
        self.grid_view = ViewState { selected, offset };

        let mut items: Vec<ListItem> = Vec::new();
        let mut used = 0usize;
        for (idx, post) in posts.iter().enumerate().skip(offset) {
            if used >= viewport {
                break;
            }
            let selected_tile = idx == selected;
            let background = if selected_tile {
                COLOR_PANEL_SELECTED_BG
            } else {
                COLOR_PANEL_BG
            };
            let mut title_style = Style::default()
                .fg(if selected_tile {
                    self.accent
                } else {
                    COLOR_TEXT_PRIMARY
                })
                .bg(background);
            if selected_tile {
                title_style = title_style.add_modifier(Modifier::BOLD);
            }
            let meta_style = Style::default().fg(COLOR_TEXT_SECONDARY).bg(background);
            let title = if post.title.trim().is_empty() {
                "(untitled)".to_string()
            } else {
                truncate_to_width(post.title.trim(), width.saturating_sub(2))
            };
            let preview = if post.thumbnail.is_some() {
                "▤ preview"
            } else {
                "▢ no preview"
            };
            let mut lines = vec![
                Line::from(Span::styled(format!("▶ {title}"), title_style)),
                Line::from(Span::styled(
                    format!("  {} views · {preview}", format_count(post.views)),
                    meta_style,
                )),
                Line::from(Span::styled(
                    String::new(),
                    Style::default().bg(COLOR_PANEL_BG),
                )),
            ];
            pad_lines_to_width(&mut lines, pane_width);
            used += lines.len();
            items.push(ListItem::new(lines));
        }
        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_viewer(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let Some((active, count)) = self.pager.as_ref().map(|p| (p.active(), p.count())) else {
            self.draw_message_panel(
                frame,
                area,
                "Reels",
                &["Nothing to play."],
                COLOR_TEXT_SECONDARY,
            );
            return;
        };
        let Some(post) = self.viewer_posts.get(active).cloned() else {
            self.draw_message_panel(
                frame,
                area,
                "Reels",
                &["Nothing to play."],
                COLOR_TEXT_SECONDARY,
            );
            return;
        };
        let now = Instant::now();
        let block = self.screen_block(&format!("Reel {} / {}", active + 1, count));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let width = inner.width.max(1) as usize;

        let primary = Style::default().fg(COLOR_TEXT_PRIMARY).bg(COLOR_PANEL_BG);
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_PANEL_BG);
        let blank = Line::from(Span::styled(
            String::new(),
            Style::default().bg(COLOR_PANEL_BG),
        ));

        let mut lines: Vec<Line> = Vec::new();
        let title = if post.title.trim().is_empty() {
            "(untitled)".to_string()
        } else {
            post.title.trim().to_string()
        };
        for piece in wrap_plain(&title, width) {
            lines.push(Line::from(Span::styled(
                piece,
                primary.add_modifier(Modifier::BOLD),
            )));
        }
        let mut byline = format!("@{}", post.device_label);
        let age = relative_time(post.created_at, Utc::now());
        if !age.is_empty() {
            byline.push_str(&format!(" · {age}"));
        }
        lines.push(Line::from(Span::styled(byline, secondary)));
        lines.push(blank.clone());

        lines.push(Line::from(self.video_spans(&post, width, COLOR_PANEL_BG)));
        lines.push(blank.clone());
        lines.push(Line::from(self.stats_spans(&post, COLOR_PANEL_BG)));

        if !post.tags.is_empty() {
            let tags = post
                .tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(Line::from(Span::styled(
                truncate_to_width(&tags, width),
                secondary,
            )));
        }

        if let Some(player) = self.players.get(&post.id) {
            if player.controls_visible(now) {
                lines.push(blank);
                lines.push(Line::from(Span::styled(
                    "Space pause/resume · ←/→ seek · m mute · f fullscreen · Esc back".to_string(),
                    secondary,
                )));
            }
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_templates(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let catalog = templates::catalog();
        let block = self.screen_block("Templates");
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;
        let pane_width = inner.width;
        let viewport = inner.height as usize;

        let selected = self.templates_view.selected.min(catalog.len().saturating_sub(1));
        let heights = vec![4usize; catalog.len()];
        let offset = window_offset(&heights, selected, self.templates_view.offset, viewport);
        self.templates_view = ViewState { selected, offset };

        let mut items: Vec<ListItem> = Vec::new();
        let mut used = 0usize;
        for (idx, template) in catalog.iter().enumerate().skip(offset) {
            if used >= viewport {
                break;
            }
            let selected_row = idx == selected;
            let background = if selected_row {
                COLOR_PANEL_SELECTED_BG
            } else {
                COLOR_PANEL_BG
            };
            let mut name_style = Style::default()
                .fg(if selected_row {
                    self.accent
                } else {
                    COLOR_TEXT_PRIMARY
                })
                .bg(background);
            if selected_row {
                name_style = name_style.add_modifier(Modifier::BOLD);
            }
            let meta_style = Style::default().fg(COLOR_TEXT_SECONDARY).bg(background);
            let slots = template
                .slots
                .iter()
                .map(|slot| slot.kind.as_str())
                .collect::<Vec<_>>()
                .join("/");
            let mut lines = vec![
                Line::from(Span::styled(template.name.to_string(), name_style)),
                Line::from(Span::styled(
                    truncate_to_width(template.description, width),
                    meta_style,
                )),
                Line::from(Span::styled(
                    format!(
                        "{}s · {} slots ({slots})",
                        template.duration_secs,
                        template.slots.len()
                    ),
                    meta_style,
                )),
                Line::from(Span::styled(
                    String::new(),
                    Style::default().bg(COLOR_PANEL_BG),
                )),
            ];
            pad_lines_to_width(&mut lines, pane_width);
            used += lines.len();
            items.push(ListItem::new(lines));
        }
        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_editor(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let Some(editor) = &self.editor else {
            self.draw_message_panel(
                frame,
                area,
                "Editor",
                &["No template open."],
                COLOR_TEXT_SECONDARY,
            );
            return;
        };
        let template = editor.template();
        let block = self.screen_block(&format!("Editor — {}", template.name));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let width = inner.width.max(1) as usize;

        let primary = Style::default().fg(COLOR_TEXT_PRIMARY).bg(COLOR_PANEL_BG);
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_PANEL_BG);
        let accent_style = Style::default().fg(self.accent).bg(COLOR_PANEL_BG);
        let blank = Line::from(Span::styled(
            String::new(),
            Style::default().bg(COLOR_PANEL_BG),
        ));

        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(Span::styled(
            truncate_to_width(template.description, width),
            secondary,
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "{}s · {} of {} slots filled",
                template.duration_secs,
                editor.filled_count(),
                template.slots.len()
            ),
            secondary,
        )));
        lines.push(blank.clone());

        for (idx, slot) in template.slots.iter().enumerate() {
            let selected_slot = idx == self.editor_slot;
            let marker = if selected_slot { "▸" } else { " " };
            let style = if selected_slot {
                accent_style.add_modifier(Modifier::BOLD)
            } else {
                primary
            };
            let detail = match editor.fill(slot.id) {
                Some(crop) => {
                    let name = crop
                        .source()
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string())
                        .unwrap_or_else(|| crop.source().display().to_string());
                    format!(
                        "{name} (pan {:.0}/{:.0} · zoom {:.1}x)",
                        crop.x(),
                        crop.y(),
                        crop.scale()
                    )
                }
                None => "empty".to_string(),
            };
            lines.push(Line::from(Span::styled(
                truncate_to_width(
                    &format!(
                        "{marker} {}. {} — {} {} — {detail}",
                        idx + 1,
                        slot.label,
                        slot.kind.as_str(),
                        slot.aspect
                    ),
                    width,
                ),
                style,
            )));
        }

        lines.push(blank);
        if self.editor_input_active {
            lines.push(Line::from(Span::styled(
                format!("Path: {}▏", self.editor_input),
                accent_style,
            )));
        }
        if let Some(status) = &self.render_status {
            let style = if status.as_str() == templates::RENDER_STATUS_DONE {
                Style::default().fg(COLOR_SUCCESS).bg(COLOR_PANEL_BG)
            } else if status.as_str() == templates::RENDER_STATUS_FAILED {
                Style::default().fg(COLOR_ERROR).bg(COLOR_PANEL_BG)
            } else {
                accent_style
            };
            let text = if self.render_job.is_some() {
                format!(
                    "{} {status} ({}%)",
                    self.spinner.frame(),
                    self.render_progress.unwrap_or(0)
                )
            } else {
                status.clone()
            };
            lines.push(Line::from(Span::styled(text, style)));
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_share_panel(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(url) = &self.manual_share else {
            return;
        };
        let panel = centered_rect(70, 35, area);
        frame.render_widget(Clear, panel);
        let block = Block::default()
            .title(Span::styled(
                "Share",
                Style::default().fg(self.accent).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.accent))
            .style(Style::default().bg(COLOR_PANEL_FOCUSED_BG))
            .padding(Padding::uniform(1));
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        let lines = vec![
            Line::from(Span::styled(
                "Clipboard is unavailable here.".to_string(),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_FOCUSED_BG),
            )),
            Line::from(Span::styled(
                "Copy the link by hand:".to_string(),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_FOCUSED_BG),
            )),
            Line::from(Span::styled(
                String::new(),
                Style::default().bg(COLOR_PANEL_FOCUSED_BG),
            )),
            Line::from(Span::styled(
                url.clone(),
                Style::default()
                    .fg(self.accent)
                    .bg(COLOR_PANEL_FOCUSED_BG)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                String::new(),
                Style::default().bg(COLOR_PANEL_FOCUSED_BG),
            )),
            Line::from(Span::styled(
                "Press any key to close.".to_string(),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_FOCUSED_BG),
            )),
        ];
        let panel_text = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(panel_text, inner);
    }

    fn footer_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match &self.screen {
            Screen::Feed => {
                parts.push("j/k move".to_string());
                parts.push("Space play".to_string());
                parts.push("←/→ seek/carousel".to_string());
                parts.push("l like · b bookmark · s share · d download".to_string());
                parts.push("e caption · f fullscreen · o browser".to_string());
                parts.push("v reels".to_string());
                parts.push("Tab screens".to_string());
                parts.push("r refresh".to_string());
            }
            Screen::Bookmarks => {
                parts.push("j/k move".to_string());
                parts.push("b remove".to_string());
                parts.push("l like · s share · d download · o browser".to_string());
                parts.push("Tab screens · Esc feed".to_string());
            }
            Screen::ReelsGrid => {
                parts.push("j/k move".to_string());
                parts.push("Enter watch".to_string());
                parts.push("r refresh".to_string());
                parts.push("Tab screens · Esc feed".to_string());
            }
            Screen::ReelsViewer { .. } => {
                parts.push("↑/↓ switch reels".to_string());
                parts.push("Space play/pause".to_string());
                parts.push("←/→ seek · m mute".to_string());
                parts.push("l like · b bookmark · s share · d download".to_string());
                parts.push("f fullscreen".to_string());
                parts.push("Esc back".to_string());
            }
            Screen::Templates => {
                parts.push("j/k choose".to_string());
                parts.push("Enter open editor".to_string());
                parts.push("Tab screens · Esc feed".to_string());
            }
            Screen::Editor { .. } => {
                if self.editor_input_active {
                    parts.push("Type a file path".to_string());
                    parts.push("Enter attach".to_string());
                    parts.push("Esc cancel".to_string());
                } else {
                    parts.push("j/k slot".to_string());
                    parts.push("Enter fill · c clear".to_string());
                    parts.push("arrows pan · +/- zoom".to_string());
                    parts.push("r render".to_string());
                    parts.push("Esc back".to_string());
                }
            }
        }
        parts.push("q quit".to_string());
        parts.join(" · ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_count_matches_display_rules() {
        assert_eq!(format_count(1_500_000), "1.5M");
        assert_eq!(format_count(1_000_000), "1.0M");
        assert_eq!(format_count(12_300), "12.3K");
        assert_eq!(format_count(1_000), "1.0K");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(-5), "0");
    }

    #[test]
    fn adjusted_likes_tracks_local_state() {
        assert_eq!(adjusted_likes(10, false, true), 11);
        assert_eq!(adjusted_likes(10, true, false), 9);
        assert_eq!(adjusted_likes(10, false, false), 10);
        assert_eq!(adjusted_likes(10, true, true), 10);
        assert_eq!(adjusted_likes(0, true, false), 0);
    }

    #[test]
    fn carousel_steps_clamp_at_both_ends() {
        assert_eq!(carousel_step(0, 3, false), 0);
        assert_eq!(carousel_step(0, 3, true), 1);
        assert_eq!(carousel_step(1, 3, true), 2);
        assert_eq!(carousel_step(2, 3, true), 2);
        assert_eq!(carousel_step(2, 3, false), 1);
        assert_eq!(carousel_step(0, 0, true), 0);
    }

    #[test]
    fn caption_preview_reserves_room_for_the_affordance() {
        assert_eq!(caption_preview("short caption", 40), None);

        let long = "a caption that is considerably wider than the card it sits on";
        let preview = caption_preview(long, 30).unwrap();
        let reserve = UnicodeWidthStr::width(SEE_MORE_LABEL) + 2;
        assert!(UnicodeWidthStr::width(preview.as_str()) <= 30 - reserve);
        assert!(long.starts_with(&preview));

        // Multi-line captions always collapse to the preview.
        assert!(caption_preview("one\ntwo", 40).is_some());
    }

    #[test]
    fn truncate_respects_wide_glyphs() {
        assert_eq!(truncate_to_width("abcdef", 4), "abcd");
        assert_eq!(truncate_to_width("🦀🦀🦀", 4), "🦀🦀");
        assert_eq!(truncate_to_width("🦀🦀🦀", 5), "🦀🦀");
        assert_eq!(truncate_to_width("ab", 10), "ab");
    }

    #[test]
    fn window_offset_keeps_selection_visible() {
        let heights = [3, 3, 3, 3];
        assert_eq!(window_offset(&heights, 0, 0, 6), 0);
        assert_eq!(window_offset(&heights, 1, 0, 6), 0);
        assert_eq!(window_offset(&heights, 2, 0, 6), 1);
        assert_eq!(window_offset(&heights, 3, 1, 6), 2);
        // Scrolling back up follows the selection.
        assert_eq!(window_offset(&heights, 1, 3, 6), 1);
        // A card taller than the viewport still anchors at itself.
        assert_eq!(window_offset(&[10], 0, 0, 4), 0);
        assert_eq!(window_offset(&[], 0, 0, 4), 0);
    }

    #[test]
    fn progress_bar_and_clock_render() {
        assert_eq!(progress_bar(0.5, 10), "█████░░░░░");
        assert_eq!(progress_bar(-1.0, 4), "░░░░");
        assert_eq!(progress_bar(2.0, 4), "████");
        assert_eq!(progress_bar(f64::NAN, 4), "░░░░");
        assert_eq!(format_clock(7.2), "0:07");
        assert_eq!(format_clock(65.0), "1:05");
        assert_eq!(format_clock(-3.0), "0:00");
    }

    #[test]
    fn relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let at = |secs: i64| Some(now - chrono::Duration::seconds(secs));
        assert_eq!(relative_time(at(30), now), "just now");
        assert_eq!(relative_time(at(5 * 60), now), "5m ago");
        assert_eq!(relative_time(at(3 * 3600), now), "3h ago");
        assert_eq!(relative_time(at(2 * 86_400), now), "2d ago");
        assert_eq!(relative_time(None, now), "");
    }

    #[test]
    fn toast_expires_after_ttl() {
        let shown_at = Instant::now();
        let toast = Toast {
            message: "Feed refreshed!".to_string(),
            kind: ToastKind::Success,
            shown_at,
        };
        assert!(!toast.expired(shown_at + Duration::from_secs(2)));
        assert!(toast.expired(shown_at + Duration::from_secs(3)));
    }

    #[test]
    fn pad_lines_extends_to_width() {
        let mut lines = vec![Line::from(vec![Span::raw("abc")])];
        pad_lines_to_width(&mut lines, 6);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[1].content.as_ref(), "   ");
    }

    #[test]
    fn pad_lines_does_not_shorten() {
        let mut lines = vec![Line::from(vec![Span::raw("abcdef")])];
        pad_lines_to_width(&mut lines, 4);
        assert_eq!(lines[0].spans.len(), 1);
    }
}
