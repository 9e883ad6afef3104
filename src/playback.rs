use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::api::Post;

/// A card that covers less than this fraction of the viewport is treated as
/// off screen and pauses itself.
pub const VISIBILITY_PAUSE_THRESHOLD: f64 = 0.5;

/// While playing, on-card controls disappear this long after the last
/// interaction. Paused cards keep them visible.
pub const CONTROLS_HIDE_AFTER: Duration = Duration::from_secs(3);

/// The feed payload carries no clip length, so the playhead loops over a
/// nominal duration until a probe reports the real one.
pub const DEFAULT_CLIP_SECS: f64 = 30.0;

const URL_PLACEHOLDER: &str = "%URL%";

fn debug_enabled() -> bool {
    static FLAG: OnceCell<bool> = OnceCell::new();
    *FLAG.get_or_init(|| {
        std::env::var("MEMEVERSE_DEBUG")
            .map(|val| {
                let trimmed = val.trim();
                !(trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("0")
                    || trimmed.eq_ignore_ascii_case("false")
                    || trimmed.eq_ignore_ascii_case("no")
                    || trimmed.eq_ignore_ascii_case("off"))
            })
            .unwrap_or(false)
    })
}

fn debug_writer() -> Option<&'static Mutex<std::fs::File>> {
    static WRITER: OnceCell<Option<Mutex<std::fs::File>>> = OnceCell::new();
    WRITER
        .get_or_init(|| {
            std::env::var("MEMEVERSE_DEBUG_LOG")
                .ok()
                .and_then(|path| {
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .map(Mutex::new)
                        .ok()
                })
        })
        .as_ref()
}

pub fn debug_log(message: impl AsRef<str>) {
    if !debug_enabled() {
        return;
    }
    let line = format!(
        "{} {}",
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        message.as_ref()
    );
    if let Some(writer) = debug_writer() {
        let mut file = writer.lock();
        let _ = writeln!(file, "{line}");
        return;
    }
    eprintln!("{line}");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Unstarted,
    Playing,
    Paused,
}

/// Inline playback state for one video card. Time never comes from the
/// clock directly; callers pass `now` so the machine stays deterministic.
#[derive(Debug, Clone)]
pub struct Player {
    post_id: String,
    url: String,
    attached: bool,
    state: PlayState,
    position: f64,
    duration: f64,
    muted: bool,
    visible_fraction: f64,
    ignore_visibility: bool,
    last_tick: Option<Instant>,
    last_interaction: Option<Instant>,
}

impl Player {
    pub fn new(post: &Post) -> Self {
        Player {
            post_id: post.id.clone(),
            url: post.file_url.clone(),
            attached: false,
            state: PlayState::Unstarted,
            position: 0.0,
            duration: DEFAULT_CLIP_SECS,
            muted: true,
            visible_fraction: 1.0,
            ignore_visibility: false,
            last_tick: None,
            last_interaction: None,
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Whether the media has been requested yet. Cards stay detached until
    /// the first play so scrolling the feed costs nothing.
    pub fn attached(&self) -> bool {
        self.attached
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.position / self.duration).clamp(0.0, 1.0)
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn visible_fraction(&self) -> f64 {
        self.visible_fraction
    }

    pub fn set_duration(&mut self, secs: f64) {
        if secs.is_finite() && secs > 0.0 {
            self.duration = secs;
            if self.position > secs {
                self.position = secs;
            }
        }
    }

    /// Single-post contexts keep playing regardless of scroll position.
    pub fn set_ignore_visibility(&mut self, ignore: bool) {
        self.ignore_visibility = ignore;
    }

    pub fn play(&mut self, now: Instant) {
        if !self.attached {
            self.attached = true;
            debug_log(format!("playback: attach {} {}", self.post_id, self.url));
        }
        self.state = PlayState::Playing;
        self.last_tick = Some(now);
        self.last_interaction = Some(now);
    }

    pub fn pause(&mut self, now: Instant) {
        if self.state != PlayState::Playing {
            return;
        }
        self.halt(now);
        self.last_interaction = Some(now);
    }

    pub fn toggle(&mut self, now: Instant) {
        match self.state {
            PlayState::Playing => self.pause(now),
            PlayState::Unstarted | PlayState::Paused => self.play(now),
        }
    }

    /// Advances the playhead while playing. Reaching the end wraps the
    /// position and playback continues.
    pub fn tick(&mut self, now: Instant) {
        if self.state != PlayState::Playing {
            return;
        }
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return;
        };
        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        self.last_tick = Some(now);
        if self.duration <= 0.0 {
            return;
        }
        self.position += elapsed;
        if self.position >= self.duration {
            self.position %= self.duration;
        }
    }

    pub fn seek_to(&mut self, secs: f64, now: Instant) {
        if !secs.is_finite() {
            return;
        }
        if self.state == PlayState::Playing {
            self.last_tick = Some(now);
        }
        self.position = secs.clamp(0.0, self.duration.max(0.0));
        self.last_interaction = Some(now);
    }

    pub fn seek_by(&mut self, delta: f64, now: Instant) {
        self.tick(now);
        self.seek_to(self.position + delta, now);
    }

    pub fn toggle_mute(&mut self, now: Instant) {
        self.muted = !self.muted;
        self.last_interaction = Some(now);
    }

    pub fn note_interaction(&mut self, now: Instant) {
        self.last_interaction = Some(now);
    }

    pub fn controls_visible(&self, now: Instant) -> bool {
        if self.state != PlayState::Playing {
            return true;
        }
        self.last_interaction
            .map_or(false, |at| now.duration_since(at) < CONTROLS_HIDE_AFTER)
    }

    /// Scrolling away pauses a playing card; scrolling back never resumes
    /// it. Only an explicit play does.
    pub fn set_visible_fraction(&mut self, fraction: f64, now: Instant) {
        self.visible_fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.ignore_visibility {
            return;
        }
        if self.state == PlayState::Playing && self.visible_fraction < VISIBILITY_PAUSE_THRESHOLD {
            self.halt(now);
        }
    }

    /// Pauses the inline machine and reports where the external player
    /// should pick up.
    pub fn begin_handoff(&mut self, now: Instant) -> f64 {
        self.halt(now);
        self.last_interaction = Some(now);
        self.position
    }

    fn halt(&mut self, now: Instant) {
        if self.state != PlayState::Playing {
            return;
        }
        self.tick(now);
        self.state = PlayState::Paused;
        self.last_tick = None;
    }
}

/// Owns every card's player and the "who is playing" question. Starting
/// playback anywhere pauses the previous holder, so at most one player is
/// ever `Playing`.
#[derive(Default)]
pub struct PlayerSet {
    players: HashMap<String, Player>,
}

impl PlayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player_mut(&mut self, post: &Post) -> &mut Player {
        self.players
            .entry(post.id.clone())
            .or_insert_with(|| Player::new(post))
    }

    pub fn get(&self, post_id: &str) -> Option<&Player> {
        self.players.get(post_id)
    }

    pub fn get_mut(&mut self, post_id: &str) -> Option<&mut Player> {
        self.players.get_mut(post_id)
    }

    pub fn play(&mut self, post: &Post, now: Instant) {
        self.pause_others(&post.id, now);
        self.player_mut(post).play(now);
    }

    pub fn toggle(&mut self, post: &Post, now: Instant) {
        let playing = self.get(&post.id).is_some_and(Player::is_playing);
        if playing {
            if let Some(player) = self.get_mut(&post.id) {
                player.pause(now);
            }
        } else {
            self.play(post, now);
        }
    }

    pub fn pause_all(&mut self, now: Instant) {
        for player in self.players.values_mut() {
            player.pause(now);
        }
    }

    pub fn tick(&mut self, now: Instant) {
        for player in self.players.values_mut() {
            player.tick(now);
        }
    }

    pub fn active_id(&self) -> Option<&str> {
        self.players
            .values()
            .find(|player| player.is_playing())
            .map(Player::post_id)
    }

    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.players.retain(|id, _| keep(id));
    }

    fn pause_others(&mut self, keep_id: &str, now: Instant) {
        for player in self.players.values_mut() {
            if player.post_id != keep_id && player.is_playing() {
                debug_log(format!("playback: pausing {} for {keep_id}", player.post_id));
                player.pause(now);
            }
        }
    }
}

pub struct ExternalLaunch<'a> {
    pub command: &'a [String],
    pub url: &'a str,
    pub start_at: Option<f64>,
    pub detach: bool,
}

/// Expands the configured command template. `%URL%` is substituted wherever
/// it appears; a template without the placeholder gets the URL appended.
/// A mid-clip handoff adds `--start=<secs>`.
pub fn external_player_args(command: &[String], url: &str, start_at: Option<f64>) -> Vec<String> {
    let mut args = Vec::new();
    let mut placed = false;
    for part in command.iter().skip(1) {
        if part.contains(URL_PLACEHOLDER) {
            placed = true;
            args.push(part.replace(URL_PLACEHOLDER, url));
        } else {
            args.push(part.clone());
        }
    }
    if !placed {
        args.push(url.to_string());
    }
    if let Some(start) = start_at {
        if start.is_finite() && start > 0.0 {
            args.push(format!("--start={start:.1}"));
        }
    }
    args
}

pub fn spawn_external(launch: ExternalLaunch<'_>) -> Result<()> {
    let Some(program) = launch.command.first() else {
        bail!("video player command is empty");
    };
    if launch.url.trim().is_empty() {
        bail!("video url missing");
    }
    let args = external_player_args(launch.command, launch.url, launch.start_at);
    debug_log(format!("playback: spawning {program} {args:?}"));

    let mut command = Command::new(program);
    command.args(&args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    let mut child = command
        .spawn()
        .with_context(|| format!("launch {program} for {}", launch.url))?;
    if !launch.detach {
        let status = child
            .wait()
            .with_context(|| format!("wait for {program}"))?;
        if !status.success() {
            bail!("{program} exited with status {:?}", status.code());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_post;
    use crate::api::PostKind;

    fn video_player() -> Player {
        let mut player = Player::new(&sample_post("v1", PostKind::Video));
        player.set_duration(10.0);
        player
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn toggle_walks_the_state_machine() {
        let t0 = Instant::now();
        let mut player = video_player();
        assert_eq!(player.state(), PlayState::Unstarted);
        assert!(!player.attached());

        player.toggle(t0);
        assert_eq!(player.state(), PlayState::Playing);
        assert!(player.attached());

        player.toggle(t0 + Duration::from_secs(1));
        assert_eq!(player.state(), PlayState::Paused);
        assert!(player.attached());

        player.toggle(t0 + Duration::from_secs(2));
        assert_eq!(player.state(), PlayState::Playing);
    }

    #[test]
    fn playhead_wraps_and_keeps_playing() {
        let t0 = Instant::now();
        let mut player = video_player();
        player.play(t0);
        player.tick(t0 + Duration::from_secs(25));
        assert!(close(player.position(), 5.0), "position {}", player.position());
        assert_eq!(player.state(), PlayState::Playing);
    }

    #[test]
    fn pause_captures_the_elapsed_position() {
        let t0 = Instant::now();
        let mut player = video_player();
        player.play(t0);
        player.pause(t0 + Duration::from_secs(4));
        assert_eq!(player.state(), PlayState::Paused);
        assert!(close(player.position(), 4.0));

        // A later tick must not advance a paused clip.
        player.tick(t0 + Duration::from_secs(9));
        assert!(close(player.position(), 4.0));
    }

    #[test]
    fn seek_clamps_to_clip_bounds() {
        let t0 = Instant::now();
        let mut player = video_player();
        player.seek_to(-3.0, t0);
        assert!(close(player.position(), 0.0));
        player.seek_to(99.0, t0);
        assert!(close(player.position(), 10.0));
        player.seek_to(7.25, t0);
        assert!(close(player.position(), 7.25));
        player.seek_to(f64::NAN, t0);
        assert!(close(player.position(), 7.25));
    }

    #[test]
    fn losing_visibility_pauses_without_resume() {
        let t0 = Instant::now();
        let mut player = video_player();
        player.play(t0);

        player.set_visible_fraction(0.4, t0 + Duration::from_secs(2));
        assert_eq!(player.state(), PlayState::Paused);
        assert!(close(player.position(), 2.0));

        player.set_visible_fraction(1.0, t0 + Duration::from_secs(3));
        assert_eq!(player.state(), PlayState::Paused);

        player.toggle(t0 + Duration::from_secs(4));
        assert_eq!(player.state(), PlayState::Playing);
    }

    #[test]
    fn single_post_context_ignores_visibility() {
        let t0 = Instant::now();
        let mut player = video_player();
        player.set_ignore_visibility(true);
        player.play(t0);
        player.set_visible_fraction(0.0, t0 + Duration::from_secs(1));
        assert_eq!(player.state(), PlayState::Playing);
    }

    #[test]
    fn controls_hide_after_three_seconds_of_playback() {
        let t0 = Instant::now();
        let mut player = video_player();
        player.play(t0);
        assert!(player.controls_visible(t0 + Duration::from_secs(2)));
        assert!(!player.controls_visible(t0 + Duration::from_millis(3100)));

        player.note_interaction(t0 + Duration::from_secs(4));
        assert!(player.controls_visible(t0 + Duration::from_secs(5)));

        player.pause(t0 + Duration::from_secs(6));
        assert!(player.controls_visible(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn registry_keeps_a_single_player_active() {
        let t0 = Instant::now();
        let a = sample_post("a", PostKind::Video);
        let b = sample_post("b", PostKind::Video);
        let mut set = PlayerSet::new();

        set.play(&a, t0);
        assert_eq!(set.active_id(), Some("a"));

        set.play(&b, t0 + Duration::from_secs(1));
        assert_eq!(set.active_id(), Some("b"));
        assert_eq!(set.get("a").map(Player::state), Some(PlayState::Paused));

        let playing = set
            .players
            .values()
            .filter(|player| player.is_playing())
            .count();
        assert_eq!(playing, 1);
    }

    #[test]
    fn registry_toggle_pauses_and_resumes() {
        let t0 = Instant::now();
        let a = sample_post("a", PostKind::Video);
        let mut set = PlayerSet::new();

        set.toggle(&a, t0);
        assert_eq!(set.active_id(), Some("a"));
        set.toggle(&a, t0 + Duration::from_secs(1));
        assert_eq!(set.active_id(), None);
        set.toggle(&a, t0 + Duration::from_secs(2));
        assert_eq!(set.active_id(), Some("a"));
    }

    #[test]
    fn handoff_pauses_and_reports_position() {
        let t0 = Instant::now();
        let mut player = video_player();
        player.play(t0);
        let position = player.begin_handoff(t0 + Duration::from_secs(4));
        assert!(close(position, 4.0));
        assert_eq!(player.state(), PlayState::Paused);
    }

    #[test]
    fn default_muted_and_mute_toggles() {
        let t0 = Instant::now();
        let mut player = video_player();
        assert!(player.muted());
        player.toggle_mute(t0);
        assert!(!player.muted());
        player.toggle_mute(t0);
        assert!(player.muted());
    }

    #[test]
    fn external_args_substitute_url_and_start() {
        let command = vec!["mpv".to_string(), "--fs".to_string(), "%URL%".to_string()];
        let args = external_player_args(&command, "https://cdn.example/v.mp4", Some(12.5));
        assert_eq!(args, vec!["--fs", "https://cdn.example/v.mp4", "--start=12.5"]);

        let bare = vec!["vlc".to_string()];
        let args = external_player_args(&bare, "https://cdn.example/v.mp4", None);
        assert_eq!(args, vec!["https://cdn.example/v.mp4"]);

        let args = external_player_args(&bare, "https://cdn.example/v.mp4", Some(0.0));
        assert_eq!(args, vec!["https://cdn.example/v.mp4"]);
    }
}
