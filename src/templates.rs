use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use once_cell::sync::Lazy;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];

/// Raw drag deltas are in cells; pan moves at a fifth of that so a slot can
/// be positioned precisely.
pub const DRAG_SENSITIVITY: f64 = 0.2;
pub const ZOOM_STEP: f64 = 0.1;

pub const RENDER_STATUS_WORKING: &str = "Creating your masterpiece...";
pub const RENDER_STATUS_DONE: &str = "Video created successfully!";
pub const RENDER_STATUS_FAILED: &str = "Something went wrong";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// The rejection line shown when a slot gets the wrong kind of file.
    pub fn rejection(&self) -> &'static str {
        match self {
            MediaKind::Image => "Please select an image file",
            MediaKind::Video => "Please select a video file",
        }
    }
}

/// Classifies a file by extension. `None` means neither a known image nor a
/// known video extension.
pub fn media_kind_for_path(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (w, h) = raw.split_once(':')?;
        let width: u32 = w.trim().parse().ok()?;
        let height: u32 = h.trim().parse().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

const PORTRAIT: AspectRatio = AspectRatio::new(9, 16);
const SQUARE: AspectRatio = AspectRatio::new(1, 1);
const LANDSCAPE: AspectRatio = AspectRatio::new(16, 9);

#[derive(Clone, Debug)]
pub struct MediaSlot {
    pub id: &'static str,
    pub kind: MediaKind,
    pub aspect: AspectRatio,
    pub label: &'static str,
}

#[derive(Clone, Debug)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub duration_secs: u32,
    pub slots: Vec<MediaSlot>,
}

static CATALOG: Lazy<Vec<Template>> = Lazy::new(|| {
    vec![
        Template {
            id: "t1",
            name: "Cyberpunk Glitch",
            description: "Futuristic glitch transitions for your best moments",
            duration_secs: 15,
            slots: vec![
                MediaSlot {
                    id: "m1",
                    kind: MediaKind::Image,
                    aspect: PORTRAIT,
                    label: "Cover Shot",
                },
                MediaSlot {
                    id: "m2",
                    kind: MediaKind::Video,
                    aspect: PORTRAIT,
                    label: "Main Action",
                },
                MediaSlot {
                    id: "m3",
                    kind: MediaKind::Image,
                    aspect: SQUARE,
                    label: "Detail Shot",
                },
            ],
        },
        Template {
            id: "t2",
            name: "Neon Nights",
            description: "Vibrant neon colors and fast cuts",
            duration_secs: 10,
            slots: vec![
                MediaSlot {
                    id: "m1",
                    kind: MediaKind::Video,
                    aspect: PORTRAIT,
                    label: "Intro",
                },
                MediaSlot {
                    id: "m2",
                    kind: MediaKind::Video,
                    aspect: PORTRAIT,
                    label: "Drop",
                },
            ],
        },
        Template {
            id: "t3",
            name: "Retro VHS",
            description: "Old school cool with VHS noise overlay",
            duration_secs: 20,
            slots: vec![
                MediaSlot {
                    id: "m1",
                    kind: MediaKind::Image,
                    aspect: LANDSCAPE,
                    label: "Landscape",
                },
                MediaSlot {
                    id: "m2",
                    kind: MediaKind::Image,
                    aspect: PORTRAIT,
                    label: "Portrait",
                },
                MediaSlot {
                    id: "m3",
                    kind: MediaKind::Image,
                    aspect: PORTRAIT,
                    label: "Portrait",
                },
                MediaSlot {
                    id: "m4",
                    kind: MediaKind::Image,
                    aspect: PORTRAIT,
                    label: "Portrait",
                },
            ],
        },
        Template {
            id: "t4",
            name: "Cinematic Travel",
            description: "Slow motion pans and dramatic fades",
            duration_secs: 30,
            slots: vec![
                MediaSlot {
                    id: "m1",
                    kind: MediaKind::Video,
                    aspect: PORTRAIT,
                    label: "Scenery",
                },
                MediaSlot {
                    id: "m2",
                    kind: MediaKind::Video,
                    aspect: PORTRAIT,
                    label: "Movement",
                },
                MediaSlot {
                    id: "m3",
                    kind: MediaKind::Image,
                    aspect: PORTRAIT,
                    label: "Selfie",
                },
            ],
        },
    ]
});

pub fn catalog() -> &'static [Template] {
    &CATALOG
}

pub fn find(template_id: &str) -> Option<&'static Template> {
    CATALOG.iter().find(|template| template.id == template_id)
}

/// A user-selected source plus how it sits inside its slot: pan as percent
/// of the overflow and zoom scale. Session-local, never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct CropData {
    source: PathBuf,
    x: f64,
    y: f64,
    scale: f64,
}

impl CropData {
    /// Fresh crop: centered, unzoomed.
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            x: 50.0,
            y: 50.0,
            scale: 1.0,
        }
    }

    pub fn with(source: PathBuf, x: f64, y: f64, scale: f64) -> Self {
        let mut crop = Self::new(source);
        crop.set_x(x);
        crop.set_y(y);
        crop.set_scale(scale);
        crop
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_x(&mut self, x: f64) {
        if x.is_finite() {
            self.x = x.clamp(0.0, 100.0);
        }
    }

    pub fn set_y(&mut self, y: f64) {
        if y.is_finite() {
            self.y = y.clamp(0.0, 100.0);
        }
    }

    pub fn set_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.scale = scale.clamp(1.0, 3.0);
        }
    }

    /// Pans opposite the drag so the content follows the pointer.
    pub fn drag_by(&mut self, dx: f64, dy: f64) {
        self.set_x(self.x - dx * DRAG_SENSITIVITY);
        self.set_y(self.y - dy * DRAG_SENSITIVITY);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.set_scale(self.scale + delta);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderUpdate {
    Progress { percent: u8, message: String },
    Finished { message: String },
    Failed { message: String },
}

impl RenderUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderUpdate::Finished { .. } | RenderUpdate::Failed { .. })
    }
}

/// A simulated compose running on its own thread. The worker walks the slot
/// sources, reports progress, and ends in exactly one terminal update.
#[derive(Debug)]
pub struct RenderJob {
    updates: Receiver<RenderUpdate>,
    handle: Option<JoinHandle<()>>,
}

impl RenderJob {
    fn spawn(sources: Vec<PathBuf>, step: Duration) -> Self {
        let (tx, rx) = unbounded();
        let handle = thread::spawn(move || {
            let total = sources.len().max(1);
            let mut ok = true;
            for (index, source) in sources.iter().enumerate() {
                let percent = (index * 100 / total) as u8;
                let _ = tx.send(RenderUpdate::Progress {
                    percent,
                    message: RENDER_STATUS_WORKING.to_string(),
                });
                if !source.exists() {
                    ok = false;
                }
                if !step.is_zero() {
                    thread::sleep(step);
                }
            }
            let update = if ok {
                RenderUpdate::Finished {
                    message: RENDER_STATUS_DONE.to_string(),
                }
            } else {
                RenderUpdate::Failed {
                    message: RENDER_STATUS_FAILED.to_string(),
                }
            };
            let _ = tx.send(update);
        });
        Self {
            updates: rx,
            handle: Some(handle),
        }
    }

    pub fn try_update(&mut self) -> Option<RenderUpdate> {
        match self.updates.try_recv() {
            Ok(update) => Some(update),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Blocks until the worker ends and returns its terminal update.
    pub fn wait(mut self) -> Option<RenderUpdate> {
        let mut last = None;
        while let Ok(update) = self.updates.recv() {
            last = Some(update);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        last
    }
}

/// Editing session for one template: which slots are filled and with what
/// crop. Fills survive a render so the editor stays populated.
pub struct Editor {
    template: &'static Template,
    fills: HashMap<&'static str, CropData>,
}

impl Editor {
    pub fn new(template_id: &str) -> Result<Self> {
        let template =
            find(template_id).ok_or_else(|| anyhow!("template not found: {template_id}"))?;
        Ok(Self {
            template,
            fills: HashMap::new(),
        })
    }

    pub fn template(&self) -> &'static Template {
        self.template
    }

    pub fn fill(&self, slot_id: &str) -> Option<&CropData> {
        self.fills.get(slot_id)
    }

    pub fn filled_count(&self) -> usize {
        self.fills.len()
    }

    pub fn is_complete(&self) -> bool {
        self.template
            .slots
            .iter()
            .all(|slot| self.fills.contains_key(slot.id))
    }

    /// Validates a file against the slot and opens a fresh centered crop for
    /// adjustment. Nothing is stored until [`Editor::confirm_fill`].
    pub fn begin_fill(&self, slot_id: &str, source: &Path) -> Result<CropData> {
        let slot = self.slot(slot_id)?;
        match media_kind_for_path(source) {
            Some(kind) if kind == slot.kind => {}
            _ => bail!("{}", slot.kind.rejection()),
        }
        Ok(CropData::new(source.to_path_buf()))
    }

    /// Stores a confirmed crop. Refilling a slot replaces its content.
    pub fn confirm_fill(&mut self, slot_id: &str, crop: CropData) -> Result<()> {
        let slot = self.slot(slot_id)?;
        self.fills.insert(slot.id, crop);
        Ok(())
    }

    pub fn clear(&mut self, slot_id: &str) {
        self.fills.remove(slot_id);
    }

    pub fn render(&self) -> Result<RenderJob> {
        self.render_with_step(Duration::from_millis(500))
    }

    pub fn render_with_step(&self, step: Duration) -> Result<RenderJob> {
        if !self.is_complete() {
            bail!("Please fill all {} slots", self.template.slots.len());
        }
        let sources = self
            .template
            .slots
            .iter()
            .filter_map(|slot| self.fills.get(slot.id))
            .map(|crop| crop.source.clone())
            .collect();
        Ok(RenderJob::spawn(sources, step))
    }

    fn slot(&self, slot_id: &str) -> Result<&MediaSlot> {
        self.template
            .slots
            .iter()
            .find(|slot| slot.id == slot_id)
            .ok_or_else(|| anyhow!("unknown slot: {slot_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn catalog_matches_the_published_set() {
        let ids: Vec<&str> = catalog().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3", "t4"]);

        let glitch = find("t1").unwrap();
        assert_eq!(glitch.name, "Cyberpunk Glitch");
        assert_eq!(glitch.duration_secs, 15);
        let kinds: Vec<MediaKind> = glitch.slots.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![MediaKind::Image, MediaKind::Video, MediaKind::Image]
        );
        assert_eq!(glitch.slots[0].label, "Cover Shot");
        assert_eq!(glitch.slots[2].aspect, AspectRatio::new(1, 1));

        let vhs = find("t3").unwrap();
        assert_eq!(vhs.slots.len(), 4);
        assert!(vhs.slots.iter().all(|s| s.kind == MediaKind::Image));

        assert!(find("t9").is_none());
    }

    #[test]
    fn aspect_ratio_parses_and_computes() {
        let portrait = AspectRatio::parse("9:16").unwrap();
        assert!((portrait.ratio() - 0.5625).abs() < 1e-9);
        assert_eq!(portrait.to_string(), "9:16");

        assert_eq!(AspectRatio::parse("16:9"), Some(AspectRatio::new(16, 9)));
        assert!(AspectRatio::parse("16x9").is_none());
        assert!(AspectRatio::parse("0:9").is_none());
        assert!(AspectRatio::parse("wide").is_none());
    }

    #[test]
    fn crop_clamps_pan_and_zoom() {
        let mut crop = CropData::new(PathBuf::from("a.jpg"));
        assert_eq!(crop.x(), 50.0);
        assert_eq!(crop.y(), 50.0);
        assert_eq!(crop.scale(), 1.0);

        crop.set_x(-5.0);
        assert_eq!(crop.x(), 0.0);
        crop.set_x(150.0);
        assert_eq!(crop.x(), 100.0);
        crop.set_scale(0.2);
        assert_eq!(crop.scale(), 1.0);
        crop.set_scale(9.0);
        assert_eq!(crop.scale(), 3.0);

        let clamped = CropData::with(PathBuf::from("b.jpg"), 120.0, -3.0, 0.0);
        assert_eq!(clamped.x(), 100.0);
        assert_eq!(clamped.y(), 0.0);
        assert_eq!(clamped.scale(), 1.0);
    }

    #[test]
    fn drag_applies_sensitivity_and_pans_opposite() {
        let mut crop = CropData::new(PathBuf::from("a.jpg"));
        crop.drag_by(100.0, 0.0);
        assert_eq!(crop.x(), 30.0);
        crop.drag_by(-300.0, 50.0);
        assert_eq!(crop.x(), 90.0);
        assert_eq!(crop.y(), 40.0);

        crop.drag_by(1000.0, 1000.0);
        assert_eq!(crop.x(), 0.0);
        assert_eq!(crop.y(), 0.0);
    }

    #[test]
    fn slot_rejects_the_wrong_kind_of_file() {
        let editor = Editor::new("t1").unwrap();

        // t1 m1 wants an image, m2 wants a video.
        let err = editor
            .begin_fill("m1", Path::new("clip.mp4"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Please select an image file");

        let err = editor
            .begin_fill("m2", Path::new("photo.png"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Please select a video file");

        let err = editor
            .begin_fill("m1", Path::new("notes.txt"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Please select an image file");

        assert!(editor.begin_fill("m1", Path::new("PHOTO.JPG")).is_ok());
        assert!(editor.begin_fill("nope", Path::new("a.jpg")).is_err());
    }

    #[test]
    fn fills_replace_and_clear() {
        let mut editor = Editor::new("t2").unwrap();
        let crop = editor.begin_fill("m1", Path::new("intro.mp4")).unwrap();
        editor.confirm_fill("m1", crop).unwrap();
        assert_eq!(editor.filled_count(), 1);
        assert!(!editor.is_complete());

        let replacement = editor.begin_fill("m1", Path::new("other.mov")).unwrap();
        editor.confirm_fill("m1", replacement).unwrap();
        assert_eq!(editor.filled_count(), 1);
        assert_eq!(
            editor.fill("m1").unwrap().source(),
            Path::new("other.mov")
        );

        editor.clear("m1");
        assert_eq!(editor.filled_count(), 0);
    }

    #[test]
    fn render_requires_every_slot() {
        let mut editor = Editor::new("t2").unwrap();
        let crop = editor.begin_fill("m1", Path::new("intro.mp4")).unwrap();
        editor.confirm_fill("m1", crop).unwrap();

        let err = editor.render().unwrap_err();
        assert_eq!(err.to_string(), "Please fill all 2 slots");
    }

    #[test]
    fn render_reaches_a_terminal_status() {
        let dir = tempfile::tempdir().unwrap();
        let intro = dir.path().join("intro.mp4");
        let drop = dir.path().join("drop.webm");
        fs::write(&intro, b"x").unwrap();
        fs::write(&drop, b"x").unwrap();

        let mut editor = Editor::new("t2").unwrap();
        for (slot, path) in [("m1", &intro), ("m2", &drop)] {
            let crop = editor.begin_fill(slot, path).unwrap();
            editor.confirm_fill(slot, crop).unwrap();
        }

        let job = editor.render_with_step(Duration::ZERO).unwrap();
        let last = job.wait().unwrap();
        assert_eq!(
            last,
            RenderUpdate::Finished {
                message: RENDER_STATUS_DONE.to_string()
            }
        );

        // Fills survive the render.
        assert!(editor.is_complete());

        // A source that vanished before compose fails the job.
        fs::remove_file(&drop).unwrap();
        let job = editor.render_with_step(Duration::ZERO).unwrap();
        let last = job.wait().unwrap();
        assert_eq!(
            last,
            RenderUpdate::Failed {
                message: RENDER_STATUS_FAILED.to_string()
            }
        );
    }

    #[test]
    fn unknown_template_is_an_error() {
        assert!(Editor::new("t99").is_err());
    }
}
