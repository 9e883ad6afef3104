#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod config;
pub mod data;
pub mod feed;
pub mod media;
pub mod playback;
pub mod prefs;
pub mod reels;
pub mod session;
pub mod share;
pub mod storage;
pub mod templates;
pub mod ui;
pub mod update;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
