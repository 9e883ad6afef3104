use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::config;
use crate::data::{ApiFeedService, ApiPostService, FeedService, PostService};
use crate::media;
use crate::prefs;
use crate::storage;
use crate::ui;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let store =
        Arc::new(storage::Store::open(storage::Options::default()).context("open storage")?);
    let device_id = store.device_id().context("resolve device id")?;
    let preferences = prefs::Preferences::load(store.clone()).context("load preferences")?;

    let client = api::Client::new(api::ClientConfig {
        user_agent: cfg.api.user_agent.clone(),
        base_url: Some(cfg.api.base_url.clone()),
        device_id: Some(device_id),
        timeout: cfg.api.timeout,
        http_client: None,
    })
    .context("build api client")?;
    let client = Arc::new(client);

    let feed_service: Arc<dyn FeedService> = Arc::new(ApiFeedService::new(client.clone()));
    let post_service: Arc<dyn PostService> = Arc::new(ApiPostService::new(client.clone()));

    let media_cfg = media::Config {
        cache_dir: cfg.media.cache_dir.clone(),
        download_dir: cfg.media.download_dir.clone(),
        max_size_bytes: cfg.media.max_size_bytes,
        default_ttl: cfg.media.default_ttl,
        workers: cfg.media.workers,
        http_client: None,
    };
    // A broken cache dir should not keep the feed from opening; downloads
    // just report unavailable.
    let media_manager = media::Manager::new(store.clone(), media_cfg)
        .ok()
        .map(Arc::new);

    let options = ui::Options {
        config: cfg,
        config_path: display_path,
        store,
        preferences,
        feed_service,
        post_service,
        media: media_manager,
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    Ok(())
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/memeverse-tui/config.yaml".to_string()
    }
}
