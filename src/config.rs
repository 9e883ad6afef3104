use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "MEMEVERSE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Base for share links and the sitemap; usually the same host as
    /// `base_url`.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            site_url: default_site_url(),
            user_agent: default_user_agent(),
            timeout: None,
        }
    }
}

fn default_base_url() -> String {
    "https://memeverse.in".to_string()
}

fn default_site_url() -> String {
    "https://memeverse.in".to_string()
}

fn default_user_agent() -> String {
    "memeverse-tui/0.1 (+https://github.com/memeverse/memeverse-tui)".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_download_dir")]
    pub download_dir: Option<PathBuf>,
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: i64,
    #[serde(default = "default_media_ttl_duration", with = "humantime_serde")]
    pub default_ttl: Duration,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            download_dir: default_download_dir(),
            max_size_bytes: default_max_size_bytes(),
            default_ttl: default_media_ttl_duration(),
            workers: default_workers(),
        }
    }
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("memeverse-tui").join("media"))
}

fn default_download_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(dirs::home_dir)
}

fn default_max_size_bytes() -> i64 {
    500 * 1024 * 1024
}

fn default_media_ttl_duration() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_workers() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_video_command")]
    pub video_command: Vec<String>,
    #[serde(default = "default_video_detach")]
    pub video_detach: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            video_command: default_video_command(),
            video_detach: default_video_detach(),
        }
    }
}

fn default_video_command() -> Vec<String> {
    vec!["mpv".into(), "--fs".into(), "%URL%".into()]
}

fn default_video_detach() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() && other.api.base_url != default_base_url() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.site_url.is_empty() && other.api.site_url != default_site_url() {
        base.api.site_url = other.api.site_url;
    }
    if !other.api.user_agent.is_empty() && other.api.user_agent != default_user_agent() {
        base.api.user_agent = other.api.user_agent;
    }
    if other.api.timeout.is_some() {
        base.api.timeout = other.api.timeout;
    }

    if !other.ui.theme.is_empty() && other.ui.theme != default_theme() {
        base.ui.theme = other.ui.theme;
    }

    if other.media.cache_dir.is_some() && other.media.cache_dir != default_cache_dir() {
        base.media.cache_dir = other.media.cache_dir;
    }
    if other.media.download_dir.is_some() && other.media.download_dir != default_download_dir() {
        base.media.download_dir = other.media.download_dir;
    }
    if other.media.max_size_bytes != 0 && other.media.max_size_bytes != default_max_size_bytes() {
        base.media.max_size_bytes = other.media.max_size_bytes;
    }
    if other.media.default_ttl != default_media_ttl_duration() {
        base.media.default_ttl = other.media.default_ttl;
    }
    if other.media.workers != 0 && other.media.workers != default_workers() {
        base.media.workers = other.media.workers;
    }

    if !other.player.video_command.is_empty()
        && other.player.video_command != default_video_command()
    {
        base.player.video_command = other.player.video_command;
    }
    if other.player.video_detach != default_video_detach() {
        base.player.video_detach = other.player.video_detach;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(Config::default());
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.site_url" => cfg.api.site_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = Some(duration);
            }
        }
        "ui.theme" => cfg.ui.theme = value,
        "media.cache_dir" => cfg.media.cache_dir = Some(PathBuf::from(value)),
        "media.download_dir" => cfg.media.download_dir = Some(PathBuf::from(value)),
        "media.max_size_bytes" => {
            if let Ok(parsed) = value.parse::<i64>() {
                cfg.media.max_size_bytes = parsed;
            }
        }
        "media.default_ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.media.default_ttl = duration;
            }
        }
        "media.workers" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.media.workers = parsed;
            }
        }
        "player.video_command" => {
            cfg.player.video_command = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "player.video_detach" => {
            cfg.player.video_detach = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("memeverse-tui").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/config.yaml")),
            env_prefix: Some("MEMEVERSE_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://memeverse.in");
        assert_eq!(cfg.api.site_url, "https://memeverse.in");
        assert_eq!(cfg.ui.theme, "default");
        assert_eq!(cfg.media.workers, 2);
        assert_eq!(cfg.media.max_size_bytes, 500 * 1024 * 1024);
        assert_eq!(cfg.player.video_command, vec!["mpv", "--fs", "%URL%"]);
        assert!(cfg.player.video_detach);
        assert!(cfg.api.timeout.is_none());
    }

    #[test]
    fn file_values_survive_the_env_merge() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  base_url: https://staging.memeverse.in\n  timeout: 5s\nmedia:\n  default_ttl: 1h\n  workers: 4\n",
        )
        .unwrap();

        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("MEMEVERSE_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://staging.memeverse.in");
        assert_eq!(cfg.api.timeout, Some(Duration::from_secs(5)));
        assert_eq!(cfg.media.default_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.media.workers, 4);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.api.user_agent, default_user_agent());
    }

    #[test]
    fn env_overrides() {
        env::set_var("MEMEVERSE_TESTENV_API__BASE_URL", "https://env.memeverse.in");
        env::set_var("MEMEVERSE_TESTENV_MEDIA__DEFAULT_TTL", "90m");
        env::set_var("MEMEVERSE_TESTENV_PLAYER__VIDEO_COMMAND", "vlc,%URL%");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/config.yaml")),
            env_prefix: Some("MEMEVERSE_TESTENV".into()),
        })
        .unwrap();
        env::remove_var("MEMEVERSE_TESTENV_API__BASE_URL");
        env::remove_var("MEMEVERSE_TESTENV_MEDIA__DEFAULT_TTL");
        env::remove_var("MEMEVERSE_TESTENV_PLAYER__VIDEO_COMMAND");

        assert_eq!(cfg.api.base_url, "https://env.memeverse.in");
        assert_eq!(cfg.media.default_ttl, Duration::from_secs(90 * 60));
        assert_eq!(cfg.player.video_command, vec!["vlc", "%URL%"]);
    }
}
