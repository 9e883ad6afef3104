fn main() {
    if handle_cli_flags() {
        return;
    }

    if let Err(err) = memeverse_tui::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("MemeVerse TUI {}", memeverse_tui::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "MemeVerse TUI — Browse the MemeVerse meme feed from the terminal.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --check-updates      Check for updates and exit\n  --sitemap            Print the crawl seed URL list and exit"
                );
                saw_flag = true;
            }
            "--check-updates" => {
                saw_flag = true;
                if let Err(err) = check_updates_once() {
                    eprintln!("Update check failed: {err:?}");
                    std::process::exit(1);
                }
            }
            "--sitemap" => {
                saw_flag = true;
                if let Err(err) = print_sitemap() {
                    eprintln!("Sitemap generation failed: {err:?}");
                    std::process::exit(1);
                }
            }
            _ => {}
        }
    }
    saw_flag
}

fn check_updates_once() -> anyhow::Result<()> {
    use semver::Version;

    let skip_env = memeverse_tui::update::SKIP_UPDATE_ENV;
    if std::env::var(skip_env).is_ok() {
        println!("Update check skipped: {skip_env} is set.");
        return Ok(());
    }

    let current = Version::parse(memeverse_tui::VERSION)?;
    match memeverse_tui::update::check_for_update(&current)? {
        Some(info) => {
            let memeverse_tui::update::UpdateInfo {
                version,
                release_url,
                ..
            } = info;
            println!("Update available: {current} -> {version}\n{release_url}");
        }
        None => {
            println!("MemeVerse TUI {current} is up to date.");
        }
    }
    Ok(())
}

fn print_sitemap() -> anyhow::Result<()> {
    let config = memeverse_tui::config::load(memeverse_tui::config::LoadOptions::default())?;
    let client = memeverse_tui::api::Client::new(memeverse_tui::api::ClientConfig {
        user_agent: config.api.user_agent.clone(),
        base_url: Some(config.api.base_url.clone()),
        device_id: None,
        timeout: config.api.timeout,
        http_client: None,
    })?;

    let ids = client.post_ids()?;
    for url in memeverse_tui::api::sitemap_urls(&config.api.site_url, &ids) {
        println!("{url}");
    }
    Ok(())
}
