use std::fs::File;

use tanglecast::config::{self, Config};
use tanglecast::{doctor, tui};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EXAMPLE_CONFIG: &str = r#"
[gateway]
url = "http://localhost:1337"
username = "user"
password = "secret"

[player]
# Leave out to use mpv from PATH
command = "mpv"
args = ["--force-window=immediate"]

[log]
verbosity = 5

[report]
issues_url = "https://github.com/tanglecast/tanglecast/issues"
"#;

fn init_tracing(config: &Config) {
    // Log to a file so the TUI is not corrupted
    let temp_dir = config.storage.temp_dir();
    let log_file = std::fs::create_dir_all(&temp_dir)
        .and_then(|()| File::create(temp_dir.join("tanglecast.log")))
        .ok();
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log.default_filter()))
    };

    if let Some(file) = log_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .with_ansi(false)
            .with_writer(file)
            .init();
    } else {
        // Fallback to stderr if can't create log file
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let config_path = Config::config_path().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(config::ConfigError::NotFound(path)) => {
            eprintln!("No config file at {}, using defaults.", path.display());
            eprintln!("\nExample config.toml:{}", EXAMPLE_CONFIG);
            Config::default()
        }
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);
    info!(gateway = %config.gateway.url, "starting tanglecast");

    if std::env::args().nth(1).as_deref() == Some("doctor") {
        let results = doctor::run_checks(&config).await;
        doctor::print_results(&results);
        return;
    }

    let player_command = doctor::resolve_player(&config).await;
    if player_command.is_none() {
        warn!("no working player found");
    }

    match tui::run(config, player_command, config_path).await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
