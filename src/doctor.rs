use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Config;
use crate::gateway::GatewayClient;

pub const FLATHUB_URL: &str = "https://flathub.org/apps/details/io.mpv.Mpv";
pub const MPV_INSTALL_URL: &str = "https://mpv.io/installation/";

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
        }
    }

    fn warning(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
        }
    }

    fn error(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Error => "✗",
        }
    }

    pub fn color(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "\x1b[32m",      // green
            CheckStatus::Warning => "\x1b[33m", // yellow
            CheckStatus::Error => "\x1b[31m",   // red
        }
    }
}

/// Running inside a Flatpak sandbox, where host binaries are only reachable
/// through `flatpak-spawn --host`.
pub fn in_flatpak() -> bool {
    Path::new("/.flatpak-info").exists()
}

/// Player command lines to try, in order.
pub fn player_candidates(in_flatpak: bool) -> Vec<String> {
    let candidates = ["mpv", "flatpak run io.mpv.Mpv"];
    candidates
        .iter()
        .map(|c| {
            if in_flatpak {
                format!("flatpak-spawn --host {}", c)
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// Whether `command_line --version` runs and exits successfully.
pub async fn player_works(command_line: &str) -> bool {
    let Ok(words) = shell_words::split(command_line) else {
        return false;
    };
    let Some((program, args)) = words.split_first() else {
        return false;
    };

    if which::which(program).is_err() {
        debug!(program = %program, "not found in PATH");
        return false;
    }

    let status = Command::new(program)
        .args(args)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(VERSION_TIMEOUT, status).await {
        Ok(Ok(status)) => {
            debug!(command = command_line, %status, "player version check finished");
            status.success()
        }
        Ok(Err(e)) => {
            debug!(command = command_line, error = %e, "player version check failed");
            false
        }
        Err(_) => {
            debug!(command = command_line, "player version check timed out");
            false
        }
    }
}

pub async fn find_working_player() -> Option<String> {
    for candidate in player_candidates(in_flatpak()) {
        if player_works(&candidate).await {
            info!(player = %candidate, "found working player");
            return Some(candidate);
        }
    }
    None
}

/// The configured player command, or the first one that works.
pub async fn resolve_player(config: &Config) -> Option<String> {
    match config.player.configured_command() {
        Some(command) => Some(command.to_string()),
        None => find_working_player().await,
    }
}

pub async fn run_checks(config: &Config) -> Vec<CheckResult> {
    vec![
        check_gateway(config).await,
        check_player(config).await,
        check_storage(config),
    ]
}

async fn check_gateway(config: &Config) -> CheckResult {
    let client = GatewayClient::new(&config.gateway);

    match client.ping().await {
        Ok(status) if status == reqwest::StatusCode::UNAUTHORIZED => CheckResult::error(
            "Gateway",
            &format!(
                "{} rejected the credentials. Check gateway.username and gateway.password.",
                client.base_url()
            ),
        ),
        Ok(status) if config.gateway.username.is_empty() || config.gateway.password.is_empty() => {
            CheckResult::warning(
                "Gateway",
                &format!(
                    "Reachable at {} (HTTP {}), but gateway.username or gateway.password is empty",
                    client.base_url(),
                    status.as_u16()
                ),
            )
        }
        Ok(status) => CheckResult::ok(
            "Gateway",
            &format!("Reachable at {} (HTTP {})", client.base_url(), status.as_u16()),
        ),
        Err(e) => CheckResult::error("Gateway", &format!("Connection failed: {}", e)),
    }
}

async fn check_player(config: &Config) -> CheckResult {
    match config.player.configured_command() {
        Some(command) => {
            if player_works(command).await {
                CheckResult::ok("Player", &format!("'{}' works", command))
            } else {
                CheckResult::error("Player", &format!("'{}' did not run", command))
            }
        }
        None => match find_working_player().await {
            Some(command) => CheckResult::ok("Player", &format!("Found '{}'", command)),
            None => CheckResult::error(
                "Player",
                &format!("mpv not found. Install it from {}", MPV_INSTALL_URL),
            ),
        },
    }
}

fn check_storage(config: &Config) -> CheckResult {
    let temp_dir = config.storage.temp_dir();

    if temp_dir.exists() {
        // Check if writable
        let test_file = temp_dir.join(".tanglecast_test");
        match std::fs::write(&test_file, "test") {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_file);
                CheckResult::ok("Storage", &format!("Temp dir: {}", temp_dir.display()))
            }
            Err(e) => CheckResult::error("Storage", &format!("Temp dir not writable: {}", e)),
        }
    } else {
        match std::fs::create_dir_all(&temp_dir) {
            Ok(_) => CheckResult::ok(
                "Storage",
                &format!("Created temp dir: {}", temp_dir.display()),
            ),
            Err(e) => CheckResult::error("Storage", &format!("Cannot create temp dir: {}", e)),
        }
    }
}

pub fn print_results(results: &[CheckResult]) {
    let reset = "\x1b[0m";

    println!("\ntanglecast doctor\n");

    for result in results {
        println!(
            "  {}{} {}{}  {}",
            result.color(),
            result.icon(),
            result.name,
            reset,
            result.message
        );
    }

    println!();

    let errors = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Error))
        .count();
    let warnings = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Warning))
        .count();

    if errors > 0 {
        println!("  {} error(s), {} warning(s)", errors, warnings);
        println!("  Fix errors above to use tanglecast.\n");
    } else if warnings > 0 {
        println!("  {} warning(s)\n", warnings);
    } else {
        println!("  All checks passed!\n");
    }
}
