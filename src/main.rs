use clap::{Parser, Subcommand};
use pr_review_light::config::{self, AppSettings};
use pr_review_light::error::AppError;
use pr_review_light::models::TrackerView;
use pr_review_light::services::credentials::{CredentialService, TokenOrigin};
use pr_review_light::services::notifier::TerminalNotifier;
use pr_review_light::services::{GitHubSnapshotSource, ReviewTracker, TokenSource, TrackerHandle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(
    name = "pr-review-light",
    version,
    about = "Tracks GitHub pull requests awaiting your review"
)]
struct Cli {
    /// Settings file (defaults to ~/.config/pr-review-light/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track review requests and show the light status
    Run {
        /// Poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Snooze duration in seconds
        #[arg(long)]
        snooze: Option<u64>,

        /// Do not ring the terminal bell on new review requests
        #[arg(long, default_value_t = false)]
        no_bell: bool,
    },
    /// Manage the stored GitHub token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Test the connection and print the authenticated user
    Whoami,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Save a personal access token to the keychain
    Set { token: String },
    /// Remove the stored token
    Clear,
    /// Show where the active token comes from
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Log to stderr; stdout belongs to the light and the listing
    let level = if cli.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_cli(cli: Cli) -> Result<(), AppError> {
    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            interval,
            snooze,
            no_bell,
        } => {
            let mut settings = settings;
            if let Some(secs) = interval {
                settings.tracker.poll_interval_secs = secs;
            }
            if let Some(secs) = snooze {
                settings.tracker.snooze_duration_secs = secs;
            }
            settings.validate()?;
            run_tracker(settings, !no_bell).await
        }
        Commands::Token { action } => run_token(action),
        Commands::Whoami => {
            let source = GitHubSnapshotSource::new(settings.github, TokenSource::Stored);
            let user = source.client()?.current_user().await?;
            println!("✅ Connected as {}", user.login);
            Ok(())
        }
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<AppSettings, AppError> {
    match path.cloned().or_else(config::default_settings_path) {
        Some(path) => config::load_settings(&path),
        None => Ok(AppSettings::default()),
    }
}

fn run_token(action: TokenAction) -> Result<(), AppError> {
    match action {
        TokenAction::Set { token } => {
            CredentialService::store_token(&token)?;
            println!("✅ Token saved");
        }
        TokenAction::Clear => {
            CredentialService::delete_token()?;
            println!("🗑️ Token cleared");
        }
        TokenAction::Status => match CredentialService::resolve_token()? {
            Some((_, TokenOrigin::Environment)) => println!("✅ Using token from GITHUB_TOKEN"),
            Some((_, TokenOrigin::Keychain)) => println!("✅ Using token from keychain"),
            None => println!("⚠️ No token configured"),
        },
    }
    Ok(())
}

async fn run_tracker(settings: AppSettings, bell: bool) -> Result<(), AppError> {
    let source = GitHubSnapshotSource::new(settings.github, TokenSource::Stored);
    let handle = ReviewTracker::start(
        Arc::new(source),
        Arc::new(TerminalNotifier { bell }),
        settings.tracker,
    );

    println!("PR Review Light - type `help` for commands");

    let mut views = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_light = String::new();

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let light = light_line(&views.borrow_and_update());
                if light != last_light {
                    println!("{}", light);
                    last_light = light;
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        handle.stop().await;
                        return Err(AppError::internal(format!("Failed to read stdin: {}", e)));
                    }
                };
                match handle_line(line.trim(), &handle).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("❌ {}", e),
                }
            }
        }
    }

    handle.stop().await;
    Ok(())
}

/// Execute one console command. Returns `false` to quit.
async fn handle_line(line: &str, handle: &TrackerHandle) -> Result<bool, AppError> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    let id = parts.next().map(parse_id).transpose()?;

    match (command, id) {
        ("", _) => {}
        ("check", _) => handle.trigger_poll_now().await?,
        ("list", _) => print_list(&handle.view()),
        ("status", _) => print_status(&handle.view()),
        ("snooze", Some(id)) => handle.snooze_item(id).await?,
        ("unsnooze", Some(id)) => handle.unsnooze_item(id).await?,
        ("open", Some(id)) => println!("{}", handle.open_item(id)?),
        ("quit" | "exit", _) => return Ok(false),
        _ => print_help(),
    }
    Ok(true)
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim_start_matches('#')
        .parse()
        .map_err(|_| AppError::not_found_with_id("review item", raw))
}

fn light_line(view: &TrackerView) -> String {
    let light = if view.attention.has_active { "🚨" } else { "✅" };
    let mut line = format!(
        "{} {} ({} active, {} snoozed)",
        light,
        view.attention.label(),
        view.attention.active_count,
        view.snoozed_count
    );
    if let Some(err) = &view.status.last_error {
        line.push_str(&format!(" ⚠️ last check failed: {}", err.kind()));
    }
    line
}

fn print_list(view: &TrackerView) {
    if view.items.is_empty() {
        println!("No pending reviews");
        return;
    }
    for entry in &view.items {
        println!("{:>12}  {}", entry.item.id, entry.item.display_line(entry.snoozed));
        if let Some(until) = entry.snoozed_until {
            let until = until.with_timezone(&chrono::Local);
            println!("{:>12}  snoozed until {}", "", until.format("%H:%M"));
        }
    }
}

fn print_status(view: &TrackerView) {
    let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string())
    };

    println!("phase:        {}", view.status.phase);
    println!("last check:   {}", fmt_time(view.status.last_poll_started));
    println!("last success: {}", fmt_time(view.status.last_success_at));
    println!(
        "polls:        {} ({} failed)",
        view.status.poll_count, view.status.failure_count
    );
    match &view.status.last_error {
        Some(err) => println!("last error:   [{}] {}", err.kind(), err),
        None => println!("last error:   none"),
    }
}

fn print_help() {
    println!("commands: check | list | status | snooze <id> | unsnooze <id> | open <id> | quit");
}
