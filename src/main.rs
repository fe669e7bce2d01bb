use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use credir::{
    hash_password, init_logging, parse_snapshot, BackendOptions, DirectoryBackend, NotifyWatcher,
    Settings, Snapshot,
};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "credir", version, about = "Hot-reloading identity directory")]
struct Cli {
    /// Settings file (defaults to ./credir.toml when present).
    #[arg(short, long, global = true, env = "CREDIR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the credential file, watch it and serve until Ctrl-C.
    Serve {
        /// Overrides `database.path`.
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
    /// Parse a credential file and print the assigned identifiers.
    Check {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print an Argon2id digest for a password.
    Hash { password: String },
}

#[derive(Serialize)]
struct Report<'a> {
    users: Vec<credir::PosixAccount>,
    groups: Vec<&'a credir::Group>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { database } => serve(cli.config, database).await,
        Command::Check { file, json } => check(&file, json),
        Command::Hash { password } => {
            let digest = hash_password(&password).context("Failed to hash password")?;
            println!("{digest}");
            Ok(())
        }
    }
}

async fn serve(
    config: Option<PathBuf>,
    database: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut settings = Settings::load(config.as_deref()).context("Failed to load settings")?;
    if let Some(path) = database {
        settings.database.path = path;
    }
    settings.validate().context("Invalid settings")?;

    let logging = init_logging(settings.logging.clone()).context("Failed to initialize logging")?;

    let backend = DirectoryBackend::start(
        BackendOptions::from_config(&settings.database),
        Box::new(NotifyWatcher::new()),
    )?;
    let snapshot = backend.snapshot();
    info!(
        users = snapshot.user_count(),
        groups = snapshot.group_count(),
        "Serving credential directory"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received shutdown signal");

    if let Err(e) = backend.shutdown() {
        error!(error = %e, "Failed to release file watch");
    }
    backend.wait_for_shutdown().await;
    info!(stats = ?backend.stats(), "Directory backend stopped");

    logging.shutdown();
    Ok(())
}

fn check(
    file: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let snapshot = parse_snapshot(&bytes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report(&snapshot))?);
    } else {
        print_table(&snapshot);
    }
    Ok(())
}

fn report(snapshot: &Snapshot) -> Report<'_> {
    let mut users: Vec<_> = snapshot.users().map(|u| u.to_account()).collect();
    users.sort_by_key(|u| u.uid_number);
    let mut groups: Vec<_> = snapshot.groups().map(|g| g.as_ref()).collect();
    groups.sort_by_key(|g| g.gid_number);
    Report { users, groups }
}

fn print_table(snapshot: &Snapshot) {
    let report = report(snapshot);
    println!("{} users, {} groups", report.users.len(), report.groups.len());
    for group in &report.groups {
        println!("group {:>6}  {}", group.gid_number, group.name);
    }
    for user in &report.users {
        let disabled = if user.disabled { "  (disabled)" } else { "" };
        println!(
            "user  {:>6}  {}  gid={} groups={:?}{disabled}",
            user.uid_number, user.name, user.primary_group, user.other_groups
        );
    }
}
