#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::Parser;
use herald::Herald;

/// Send an email over SMTP, retrying while the server is temporarily
/// unavailable
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Send an email over SMTP", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compose and log the email without sending it
    #[arg(long)]
    dry_run: bool,

    /// Override the maximum number of delivery attempts
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = find_config_file(cli.config)?;
    let mut herald = Herald::load(&config_path)?;

    if cli.dry_run {
        herald.dry_run = true;
    }
    if let Some(max_attempts) = cli.max_attempts {
        herald.retry.max_attempts = max_attempts;
    }

    let sent = herald.run().await?;
    println!("{}", sent.id);

    Ok(())
}

/// Find the configuration file using the following precedence:
/// 1. `--config`
/// 2. `HERALD_CONFIG` environment variable
/// 3. ./herald.config.ron (current working directory)
/// 4. /etc/herald/herald.config.ron (system-wide config)
fn find_config_file(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = flag {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("--config points to non-existent file: {}", path.display());
    }

    if let Ok(env_path) = std::env::var("HERALD_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "HERALD_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./herald.config.ron"),
        PathBuf::from("/etc/herald/herald.config.ron"),
    ];

    if let Some(path) = default_paths.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - --config\n  - HERALD_CONFIG environment variable\n{paths_tried}"
    )
}
