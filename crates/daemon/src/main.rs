//! FileHub daemon and CLI
//!
//! `filehub serve` runs the daemon; every other subcommand is a client that
//! talks to it over the local socket.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use filehub::config::Config;
use filehub::ipc::{IpcClient, IpcServer};
use filehub::namespace::Namespace;
use filehub::protocol::messages::{ClearReport, ListResponse};
use filehub::MessageRouter;
use tracing_subscriber::EnvFilter;

/// Timeout for client connections and requests.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Clearing a large root can take a while.
const CLEAR_TIMEOUT: Duration = Duration::from_secs(120);

/// FileHub - a sandboxed file namespace served over a local socket.
#[derive(Parser, Debug)]
#[command(name = "filehub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the daemon until SIGINT or SIGTERM
    Serve,

    /// List a directory
    Ls {
        /// Directory relative to the root
        #[arg(default_value = "")]
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Create a directory
    Mkdir {
        /// Parent directory
        path: String,
        /// Name of the new directory
        name: String,
    },

    /// Write a text file
    Write {
        /// Parent directory
        path: String,
        /// File name (the text suffix is added if missing)
        filename: String,

        /// File contents
        #[arg(long, default_value = "")]
        content: String,

        /// Fail instead of replacing an existing file
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Print a text file
    Cat {
        /// File relative to the root
        path: String,
    },

    /// Delete a file or directory tree
    Rm {
        /// Parent directory
        path: String,
        /// Name of the entry to delete
        name: String,
    },

    /// Rename an entry within its directory
    Rename {
        /// Parent directory
        path: String,
        /// Current name
        old_name: String,
        /// New name
        new_name: String,
    },

    /// Move an entry, creating missing parent directories
    Mv {
        /// Entry to move
        source: String,
        /// Destination path
        target: String,
    },

    /// Delete everything under the root
    Clear {
        /// Confirm the deletion
        #[arg(long, short)]
        yes: bool,
    },

    /// Check whether the daemon is responsive
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };
    config.apply_env_overrides();

    // RUST_LOG wins over --verbose and the config file
    let level = if cli.verbose {
        "debug"
    } else {
        config.daemon.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;

    match cli.command {
        Commands::Serve => serve(config).await,
        command => {
            if let Err(e) = run_client(&config, command).await {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Open the namespace and serve it until a shutdown signal arrives.
async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("FileHub daemon starting...");

    let socket_path = config.socket_path();
    if let Ok(mut client) = IpcClient::connect_with_timeout(&socket_path, CLIENT_TIMEOUT).await {
        if client.ping().await.unwrap_or(false) {
            anyhow::bail!(
                "Daemon already running on {}",
                socket_path.display()
            );
        }
    }

    let namespace = Namespace::from_config(&config).with_context(|| {
        format!(
            "Failed to open storage root: {}",
            config.storage.root.display()
        )
    })?;
    let router = MessageRouter::new(Arc::new(namespace));

    let server = IpcServer::bind(&socket_path)
        .await
        .with_context(|| format!("Failed to bind socket: {}", socket_path.display()))?;

    let shutdown = shutdown_signal()?;
    server.serve(router, shutdown).await?;

    tracing::info!("FileHub daemon stopped");
    Ok(())
}

/// Resolve when SIGTERM or SIGINT is received.
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
            }
        }
    })
}

/// Execute a client subcommand against the running daemon.
async fn run_client(config: &Config, command: Commands) -> anyhow::Result<()> {
    if let Commands::Clear { yes: false } = command {
        anyhow::bail!("Refusing to delete everything under the root without --yes");
    }

    let socket_path = config.socket_path();
    let mut client = IpcClient::connect_with_timeout(&socket_path, CLIENT_TIMEOUT)
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "Daemon is not running (cannot connect to {})",
                socket_path.display()
            )
        })?;

    match command {
        Commands::Serve => anyhow::bail!("serve is not a client command"),
        Commands::Ls { path, json } => {
            let listing = client.list(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print_listing(&listing);
            }
        }
        Commands::Mkdir { path, name } => {
            let result = client.create_directory(&path, &name).await?;
            println!("{}", result.message);
        }
        Commands::Write {
            path,
            filename,
            content,
            no_overwrite,
        } => {
            let overwrite = if no_overwrite { Some(false) } else { None };
            let result = client
                .create_text_file(&path, &filename, &content, overwrite)
                .await?;
            match result.created_path {
                Some(created) => println!("{}: /{}", result.message, created),
                None => println!("{}", result.message),
            }
        }
        Commands::Cat { path } => {
            let text = client.read_text_file(&path).await?;
            print!("{}", text.content);
        }
        Commands::Rm { path, name } => {
            let result = client.delete(&path, &name).await?;
            println!("{}", result.message);
        }
        Commands::Rename {
            path,
            old_name,
            new_name,
        } => {
            let result = client.rename(&path, &old_name, &new_name).await?;
            println!("{}", result.message);
        }
        Commands::Mv { source, target } => {
            let result = client.move_entry(&source, &target).await?;
            println!("{}", result.message);
        }
        Commands::Clear { .. } => {
            client.set_timeout(CLEAR_TIMEOUT);
            let report = client.clear_all().await?;
            print_clear_report(&report);
        }
        Commands::Ping => {
            if client.ping().await? {
                println!("Daemon is running");
            } else {
                anyhow::bail!("Daemon did not answer the ping");
            }
        }
    }

    Ok(())
}

/// Print a listing as a simple table.
fn print_listing(listing: &ListResponse) {
    if listing.entries.is_empty() {
        println!("/{} is empty.", listing.path);
        return;
    }

    for entry in &listing.entries {
        let kind = if entry.is_directory { "d" } else { "-" };
        let name = if entry.is_directory {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };
        println!("{} {:>12} {}", kind, format_size(entry.size), name);
    }
}

fn print_clear_report(report: &ClearReport) {
    println!("Removed {} entries", report.removed.len());
    for failure in &report.failed {
        eprintln!("  failed: {}: {}", failure.name, failure.message);
    }
}

/// Format a byte count in human-readable form.
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_short_flag_is_not_shadowed_by_write() {
        let cli = Cli::try_parse_from([
            "filehub", "write", "docs", "notes", "-c", "/etc/fh.toml", "--content", "hi",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/fh.toml")));
        match cli.command {
            Commands::Write { content, .. } => assert_eq!(content, "hi"),
            _ => panic!("Expected Write command"),
        }
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from(["filehub", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve));
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli =
            Cli::try_parse_from(["filehub", "ls", "--verbose", "--config", "/etc/fh.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/fh.toml")));
    }

    #[test]
    fn test_ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["filehub", "ls"]).unwrap();
        match cli.command {
            Commands::Ls { path, json } => {
                assert_eq!(path, "");
                assert!(!json);
            }
            _ => panic!("Expected Ls command"),
        }
    }

    #[test]
    fn test_ls_json() {
        let cli = Cli::try_parse_from(["filehub", "ls", "docs", "--json"]).unwrap();
        match cli.command {
            Commands::Ls { path, json } => {
                assert_eq!(path, "docs");
                assert!(json);
            }
            _ => panic!("Expected Ls command"),
        }
    }

    #[test]
    fn test_write_command() {
        let cli = Cli::try_parse_from([
            "filehub",
            "write",
            "docs",
            "notes",
            "--content",
            "hello",
            "--no-overwrite",
        ])
        .unwrap();
        match cli.command {
            Commands::Write {
                path,
                filename,
                content,
                no_overwrite,
            } => {
                assert_eq!(path, "docs");
                assert_eq!(filename, "notes");
                assert_eq!(content, "hello");
                assert!(no_overwrite);
            }
            _ => panic!("Expected Write command"),
        }
    }

    #[test]
    fn test_rename_command() {
        let cli = Cli::try_parse_from(["filehub", "rename", "docs", "a.txt", "b.txt"]).unwrap();
        match cli.command {
            Commands::Rename {
                path,
                old_name,
                new_name,
            } => {
                assert_eq!(path, "docs");
                assert_eq!(old_name, "a.txt");
                assert_eq!(new_name, "b.txt");
            }
            _ => panic!("Expected Rename command"),
        }
    }

    #[test]
    fn test_mv_requires_both_paths() {
        assert!(Cli::try_parse_from(["filehub", "mv", "only-one"]).is_err());
        let cli = Cli::try_parse_from(["filehub", "mv", "a", "b/c"]).unwrap();
        assert!(matches!(cli.command, Commands::Mv { .. }));
    }

    #[test]
    fn test_clear_flag() {
        let cli = Cli::try_parse_from(["filehub", "clear"]).unwrap();
        assert!(matches!(cli.command, Commands::Clear { yes: false }));

        let cli = Cli::try_parse_from(["filehub", "clear", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::Clear { yes: true }));
    }

    #[tokio::test]
    async fn test_clear_without_yes_is_refused() {
        let config = Config::default();
        let err = run_client(&config, Commands::Clear { yes: false })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }
}
