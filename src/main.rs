//! cachefs daemon - caching filesystem service
//!
//! Serves cached file reads and glob expansion over a Unix socket and drops
//! the caches on SIGHUP, on a timer, or on request.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cachefs::ipc::IpcServer;
use cachefs::stemcell::all_distros;
use cachefs::trigger::{spawn_interval_trigger, spawn_signal_trigger, Reloader};
use cachefs::{CachingFileSystem, Config, FileSystem, OsFileSystem};

/// CLI command
#[derive(Debug)]
enum Command {
    /// Run the daemon (default)
    Serve { config_path: Option<PathBuf> },
    /// Read a file once through the cache (CLI mode)
    Read { path: PathBuf },
    /// Expand a glob once through the cache (CLI mode)
    Glob { pattern: String },
    /// Print the stemcell distro table
    Distros,
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"cachefs daemon - Cache file reads and glob expansion

USAGE:
    cachefs-daemon [serve] [config]      # Run the daemon (default)
    cachefs-daemon read <path>
    cachefs-daemon glob <pattern>
    cachefs-daemon distros
    cachefs-daemon help

COMMANDS:
    serve    Run the daemon; config defaults to <config dir>/cachefs/config.json
    read     Read a file through the caching layer and print it
    glob     Expand a glob through the caching layer and print the matches
    distros  List known stemcell distros and their infrastructures
    help     Show this help message

SIGNALS:
    SIGHUP   Drop all cached reads and globs

ENVIRONMENT:
    RUST_LOG         Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Serve { config_path: None });
    }

    match args[1].as_str() {
        "serve" => Ok(Command::Serve {
            config_path: args.get(2).map(PathBuf::from),
        }),
        "read" => {
            let path = args
                .get(2)
                .ok_or_else(|| anyhow!("Usage: cachefs-daemon read <path>"))?;
            Ok(Command::Read {
                path: PathBuf::from(path),
            })
        }
        "glob" => {
            let pattern = args
                .get(2)
                .ok_or_else(|| anyhow!("Usage: cachefs-daemon glob <pattern>"))?;
            Ok(Command::Glob {
                pattern: pattern.clone(),
            })
        }
        "distros" => Ok(Command::Distros),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other if !other.starts_with('-') && args.len() == 2 => Ok(Command::Serve {
            config_path: Some(PathBuf::from(other)),
        }),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

fn init_logging(config_level: Option<Level>) -> Result<()> {
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(config_level)
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Load the config, falling back to defaults only when no path was given
/// and the default file does not exist
fn load_config(fs: &dyn FileSystem, config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::from_path(&path, fs),
        None => {
            let path = Config::default_path();
            if fs.file_exists(&path) {
                Config::from_path(&path, fs)
            } else {
                Ok(Config::default())
            }
        }
    }
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let fs = Arc::new(CachingFileSystem::new(OsFileSystem::new()));

    let config = {
        let fs = Arc::clone(&fs);
        tokio::task::spawn_blocking(move || load_config(&*fs, config_path)).await??
    };
    init_logging(config.log_level())?;

    info!("Starting cachefs daemon");

    if let Some(temp_root) = config.temp_root.clone() {
        let fs = Arc::clone(&fs);
        tokio::task::spawn_blocking(move || {
            fs.change_temp_root(&temp_root)
                .with_context(|| format!("Changing temp root to {}", temp_root.display()))
        })
        .await??;
    }

    let reloader = Arc::new(Reloader::new(Arc::clone(&fs), config.watch_globs.clone()));
    reloader.warm_async().await;

    let _signal_task = spawn_signal_trigger(Arc::clone(&reloader))?;
    let _timer_task = config
        .drop_cache_interval()
        .map(|period| spawn_interval_trigger(Arc::clone(&reloader), period));

    if config.act_as_worker {
        info!("Acting as worker; IPC server disabled");

        tokio::signal::ctrl_c().await?;
        info!("Shutdown complete.");
        return Ok(());
    }

    // Create and start IPC server
    let mut ipc_server = IpcServer::new(Arc::clone(&reloader), config.socket_path.clone());
    if let Err(e) = ipc_server.start().await {
        error!(error = %e, "Failed to start IPC server");
        return Err(e);
    }
    let ipc_server = Arc::new(ipc_server);

    info!("Daemon ready. Waiting for commands...");

    // Run IPC server in a separate task
    let ipc_handle = {
        let ipc_server = Arc::clone(&ipc_server);
        tokio::spawn(async move {
            if let Err(e) = ipc_server.run().await {
                error!(error = %e, "IPC server error");
            }
        })
    };

    // Wait for Ctrl+C
    tokio::signal::ctrl_c().await?;

    info!("Received shutdown signal, stopping...");
    ipc_handle.abort();
    ipc_server.stop().await?;
    fs.log_metrics();

    info!("Shutdown complete.");
    Ok(())
}

fn read_once(path: &Path) -> Result<()> {
    let fs = CachingFileSystem::new(OsFileSystem::new());
    let content = fs
        .read_file(path)
        .with_context(|| format!("Reading {}", path.display()))?;

    std::io::stdout().write_all(&content)?;
    Ok(())
}

fn glob_once(pattern: &str) -> Result<()> {
    let fs = CachingFileSystem::new(OsFileSystem::new());
    let matches = fs
        .glob(pattern)
        .with_context(|| format!("Expanding {}", pattern))?;

    for path in matches {
        println!("{}", path.display());
    }
    Ok(())
}

fn print_distros() {
    for distro in all_distros() {
        let infrastructures: Vec<&str> = distro
            .supported_infrastructures
            .iter()
            .map(|i| i.name)
            .collect();
        println!(
            "  {} ({}) -> {}",
            distro.name,
            distro.name_name,
            infrastructures.join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command
    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    match command {
        Command::Serve { config_path } => serve(config_path).await?,
        Command::Read { path } => {
            init_logging(None)?;
            read_once(&path)?;
        }
        Command::Glob { pattern } => {
            init_logging(None)?;
            glob_once(&pattern)?;
        }
        Command::Distros => print_distros(),
        Command::Help => print_help(),
    }

    Ok(())
}
