mod commands;
mod config;
mod inbox;
mod logging;
mod sync;
mod transport;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::inbox::FetchQuery;
use crate::sync::{PollMode, SyncEngine};
use crate::transport::HttpTransport;

#[derive(Parser, Debug)]
#[command(name = "inbox-sync")]
#[command(about = "Keep a local copy of your notification inbox in sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/inbox-sync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List notifications grouped by age
  List {
    /// Only unread notifications
    #[arg(short, long)]
    unread: bool,
    /// Page number, starting at 1
    #[arg(short, long)]
    page: Option<u32>,
  },
  /// Mark notifications as read
  Read {
    #[arg(required = true)]
    ids: Vec<u64>,
  },
  /// Mark notifications as unread
  Unread {
    #[arg(required = true)]
    ids: Vec<u64>,
  },
  /// Mark every notification as read
  ReadAll,
  /// Print the unread count
  Count,
  /// Poll and print the unread count whenever it changes
  Watch {
    /// Seconds between polls (default: polling.interval_secs from config)
    #[arg(short, long)]
    interval: Option<u64>,
    /// Re-fetch the listing on each tick instead of only the counter
    #[arg(long)]
    full: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;
  debug!(base_url = %config.api.base_url, "configuration loaded");

  let transport = HttpTransport::new(&config)?;
  let engine = SyncEngine::new(Arc::new(transport));

  match args.command {
    Command::List { unread, page } => {
      let query = FetchQuery {
        unread_only: unread.then_some(true),
        page,
      };
      commands::list(&engine, query).await?;
    }
    Command::Read { ids } => commands::set_read(&engine, &ids, true).await?,
    Command::Unread { ids } => commands::set_read(&engine, &ids, false).await?,
    Command::ReadAll => commands::read_all(&engine).await?,
    Command::Count => commands::count(&engine).await?,
    Command::Watch { interval, full } => {
      let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.polling.interval());
      let mode = if full {
        PollMode::Full
      } else {
        config.polling.mode
      };
      commands::watch(&engine, interval, mode).await?;
    }
  }

  Ok(())
}
