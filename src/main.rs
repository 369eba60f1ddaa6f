use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use classifieds::app::App;
use classifieds::config::{Config, LogConfig};
use classifieds::listings::SortOption;

#[derive(Parser, Debug)]
#[command(name = "classifieds")]
#[command(about = "Browse classified ads with an offline-friendly cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/classifieds/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Ignore cached data and fetch from the network
  #[arg(short, long)]
  refresh: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List categories
  Categories,
  /// List classified ads with their category names
  Listings {
    /// Only show ads in this category id (-1 for all)
    #[arg(long)]
    category: Option<i64>,

    /// date-asc, date-desc, price-asc, price-desc or urgent
    #[arg(long, default_value_t = SortOption::UrgentFirst)]
    sort: SortOption,
  },
  /// Fetch both endpoints and report the result
  Check,
  /// Remove every cached response
  ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _guard = init_logging(&config.log);

  let app = Arc::new(App::new(&config)?);

  let canceller = app.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("Interrupted, cancelling requests");
      canceller.cancel_all();
    }
  });

  let mut stdout = std::io::stdout().lock();
  match args.command {
    Command::Categories => app.categories(args.refresh, &mut stdout).await?,
    Command::Listings { category, sort } => {
      app
        .listings(category, sort, args.refresh, &mut stdout)
        .await?
    }
    Command::Check => {
      if !app.check(&mut stdout).await? {
        return Err(eyre!("API check failed"));
      }
    }
    Command::ClearCache => app.clear_cache()?,
  }

  Ok(())
}

/// Log to `classifieds.log` in the log directory, or to stderr when no
/// directory is usable. The returned guard flushes the file writer on drop.
fn init_logging(config: &LogConfig) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&config.level))
    .unwrap_or_else(|_| EnvFilter::new("info"));

  let directory = config
    .resolved_directory()
    .filter(|dir| std::fs::create_dir_all(dir).is_ok());

  match directory {
    Some(dir) => {
      let appender = tracing_appender::rolling::never(dir, "classifieds.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::registry()
        .with(filter)
        .with(
          tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false),
        )
        .init();
      Some(guard)
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
      None
    }
  }
}
