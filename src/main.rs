use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jsonapi_cache::config::Config;
use jsonapi_cache::{HttpTransport, QueryOptions, QueryParams, Store};

#[derive(Parser, Debug)]
#[command(name = "jac")]
#[command(about = "Read a JSON:API backend through a normalized cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jac/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log filter such as `debug` or `jsonapi_cache=trace` (overrides RUST_LOG)
  #[arg(long)]
  log_level: Option<String>,

  /// Print the whole cache state after the command
  #[arg(long)]
  snapshot: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch one resource by id
  Find { kind: String, id: String },
  /// Fetch every resource of a type
  FindAll { kind: String },
  /// Fetch a filtered collection, e.g. `query people 'filter[name]=Joe&page=2'`
  Query {
    kind: String,
    query: String,
    /// Endpoint to query instead of the type's read endpoint
    #[arg(long)]
    endpoint: Option<String>,
  },
}

/// Log to a daily file under the data directory.
fn init_logging(level: Option<&str>) -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("jac")
    .join("logs");
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let filter = match level {
    Some(level) => EnvFilter::try_new(level)?,
    None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
  };
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "jac.log"));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .init();

  Ok(guard)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging(args.log_level.as_deref())?;

  let config = Config::load(args.config.as_deref())?;
  let store = Store::builder()
    .registry(config.registry())
    .options(config.cache.options()?)
    .transport(HttpTransport::new()?)
    .api_config(config.api_config())
    .build();

  info!(command = ?args.command, "starting");

  match args.command {
    Command::Find { kind, id } => match store.find(&kind, &id)?.await? {
      Some(resource) => print_json(&resource)?,
      None => return Err(eyre!("{} {} not found", kind, id)),
    },
    Command::FindAll { kind } => {
      let resources = store.find_all(&kind)?.await?;
      print_json(&resources)?;
    }
    Command::Query {
      kind,
      query,
      endpoint,
    } => {
      let options = QueryOptions {
        endpoint,
        ..QueryOptions::default()
      };
      let result = store.query(&kind, QueryParams::from(query), options)?.await?;
      print_json(&result.records)?;
    }
  }

  if args.snapshot {
    print_json(&*store.state())?;
  }

  Ok(())
}
