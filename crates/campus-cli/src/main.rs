//! `campus` — console front end for the campus session store.
//!
//! # Usage
//!
//! ```text
//! campus --config campus.toml
//! campus --immediate --federated-role teacher
//! ```

mod app;
mod command;
mod settings;
mod view;

use std::{
  io::{self, Write as _},
  path::PathBuf,
  sync::Arc,
};

use anyhow::{Context as _, Result};
use app::App;
use campus_core::{SessionStore, config::Latency, identity::Role};
use clap::Parser;
use settings::Settings;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "campus", version, about = "Role-based campus console over an in-memory store")]
struct Args {
  /// Path to a TOML config file. Missing files are ignored.
  #[arg(short, long, value_name = "FILE", default_value = "campus.toml")]
  config: PathBuf,

  /// Skip the simulated network latency.
  #[arg(long)]
  immediate: bool,

  /// Role given to the federated account on first sign-in.
  #[arg(long, default_value = "student", env = "CAMPUS_FEDERATED_ROLE")]
  federated_role: Role,

  /// Start with an empty directory instead of the configured seed accounts.
  #[arg(long)]
  no_seed: bool,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  // Logs go to stderr so they do not interleave with console output.
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let mut settings = Settings::load(&args.config)?;
  if args.immediate {
    settings.store.latency = Latency::zero();
  }
  if args.no_seed {
    settings.seed.clear();
  }

  let directory = settings.seeded_directory().await;
  let store = SessionStore::open(directory, settings.store.clone())
    .await
    .context("opening session store")?;
  let mut app = App::new(Arc::new(store), args.federated_role).await;

  tracing::info!(seeded = settings.seed.len(), "console ready");
  println!("campus console; type `help` for commands");

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    print!("{}", app.prompt());
    io::stdout().flush().context("flushing stdout")?;

    let Some(line) = lines.next_line().await.context("reading stdin")? else {
      break;
    };
    let reply = app.handle_line(&line).await;
    for out in &reply.lines {
      println!("{out}");
    }
    if reply.quit {
      break;
    }
  }

  Ok(())
}
