//! `flagpole`: terminal console for a feature toggle's targeting.
//!
//! # Usage
//!
//! ```
//! flagpole --url http://localhost:4009 -p shop -e prod new_checkout
//! flagpole new_checkout --current-version 12
//! flagpole --config ~/.config/flagpole/flagpole.toml new_checkout
//! ```
//!
//! Project and environment fall back to the last ones opened.

mod app;
mod client;
mod editor;
mod ui;

use std::{
  io,
  path::{Path, PathBuf},
  sync::Mutex,
  time::Duration,
};

use anyhow::{Context as _, Result, bail};
use app::App;
use clap::Parser;
use client::{ApiClient, ApiConfig};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use flagpole_core::{
  context::{ContextStore, MemoryContextStore, restore_context},
  model::{ToggleRef, parse_version},
};
use flagpole_store_sqlite::SqliteContextStore;
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "flagpole", version, about = "Terminal console for feature toggle targeting")]
struct Args {
  /// Key of the toggle to open.
  toggle: String,

  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE", default_value = "flagpole.toml")]
  config: PathBuf,

  /// Base URL of the admin API.
  #[arg(long, env = "FLAGPOLE_URL")]
  url: Option<String>,

  /// Bearer token for the admin API.
  #[arg(long, env = "FLAGPOLE_TOKEN", hide_env_values = true)]
  token: Option<String>,

  /// Project key; defaults to the last project opened.
  #[arg(short, long, env = "FLAGPOLE_PROJECT")]
  project: Option<String>,

  /// Environment key; defaults to the last environment opened.
  #[arg(short, long, env = "FLAGPOLE_ENVIRONMENT")]
  environment: Option<String>,

  /// Open with this version selected in the history panel.
  #[arg(long, value_name = "N")]
  current_version: Option<String>,

  /// Where the last-opened project and environment are remembered.
  #[arg(long, env = "FLAGPOLE_STATE_PATH", value_name = "FILE")]
  state_path: Option<PathBuf>,

  /// Log file (the terminal belongs to the UI).
  #[arg(long, env = "FLAGPOLE_LOG_FILE", value_name = "FILE")]
  log_file: Option<PathBuf>,

  /// Do not read or write the remembered project and environment.
  #[arg(long)]
  ephemeral: bool,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional config file; every field can also come from a
/// `FLAGPOLE_*` environment variable.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
  url:         String,
  token:       Option<String>,
  project:     Option<String>,
  environment: Option<String>,
  state_path:  String,
  log_file:    String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      url:         "http://localhost:4009".to_string(),
      token:       None,
      project:     None,
      environment: None,
      state_path:  "~/.local/state/flagpole/context.db".to_string(),
      log_file:    "~/.local/state/flagpole/flagpole.log".to_string(),
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // CLI flags override the config file, which overrides defaults.
  let settings: Settings = config::Config::builder()
    .add_source(config::File::from(args.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("FLAGPOLE"))
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise config")?;

  let log_file = args
    .log_file
    .clone()
    .unwrap_or_else(|| expand_tilde(&settings.log_file));
  init_tracing(&log_file)?;

  let client = ApiClient::new(ApiConfig {
    base_url: args.url.clone().unwrap_or_else(|| settings.url.clone()),
    token:    args.token.clone().or_else(|| settings.token.clone()),
  })?;

  if args.ephemeral {
    launch(client, MemoryContextStore::new(), &args, &settings).await
  } else {
    let path = args
      .state_path
      .clone()
      .unwrap_or_else(|| expand_tilde(&settings.state_path));
    create_parent(&path)?;
    let store = SqliteContextStore::open(&path)
      .await
      .with_context(|| format!("failed to open state at {}", path.display()))?;
    launch(client, store, &args, &settings).await
  }
}

fn init_tracing(path: &Path) -> Result<()> {
  create_parent(path)?;
  let file = std::fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("failed to open log file {}", path.display()))?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_ansi(false)
    .with_writer(Mutex::new(file))
    .init();
  Ok(())
}

/// Resolve which toggle to open, then run the console until the user quits.
async fn launch<C: ContextStore + 'static>(
  client: ApiClient,
  store: C,
  args: &Args,
  settings: &Settings,
) -> Result<()> {
  let remembered = restore_context(&store)
    .await
    .context("failed to read the remembered project")?;
  let (remembered_project, remembered_environment) = remembered.unzip();

  let project = args
    .project
    .clone()
    .or_else(|| settings.project.clone())
    .or(remembered_project);
  let environment = args
    .environment
    .clone()
    .or_else(|| settings.environment.clone())
    .or(remembered_environment);
  let (Some(project), Some(environment)) = (project, environment) else {
    bail!("no project/environment given and none remembered; pass --project and --environment");
  };

  let deep_link = match args.current_version.as_deref() {
    Some(raw) => {
      let version = parse_version(raw);
      if version.is_none() {
        tracing::warn!(raw, "ignoring --current-version that is not a version number");
      }
      version
    }
    None => None,
  };

  let toggle = ToggleRef::new(project, environment, args.toggle.clone());
  let mut app = App::new(client, store);

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  app.open(toggle, deep_link).await;

  // Run the event loop; restore terminal even on error.
  let run_result = run_event_loop(&mut terminal, &mut app).await;

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop<C: ContextStore + 'static>(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App<ApiClient, C>,
) -> Result<()> {
  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event {
      if !app.handle_key(key).await? {
        break;
      }
    }

    // Fold in whatever the spawned service calls produced meanwhile.
    app.pump().await;
  }

  Ok(())
}

// ─── Paths ────────────────────────────────────────────────────────────────────

fn expand_tilde(path: &str) -> PathBuf {
  match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
    (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => PathBuf::from(path),
  }
}

fn create_parent(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  Ok(())
}
