//! bulkup - upload many files into one server folder from the terminal

mod app;
mod config;
mod input;
mod notify;
mod theme;
mod ui;
mod upload;

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use app::App;
use config::Config;
use notify::ToastQueue;
use upload::transfer::select_strategy;
use upload::{
    FileCandidate, HttpUploadService, SelectionRegistry, SessionController, TransportKind,
    WorkflowState,
};

/// Time given to the cancel notification before the runtime shuts down
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "bulkup", about = "Upload files into a server folder", version)]
struct Args {
    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base URL of the upload endpoints
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Server folder to upload into
    #[arg(long, value_name = "FOLDER")]
    target: Option<String>,

    /// Transport: auto, form or binary
    #[arg(long, value_name = "KIND")]
    transport: Option<String>,

    /// Skip files larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_file_size: Option<u64>,

    /// Name for data read from stdin when "-" is given as a path
    #[arg(long, value_name = "NAME", default_value = "stdin")]
    stdin_name: String,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    save_config: bool,

    /// Files or folders to start with, "-" reads stdin
    paths: Vec<PathBuf>,
}

fn main() -> Result<()> {
    // Logging to stderr when RUST_LOG is set
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

/// CLI flags win over the config file
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(ref server) = args.server {
        config.server.base_url = server.clone();
    }
    if let Some(ref target) = args.target {
        config.server.target_folder = target.clone();
    }
    if let Some(ref transport) = args.transport {
        config.upload.transport = TransportKind::from_name(transport);
    }
    if args.max_file_size.is_some() {
        config.upload.max_file_size = args.max_file_size;
    }
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => Config::load_from(Some(path.clone())),
        None => Config::load(),
    };
    apply_overrides(&mut config, &args);

    if args.save_config {
        match args.config {
            Some(ref path) => config.save_to(path)?,
            None => config.save()?,
        }
        println!("Configuration saved");
        return Ok(());
    }
    tracing::info!(
        "Uploading to {} folder {}",
        config.server.base_url,
        config.server.target_folder
    );

    let toasts = Arc::new(ToastQueue::new());
    let service = HttpUploadService::new(&config.server.base_url, config.server.timeout())
        .context("Failed to build HTTP client")?;

    let (stdin_paths, paths): (Vec<PathBuf>, Vec<PathBuf>) =
        args.paths.iter().cloned().partition(|p| p.as_os_str() == std::ffi::OsStr::new("-"));
    let mut candidates =
        app::collect_candidates(&paths, config.upload.follow_symlinks, toasts.as_ref());
    if !stdin_paths.is_empty() {
        candidates.push(read_stdin(&args.stdin_name)?);
    }
    let limit = config.upload.max_file_size;
    let known_bytes: u64 = candidates
        .iter()
        .filter(|c| limit.map_or(true, |limit| c.size <= limit))
        .map(|c| c.size)
        .sum();

    let strategy = select_strategy(
        config.upload.transport,
        known_bytes,
        config.upload.max_in_memory_bytes,
        service.client().clone(),
        service.upload_url(),
    );

    let mut session = SessionController::new(
        SelectionRegistry::new(limit),
        Arc::new(service),
        strategy,
        toasts.clone(),
        config.session_settings(),
    );
    session.add_files(candidates);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session, toasts)
        .with_theme_name(&config.preferences.theme)
        .with_key_preset_name(&config.preferences.key_preset)
        .with_follow_symlinks(config.upload.follow_symlinks);
    let result = run(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if *app.session.state() == WorkflowState::Canceled {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }

    Ok(())
}

fn read_stdin(name: &str) -> Result<FileCandidate> {
    let mut data = Vec::new();
    io::stdin()
        .read_to_end(&mut data)
        .context("Failed to read stdin")?;
    tracing::info!("Read {} bytes from stdin as {}", data.len(), name);
    Ok(FileCandidate::from_bytes(name, data))
}

async fn run<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        if app.should_quit {
            return Ok(());
        }

        terminal.draw(|frame| ui::draw(frame, app))?;

        // Poll events (100ms timeout so session events get drawn)
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                app.handle_key(key);
            }
        }
    }
}
