//! Flint - a terminal markdown viewer with cached diagram rendering.
//!
//! # Usage
//!
//! ```bash
//! flint README.md
//! flint --watch README.md
//! flint --style plain --no-images README.md
//! flint --clear-cache
//! ```

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flint::app::App;
use flint::cache::CacheStore;
use flint::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use flint::render::{
    CoordinatorOptions, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, ImageRenderer, MermaidInkRenderer,
    RenderCoordinator, Renderers,
};
use flint::session::{SessionController, SessionOptions};
use flint::ui::Style;

/// A terminal markdown viewer with cached diagram and image rendering
#[derive(Parser, Debug)]
#[command(name = "flint", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Markdown file to view
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Watch file for changes and auto-reload
    #[arg(short, long)]
    watch: bool,

    /// Do not load images (show placeholders only)
    #[arg(long)]
    no_images: bool,

    /// Do not render mermaid diagrams
    #[arg(long)]
    no_diagrams: bool,

    /// Presentation style
    #[arg(long, value_enum)]
    style: Option<Style>,

    /// Number of render worker threads
    #[arg(long, value_name = "N")]
    render_workers: Option<usize>,

    /// Per-request network timeout for renders
    #[arg(long, value_name = "SECS")]
    render_timeout: Option<u64>,

    /// Base URL of the mermaid.ink compatible service
    #[arg(long, value_name = "URL")]
    mermaid_endpoint: Option<String>,

    /// Directory holding rendered artifacts
    #[arg(long, value_name = "PATH")]
    cache_dir: Option<PathBuf>,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,

    /// Remove every cached artifact and exit
    #[arg(long)]
    clear_cache: bool,
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

fn build_session(flags: &ConfigFlags, cache: CacheStore) -> Result<SessionController> {
    let timeout = flags.render_timeout().unwrap_or(DEFAULT_TIMEOUT);
    let endpoint = flags.mermaid_endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
    let renderers = Renderers {
        diagram: Arc::new(
            MermaidInkRenderer::new(endpoint, timeout)
                .context("Failed to create diagram renderer")?,
        ),
        image: Arc::new(ImageRenderer::new(timeout).context("Failed to create image renderer")?),
    };
    let defaults = CoordinatorOptions::default();
    let options = CoordinatorOptions {
        workers: flags.render_workers.unwrap_or(defaults.workers),
        ..defaults
    };
    let coordinator = RenderCoordinator::new(cache, renderers, options)
        .context("Failed to start render workers")?;
    let session_options = SessionOptions {
        render_images: !flags.no_images,
        render_diagrams: !flags.no_diagrams,
        ..SessionOptions::default()
    };
    Ok(SessionController::new(coordinator, session_options))
}

fn main() -> Result<()> {
    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    init_logging(effective.log_file.as_deref())?;

    let cache_root = effective
        .cache_dir
        .clone()
        .unwrap_or_else(CacheStore::default_root);
    let cache = CacheStore::open(&cache_root)
        .with_context(|| format!("Failed to open cache {}", cache_root.display()))?;

    if cli.clear_cache {
        let removed = cache.clear().context("Failed to clear cache")?;
        println!(
            "Removed {removed} cached artifact(s) from {}",
            cache_root.display()
        );
        return Ok(());
    }

    let Some(file) = cli.file else {
        if cli.save || cli.clear {
            return Ok(());
        }
        anyhow::bail!("No file given (see flint --help)");
    };
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let session = build_session(&effective, cache)?;
    let app = App::new(session)
        .with_file(file)
        .with_watch(effective.watch)
        .with_style(effective.style.unwrap_or_default())
        .with_config_paths(
            Some(global_path.clone()),
            if local_path.exists() {
                Some(local_path.clone())
            } else {
                None
            },
        );

    app.run().context("Application error")
}
