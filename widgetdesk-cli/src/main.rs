// widgetdesk-cli/src/main.rs
//! widgetdesk - desktop widget overlay for the terminal

mod app;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, layout::Rect};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use widgetdesk_core::{ConfigFile, EventBus, SUPPORTED_LANGUAGES, Settings};

use crate::app::{App, build_manager};

const DEFAULT_LOG_FILTER: &str = "widgetdesk=info";
const LOG_FILE: &str = "app.log";

#[derive(Parser)]
#[command(name = "widgetdesk")]
#[command(author, version, about = "Desktop widget overlay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./widgetdesk.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive overlay (default)
    Run,
    /// List available widgets
    List,
    /// Enable a widget on the overlay
    Enable {
        /// Widget name
        name: String,
    },
    /// Disable a widget
    Disable {
        /// Widget name
        name: String,
    },
    /// Provision a widget's environment and install its dependencies
    Install {
        /// Widget name
        name: String,
    },
    /// Show a widget's environment
    Env {
        /// Widget name
        name: String,
    },
    /// Set the UI language
    Language {
        /// Language code (en, nl)
        code: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    let (config, config_error) = match &cli.config {
        Some(path) => (
            ConfigFile::load_from(path)
                .with_context(|| format!("cannot load config {}", path.display()))?,
            None,
        ),
        None => match ConfigFile::load() {
            Ok(config) => (config, None),
            Err(e) => (ConfigFile::default(), Some(e)),
        },
    };

    match command {
        Commands::Run => init_file_logging(&config.log_dir())?,
        _ => init_stderr_logging()?,
    }
    if let Some(e) = config_error {
        warn!(error = %e, "failed to load config, using defaults");
    }

    match command {
        Commands::Run => cmd_run(&config),
        Commands::List => cmd_list(&config),
        Commands::Enable { name } => cmd_set_enabled(&config, &name, true),
        Commands::Disable { name } => cmd_set_enabled(&config, &name, false),
        Commands::Install { name } => cmd_install(&config, &name),
        Commands::Env { name } => cmd_env(&config, &name),
        Commands::Language { code } => cmd_language(&config, &code),
    }
}

fn env_filter() -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive(DEFAULT_LOG_FILTER.parse()?))
}

/// The overlay owns the terminal, so its logs go to a file
fn init_file_logging(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter()?)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter()?)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn load_settings(config: &ConfigFile) -> anyhow::Result<Settings> {
    if let Some(dir) = config.settings_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create settings directory {}", dir.display()))?;
    }
    Settings::load(&config.settings_path).context("cannot load settings")
}

// ============================================================================
// Command Implementations
// ============================================================================

fn cmd_run(config: &ConfigFile) -> anyhow::Result<()> {
    let settings = load_settings(config)?;
    info!(widget_dir = %config.widget_dir.display(), "starting overlay");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let result = App::new(config, settings, Rect::new(0, 0, size.width, size.height))
        .and_then(|mut app| app.run(&mut terminal));

    // Restore the terminal even when the session failed
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    info!("overlay closed");
    result
}

fn cmd_list(config: &ConfigFile) -> anyhow::Result<()> {
    let settings = load_settings(config)?;
    let manager = build_manager(config, EventBus::new())?;
    let enabled = settings.active_widgets();

    if manager.available_widgets().is_empty() {
        println!("No widgets in {}", manager.widget_dir().display());
        return Ok(());
    }

    for descriptor in manager.descriptors() {
        let mark = if enabled.contains(&descriptor.name) {
            "[x]"
        } else {
            "[ ]"
        };
        println!("{} {} ({})", mark, descriptor.name, descriptor.title);
        if let Some(description) = &descriptor.description {
            println!("      {}", description);
        }
        if !descriptor.dependencies.is_empty() {
            println!("      dependencies: {}", descriptor.dependencies.join(", "));
        }
    }

    for name in enabled
        .iter()
        .filter(|name| manager.descriptor(name).is_none())
    {
        println!("[x] {} (missing)", name);
    }
    Ok(())
}

fn cmd_set_enabled(config: &ConfigFile, name: &str, enabled: bool) -> anyhow::Result<()> {
    let mut settings = load_settings(config)?;

    if enabled {
        let manager = build_manager(config, EventBus::new())?;
        if manager.descriptor(name).is_none() {
            bail!(
                "widget '{}' not found in {}",
                name,
                manager.widget_dir().display()
            );
        }
    }

    if settings.set_widget_enabled(name, enabled)? {
        println!("{} {}", if enabled { "Enabled" } else { "Disabled" }, name);
    } else {
        println!(
            "{} is already {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
    }
    Ok(())
}

fn cmd_install(config: &ConfigFile, name: &str) -> anyhow::Result<()> {
    let manager = build_manager(config, EventBus::new())?;
    let report = manager.provision(name)?;

    for spec in &report.installed {
        println!("installed {}", spec);
    }
    for spec in &report.skipped {
        println!("already installed {}", spec);
    }
    if report.installed.is_empty() && report.skipped.is_empty() {
        println!("{} declares no dependencies", name);
    }

    let env = manager.provisioner().environment(name)?;
    println!("environment: {}", env.root.display());
    Ok(())
}

fn cmd_env(config: &ConfigFile, name: &str) -> anyhow::Result<()> {
    let manager = build_manager(config, EventBus::new())?;
    let provisioner = manager.provisioner();
    let env = provisioner.environment(name)?;

    println!("path:        {}", env.root.display());
    if !provisioner.is_provisioned(name) {
        println!("status:      not provisioned (run `widgetdesk install {}`)", name);
        return Ok(());
    }

    println!("runtime:     {}", provisioner.runtime_executable(name)?.display());
    let installed = provisioner.installed(name)?;
    if installed.is_empty() {
        println!("installed:   (none)");
    } else {
        println!("installed:   {}", installed.join(", "));
    }
    Ok(())
}

fn cmd_language(config: &ConfigFile, code: &str) -> anyhow::Result<()> {
    let Some((_, label)) = SUPPORTED_LANGUAGES.iter().find(|(c, _)| *c == code) else {
        let known: Vec<&str> = SUPPORTED_LANGUAGES.iter().map(|(c, _)| *c).collect();
        bail!(
            "unsupported language '{}' (available: {})",
            code,
            known.join(", ")
        );
    };

    let mut settings = load_settings(config)?;
    settings.set_language(code)?;
    println!("Language set to {}", label);
    Ok(())
}
