mod app;
mod backend;
mod cli;
mod config;
mod conversation;
mod error;
mod logging;
mod plain;
mod plot;
mod runner;
mod transcript;
mod tui;

use clap::Parser;
use color_eyre::Result;
use crossterm::event;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;

use app::App;
use backend::HttpBackend;
use cli::{Cli, Commands};
use config::{Config, expand_path};
use conversation::Conversation;
use logging::LogTarget;
use runner::{AppCommand, AppEvent, run_session};
use tui::{install_panic_hook, restore_terminal, setup_terminal};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    cli.validate()?;

    let config = load_config(&cli)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_file = match cli.log_file.as_ref().or(config.logging.file.as_ref()) {
        Some(path) => Some(expand_path(path)?),
        None => None,
    };
    let target = match log_file {
        Some(path) => LogTarget::File(path),
        None if cli.is_interactive() => LogTarget::File(LogTarget::default_file()),
        None => LogTarget::Stderr,
    };
    let _log_guard = logging::init(level, target)?;

    match &cli.command {
        Some(Commands::Config { path }) => show_config(&config, *path),
        Some(Commands::Check) => check(&config).await,
        Some(Commands::Plot { output }) => save_plot(&config, output).await,
        None if cli.plain => run_plain(&config).await,
        None => run_tui(&config).await,
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config_file.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(url) = &cli.base_url {
        config.backend.base_url = config::parse_base_url(url)?.to_string();
    }
    Ok(config)
}

fn http_backend(config: &Config) -> Result<HttpBackend> {
    let backend = HttpBackend::new(
        &config.backend.url()?,
        config.backend.timeout(),
        config.retry.clone(),
    )?;
    Ok(backend)
}

fn show_config(config: &Config, path_only: bool) -> Result<()> {
    if path_only {
        match Config::default_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("no config directory on this platform"),
        }
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}

async fn check(config: &Config) -> Result<()> {
    let backend = http_backend(config)?;
    let message = backend.hello().await?;
    println!("{} is up: {}", backend.base_url(), message);
    Ok(())
}

async fn save_plot(config: &Config, output: &std::path::Path) -> Result<()> {
    let backend = http_backend(config)?;
    let image = plot::fetch_plot(&backend).await?;
    image.save_to(output)?;
    println!("saved {} ({} bytes) to {}", image.mime(), image.len(), output.display());
    Ok(())
}

async fn run_plain(config: &Config) -> Result<()> {
    let backend = http_backend(config)?;
    let conversation = Conversation::new(config.chat.greeting.clone());
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    plain::run(&backend, conversation, stdin, &mut stdout).await?;
    Ok(())
}

async fn run_tui(config: &Config) -> Result<()> {
    let backend = Arc::new(http_backend(config)?);
    info!(base_url = %backend.base_url(), "starting session");

    let (tx_cmd, rx_cmd) = mpsc::unbounded_channel::<AppCommand>();
    let (tx_evt, rx_evt) = mpsc::unbounded_channel::<AppEvent>();

    let session = tokio::spawn(run_session(
        backend,
        Conversation::new(config.chat.greeting.clone()),
        rx_cmd,
        tx_evt,
    ));

    install_panic_hook();
    let mut terminal = setup_terminal()?;
    let mut app = App::new(tx_cmd, rx_evt);

    let result = event_loop(&mut terminal, &mut app);

    restore_terminal(terminal)?;

    drop(app);
    runner::shutdown(session).await?;
    result
}

fn event_loop(terminal: &mut tui::DefaultTerminal, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| app.render(f))?;

        app.tick_spinner();

        let timeout = Duration::from_millis(80);
        if event::poll(timeout)? {
            let ev = event::read()?;
            if app.on_event(ev) {
                break;
            }
        }

        app.poll_async();
    }
    Ok(())
}
