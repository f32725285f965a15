use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

mod config;
mod error;
mod events;
mod matcher;
mod rules;
mod services;
mod utils;

use config::Config;
use error::{AppError, Result};
use rules::RuleStore;
use services::channel::{callback_channel, Interrupts, SocketChannel, WindowHandler};
use services::{detect_focus_source, Detection, Dispatcher, Forwarder, KeydBackend};
use utils::{GuardError, ProcessGuard};

#[derive(Parser, Debug)]
#[command(name = "keyd-app-mapper")]
#[command(about = "Переключает привязки keyd в зависимости от активного окна")]
struct Args {
    /// Необязательный TOML с настройками
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Печатать активное окно (помогает узнать класс и заголовок)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Режим сухого запуска (без реальных действий)
    #[arg(long, global = true)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Источник фокуса и диспетчер в одном процессе (по умолчанию)
    Run,
    /// Системный демон: принимать окна через unix-сокет
    Daemon,
    /// Следить за фокусом и пересылать окна демону
    Monitor,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        // Второй экземпляр - не ошибка для скриптов автозапуска
        Err(AppError::Guard(e @ GuardError::AlreadyRunning)) => die(&e, ExitCode::SUCCESS),
        Err(e) => die(&e, ExitCode::FAILURE),
    }
}

fn die(err: &dyn std::fmt::Display, code: ExitCode) -> ExitCode {
    eprintln!("ERROR: {err}");
    code
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(args.settings.as_deref())?;

    let level = if config.debug { "debug" } else { args.log_level.as_str() };
    init_tracing(level)?;

    info!("Запуск keyd-app-mapper v{}", env!("CARGO_PKG_VERSION"));
    debug!("Debug mode on");
    if args.dry_run {
        warn!("Режим сухого запуска - keyd вызываться не будет");
    }

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_mapper(&config, &args).await,
        Command::Daemon => run_daemon(&config, &args).await,
        Command::Monitor => run_monitor(&config, &args).await,
    }
}

async fn run_mapper(config: &Config, args: &Args) -> Result<()> {
    let store = RuleStore::load(&config.mapper.rules_path)?;
    let guard = ProcessGuard::acquire(&config.mapper.lock_path)?;
    debug!("Блокировка экземпляра: {}", guard.path().display());

    let (handler, mut channel) = callback_channel(Interrupts::install()?);
    let focus = start_focus_source(config, args.dry_run, handler).await?;

    let backend = KeydBackend::new(config.bin.clone(), args.dry_run);
    let mut dispatcher = Dispatcher::new(store, backend, args.verbose);
    let result = dispatcher.run(&mut channel).await;

    finish_focus_source(focus).await?;
    result
}

async fn run_daemon(config: &Config, args: &Args) -> Result<()> {
    let daemon = &config.daemon;
    let store = RuleStore::load(&daemon.rules_path)?;

    let mut channel = SocketChannel::bind(
        &daemon.socket_path,
        daemon.access_group(),
        Duration::from_millis(daemon.read_timeout_ms),
        Interrupts::install()?,
    )?;
    info!("Демон слушает {}...", channel.path().display());

    let backend = KeydBackend::new(config.bin.clone(), args.dry_run);
    let mut dispatcher = Dispatcher::new(store, backend, args.verbose);
    dispatcher.run(&mut channel).await
}

async fn run_monitor(config: &Config, args: &Args) -> Result<()> {
    let guard = ProcessGuard::acquire(&config.mapper.lock_path)?;
    debug!("Блокировка экземпляра: {}", guard.path().display());

    let (handler, mut channel) = callback_channel(Interrupts::install()?);
    let focus = start_focus_source(config, args.dry_run, handler).await?;

    let timeout = Duration::from_millis(config.daemon.read_timeout_ms);
    let forwarder = Forwarder::new(&config.daemon.socket_path, timeout, args.verbose);
    let result = forwarder.run(&mut channel).await;

    finish_focus_source(focus).await?;
    result
}

async fn start_focus_source(
    config: &Config,
    dry_run: bool,
    handler: WindowHandler,
) -> Result<JoinHandle<Result<()>>> {
    let source = match detect_focus_source(config, dry_run).await {
        Detection::Detected(source) => source,
        Detection::NoneAvailable => {
            return Err(app_error!(
                service_unavailable,
                "не удалось определить окружение рабочего стола"
            ));
        }
    };

    info!("{} application switcher monitor started", source.name());

    Ok(tokio::spawn(async move {
        let result = source.start(handler).await;
        if let Err(e) = &result {
            error!("Ошибка в источнике фокуса: {}", e);
        }
        result
    }))
}

/// Если источник фокуса упал, его ошибка важнее штатного завершения цикла
async fn finish_focus_source(focus: JoinHandle<Result<()>>) -> Result<()> {
    if !focus.is_finished() {
        focus.abort();
        return Ok(());
    }

    focus
        .await
        .map_err(|e| app_error!(internal, "задача источника фокуса: {}", e))?
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Неверный уровень логирования")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
