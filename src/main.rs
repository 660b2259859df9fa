use attrition_dash::{
    open_session, AppConfig, App, AppEvent, Args, CacheManager, ConfigManager, DashboardTab,
    ExportOptions, Session, Theme, APP_NAME,
};
use clap::Parser;
use color_eyre::Result;
use ratatui::DefaultTerminal;
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(
    mut terminal: DefaultTerminal,
    session: Session,
    args: &Args,
    config: &AppConfig,
) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    let theme = Theme::from_config(&config.theme)?;
    let mut app = App::new_with_config(session, theme, config)
        .with_export_options(ExportOptions::from_args_and_config(args, config));
    if let Some(tab) = args.tab {
        app = app.with_tab(DashboardTab::from(tab));
    }
    if args.debug {
        app.enable_debug();
    }
    render(&mut terminal, &mut app)?;

    let poll_interval = Duration::from_millis(config.display.event_poll_interval_ms);
    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key)
                    if key.kind == crossterm::event::KeyEventKind::Press =>
                {
                    tx.send(AppEvent::Key(key))?
                }
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    event => {
                        if let Some(event) = app.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }
    Ok(())
}

/// Render every chart into `dir` without starting the interface.
fn run_export(session: &Session, dir: &Path, args: &Args, config: &AppConfig) -> Result<()> {
    let options = ExportOptions::from_args_and_config(args, config);
    let manifest = attrition_dash::export_dashboard(session, dir, &options)?;
    println!(
        "Exported {} charts to {} ({} rows of {}, {} failed)",
        manifest.charts.len(),
        dir.display(),
        manifest.filtered_rows,
        manifest.total_rows,
        manifest.failed()
    );
    for entry in manifest.charts.iter().filter(|c| c.status == "failed") {
        eprintln!(
            "  {}: {}",
            entry.id,
            entry.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// `RUST_LOG` wins; otherwise `--debug`, then `[debug] log_filter`, then info.
fn log_filter(args: &Args, config: &AppConfig) -> String {
    if args.debug || config.debug.enabled {
        return "debug".to_string();
    }
    config
        .debug
        .log_filter
        .clone()
        .unwrap_or_else(|| "info".to_string())
}

/// Headless runs log to stderr. The interface owns the terminal, so it logs
/// to a file in the cache directory instead.
fn init_tracing(args: &Args, config: &AppConfig, headless: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(args, config)));

    if headless {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
        return Ok(None);
    }

    let cache = CacheManager::new(APP_NAME)?;
    cache.ensure_cache_dir()?;
    let appender =
        tracing_appender::rolling::never(cache.cache_dir(), attrition_dash::cache::LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()?;
    Ok(Some(guard))
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        match manager.write_default_config(args.force) {
            Ok(path) => {
                println!("Configuration written to {}", path.display());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error writing configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                match cache.clear_all() {
                    Ok(removed) => println!("Cache cleared successfully ({} files)", removed.len()),
                    Err(e) => {
                        eprintln!("Error clearing cache: {}", e);
                        std::process::exit(1);
                    }
                }
                return Ok(Some(()));
            }
            Err(_e) => {
                println!("No cache to clear");
                return Ok(Some(()));
            }
        }
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let config = AppConfig::load(APP_NAME)?;

    if args.list_charts {
        let catalog = attrition_dash::load_catalog(&args, &config)?;
        print!("{}", catalog.to_toml_string()?);
        return Ok(());
    }

    let headless = args.export.is_some();
    let _guard = init_tracing(&args, &config, headless)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting {}", APP_NAME);

    let session = open_session(&args, &config)?;

    if let Some(dir) = &args.export {
        return run_export(&session, dir, &args, &config);
    }

    let terminal = ratatui::init();
    let result = run(terminal, session, &args, &config);
    ratatui::restore();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
