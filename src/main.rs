use clap::Parser;
use color_eyre::Result;
use ratatui::DefaultTerminal;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Duration;
use tfsview::tfs::{write_tfs, TfsTable};
use tfsview::{
    evaluate, initial_inputs, App, AppConfig, AppEvent, Args, CacheManager, ConfigManager,
    SessionState, TfsLoader, Theme, UploadedFile, APP_NAME,
};
use tracing::{error, info};

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn read_upload(path: &Path, args: &Args) -> Result<UploadedFile> {
    let upload = if path.as_os_str() == "-" {
        UploadedFile::from_reader("stdin", std::io::stdin().lock())?
    } else {
        UploadedFile::from_path(path)?
    };
    Ok(match args.compression {
        Some(compression) => upload.with_compression(Some(compression)),
        None => upload,
    })
}

fn run(
    mut terminal: DefaultTerminal,
    args: &Args,
    config: AppConfig,
    upload: Option<UploadedFile>,
) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    let theme = Theme::from_config(&config.theme)?;
    let poll_interval = Duration::from_millis(config.performance.event_poll_interval_ms);
    let inputs = initial_inputs(args, &config)?;
    let mut app = App::new_with_config(tx.clone(), theme, config).with_inputs(inputs);
    if args.debug {
        app.enable_debug();
    }
    render(&mut terminal, &mut app)?;
    if let Some(upload) = upload {
        tx.send(AppEvent::Upload(upload))?;
    }

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => tx.send(AppEvent::Key(key))?,
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
                    AppEvent::Crash(msg) => {
                        return Err(color_eyre::eyre::eyre!(msg));
                    }
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

/// `--print` and `--report`: evaluate once without a terminal UI.
fn run_headless(args: &Args, config: &AppConfig) -> Result<()> {
    let mut inputs = initial_inputs(args, config)?;
    let path = args
        .path
        .as_deref()
        .ok_or_else(|| color_eyre::eyre::eyre!("a PATH is required"))?;
    inputs.upload = Some(read_upload(path, args)?);
    inputs.generate_report = args.report.is_some();

    let (session, evaluation) = evaluate(SessionState::new(), &inputs, &TfsLoader::default());
    for warning in evaluation.warnings() {
        eprintln!("Warning: {}", warning.message);
    }
    if let Some(err) = tfsview::headless_error(&evaluation) {
        return Err(err);
    }

    if let Some(report_path) = &args.report {
        if let Some(report) = &evaluation.report {
            std::fs::write(report_path, report.to_json()?)?;
            info!(path = %report_path.display(), "report written");
        }
    }
    if args.print {
        if let (Some(table), Some(view)) = (session.table(), &evaluation.view) {
            let filtered = TfsTable::new(table.headers.clone(), view.data.clone())
                .with_index(view.index.as_deref())?;
            let stdout = std::io::stdout();
            let mut out = std::io::BufWriter::new(stdout.lock());
            write_tfs(&mut out, &filtered)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config_manager) => match config_manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Configuration written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing configuration: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
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

fn init_logging(args: &Args, config: &AppConfig) {
    let cache = CacheManager::new(APP_NAME)
        .unwrap_or_else(|_| CacheManager::with_dir(std::env::temp_dir().join(APP_NAME)));
    let settings =
        tfsview::logging::LogSettings::resolve(&config.logging, args.debug, args.log_file.as_deref(), &cache);
    if let Err(e) = tfsview::logging::init(&settings) {
        eprintln!("Warning: logging disabled: {}", e);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let config = AppConfig::load(APP_NAME).unwrap_or_else(|e| {
        eprintln!("Warning: using default configuration: {}", e);
        AppConfig::default()
    });
    init_logging(&args, &config);

    if args.print || args.report.is_some() {
        return run_headless(&args, &config);
    }

    // stdin is read before the terminal takes over the keyboard
    let upload = args
        .path
        .as_deref()
        .map(|path| read_upload(path, &args))
        .transpose()?;
    let terminal = ratatui::init();
    let result = run(terminal, &args, config, upload);
    ratatui::restore();
    if let Err(e) = result {
        error!("{:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
