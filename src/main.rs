use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, prelude::*};

mod chart;
mod controller;
mod country;
mod domain;
mod inputter;
mod model;
mod pipeline;
mod source;
mod table;
mod ui;

use controller::Controller;
use domain::{TVConfig, TVError};
use model::{Model, Status};
use source::Source;
use ui::TableUI;

/// Browse the REST Countries dataset in the terminal.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Endpoint returning the country records as a JSON array
    #[arg(long, conflicts_with = "file")]
    url: Option<String>,

    /// Read the records from a local JSON file instead
    #[arg(long)]
    file: Option<PathBuf>,

    /// Additional fetch attempts after the first failure
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Per request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Milliseconds to wait for a key press before redrawing
    #[arg(long = "poll-ms", default_value_t = 100)]
    poll_ms: u64,

    /// Write logs to this file, the terminal belongs to the UI
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> TVConfig {
        let source = match (&self.url, &self.file) {
            (_, Some(path)) => Source::File(path.clone()),
            (Some(url), None) => Source::Url(url.clone()),
            (None, None) => Source::default(),
        };
        TVConfig::default()
            .source(source)
            .fetch_retries(self.retries)
            .fetch_timeout(Duration::from_secs(self.timeout))
            .event_poll_time(self.poll_ms)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let result = run(args.config());
    ratatui::restore();

    match result {
        Err(e) => {
            error!("Terminated with {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(args: &Args) -> Result<(), TVError> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };
    let file = File::create(shellexpand::tilde(&path.to_string_lossy()).as_ref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .map_err(|e| TVError::LoadingFailed(format!("invalid log level: {e}")))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(config: TVConfig) -> Result<(), TVError> {
    info!("Starting ctv, reading from {}", config.source);

    let mut model = Model::init(&config);
    let mut ui = TableUI::new(&config);
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model, f))?;

        // Update on every tick so a finished fetch shows up without a key press
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
