use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod columns;
mod controller;
mod domain;
mod filter;
mod ingest;
mod inputter;
mod model;
mod session;
mod state;
mod ui;
mod value;
mod view;

use controller::Controller;
use domain::{CTConfig, CTError};
use model::{Model, Status};
use ui::TableUI;

/// Terminal viewer for CSV files with filters, search and grouping.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file to open right away
    path: Option<String>,

    /// Milliseconds to wait for terminal events
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Widest a column is rendered, in characters
    #[arg(long, default_value_t = 32)]
    max_column_width: usize,

    /// Write logs to this file, logging is off without it
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level used when CSVTV_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Error: could not set up logging: {e}");
        return ExitCode::FAILURE;
    }

    let result = run(args);
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(args: &Args) -> Result<(), CTError> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_env("CSVTV_LOG")
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), CTError> {
    let cfg = CTConfig::default()
        .with_event_poll_time(args.poll_ms)
        .with_max_column_width(args.max_column_width);
    info!("Starting csvtv with {cfg:?}");

    let (width, height) = ratatui::crossterm::terminal::size()?;
    let mut model = Model::init(&cfg, width as usize, height as usize);
    if let Some(path) = &args.path {
        model.open_file(path)?;
    }

    let ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    while model.status != Status::Quitting {
        terminal.draw(|f| ui.draw(&model, f))?;

        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }
    info!("Bye");
    Ok(())
}
