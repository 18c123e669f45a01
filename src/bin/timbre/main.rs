//! timbre - terminal front end for the signal graph
//!
//! Run with: cargo run --bin timbre [bpm]
//!
//! Logs go to `timbre.log` in the working directory. Set `RUST_LOG` to
//! change the filter, e.g. `RUST_LOG=timbre_dsp=debug`.

mod app;
mod patch;
mod ui;

use std::sync::Mutex;

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use tracing_subscriber::EnvFilter;

use app::App;

const LOG_FILE: &str = "timbre.log";

fn init_logging() -> EyreResult<()> {
    let file = std::fs::File::create(LOG_FILE).wrap_err_with(|| format!("failed to create {LOG_FILE}"))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("timbre=info,timbre_dsp=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    init_logging()?;

    let bpm = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<f64>()
            .wrap_err_with(|| format!("bpm must be a number, got {arg:?}"))?,
        None => 120.0,
    };

    App::new().bpm(bpm).run()
}
