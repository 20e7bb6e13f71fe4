//! Terminal dashboard for the accelerometer board.
//!
//! ```text
//! cargo run --bin accelstream -- --host 192.168.4.1 --port 8080 --out recordings
//! ```

use std::{fs::File, io, process::ExitCode};

use accelstream::{
    args::DashboardArgs,
    board_client::BoardClient,
    gui::{run_dashboard, Dashboard},
    session::EventSink,
};
use clap::Parser;
use env_logger::{Env, Target};
use log::{error, info, warn};

/// The dashboard owns the terminal, so anything chattier than a warning
/// goes to the log file or nowhere.
fn init_logging(args: &DashboardArgs) -> io::Result<()> {
    let mut builder = match &args.log_file {
        Some(path) => {
            let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
            builder.target(Target::Pipe(Box::new(File::create(path)?)));
            builder
        }
        None => env_logger::Builder::from_env(Env::default().default_filter_or("warn")),
    };
    builder.init();
    Ok(())
}

fn main() -> ExitCode {
    let args = DashboardArgs::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Could not open the log file: {e}");
        return ExitCode::FAILURE;
    }

    let config = match args.board_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Could not load the config: {e}");
            eprintln!("Could not load the config: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Using board at {}:{}", config.host, config.port);

    let (events, rx) = EventSink::channel();
    let client = BoardClient::new(config, events);
    let mut dashboard = Dashboard::new(client, rx, args.out.clone(), args.interval);

    let res = run_dashboard(&mut dashboard);
    if let Err(e) = dashboard.client_mut().close() {
        warn!("Closing the connection failed: {e}");
    }

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
