//! Stand-in for the accelerometer board, for working on the host side
//! without hardware.
//!
//! ```text
//! cargo run --bin simboard -- --bind 127.0.0.1:8080 --sensors 3
//! cargo run --bin accelstream -- --host 127.0.0.1
//! ```

use std::{io, process::ExitCode};

use accelstream::{args::SimBoardArgs, dummy_board::DummyBoard};
use clap::Parser;
use env_logger::Env;
use log::error;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = SimBoardArgs::parse();

    let mut board = match DummyBoard::builder()
        .bind(args.bind.as_str())
        .sensors(args.sensors)
        .noise(args.noise)
        .build()
    {
        Ok(board) => board,
        Err(e) => {
            error!("Could not listen on {}: {e}", args.bind);
            return ExitCode::FAILURE;
        }
    };

    println!("Simulated board listening on {}", board.local_addr());
    println!("Press Enter to stop.");
    let mut line = String::new();
    if let Err(e) = io::stdin().read_line(&mut line) {
        error!("Reading stdin failed: {e}");
    }

    board.stop();
    ExitCode::SUCCESS
}
