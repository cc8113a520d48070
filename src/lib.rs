pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use std::process::ExitCode;

use clap::Parser;

pub fn run() -> ExitCode {
    match try_run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match serde_json::to_string_pretty(&error) {
                Ok(rendered) => eprintln!("{rendered}"),
                Err(_) => eprintln!("{error}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn try_run() -> Result<(), commands::CommandError> {
    let cli = cli::Cli::parse();
    cli::execute(cli)
}
