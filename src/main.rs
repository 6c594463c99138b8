//src/main.rs

use clap::Parser;

use clawback::commands::cli::Cli;
use clawback::{initialize_environment, run_command};

#[tokio::main]
async fn main() {
    initialize_environment();

    let cli = Cli::parse();

    if let Err(e) = run_command(cli.into_command()).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
