use clap::Parser;
use plume_processor::cli::{self, Args};
use std::process;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    match cli::run(args) {
        Ok(_stats) => {
            // Summary has already been reported by the command
            process::exit(0);
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
