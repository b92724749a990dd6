//! hushcut binary.

use clap::Parser;
use hushcut_media::command::stderr_tail;
use hushcut_worker::{format_summary, init_tracing, run, Args, WorkerConfig};
use tracing::{error, info};

/// Lines of tool stderr shown when a run fails.
const STDERR_TAIL_LINES: usize = 20;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = WorkerConfig::from_env();
    init_tracing(args.log_level(), config.log_json);

    info!("Starting hushcut");

    match run(args, config).await {
        Ok(outcome) => println!("{}", format_summary(&outcome)),
        Err(e) => {
            error!("{}", e);
            if let Some(stderr) = e.tool_stderr() {
                eprintln!("{}", stderr_tail(stderr, STDERR_TAIL_LINES));
            }
            std::process::exit(e.exit_code());
        }
    }
}
