use std::{env, process};

use oss_project_rpc::{ServerConfig, logging, server};
use tracing::error;

fn usage(program: &str) {
    eprintln!("Usage: {program}");
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "project_server".to_string());
    if args.next().is_some() {
        usage(&program);
        process::exit(64);
    }

    logging::init_logging();

    if let Err(err) = server::run(ServerConfig::default()).await {
        error!(error = %err, "failed to serve");
        process::exit(1);
    }
}
