// src/main.rs

use std::process::ExitCode;

use steprun::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("steprun error: {err:?}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("steprun error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
