//! Smoke binary for the persistence layer.
//!
//! # Responsibility
//! - Verify `sensus_core` linkage with deterministic output.
//! - Optionally build a session factory from a configuration file and open
//!   one session, reporting the schema version.
//!
//! Usage: `sensus_cli [config_path] [log_dir]`. Session check events go to
//! `log_dir` when it is given.

use log::{error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("sensus_core ping={}", sensus_core::ping());
    println!("sensus_core version={}", sensus_core::core_version());

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        return ExitCode::SUCCESS;
    };
    if let Some(log_dir) = args.next() {
        if let Err(err) = sensus_core::init_logging(sensus_core::default_log_level(), &log_dir) {
            eprintln!("sensus_core logging=error error={err}");
        }
    }

    match check_session(&config_path) {
        Ok(schema_version) => {
            info!(
                "event=cli_session_check module=cli status=ok schema_version={}",
                schema_version
            );
            println!("sensus_core session=ok schema_version={schema_version}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(
                "event=cli_session_check module=cli status=error error_code={}",
                err.code()
            );
            eprintln!("sensus_core session=error code={} error={err}", err.code());
            ExitCode::FAILURE
        }
    }
}

fn check_session(config_path: &str) -> sensus_core::DataAccessResult<u32> {
    let factory = sensus_core::SessionFactory::from_config_file(config_path)?;
    let session = factory.open_session()?;
    let schema_version = factory.schema_version();
    factory.close_session(session);
    factory.close();
    Ok(schema_version)
}
