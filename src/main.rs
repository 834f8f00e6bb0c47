use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use grayopt::error::{OptError, Result};
use grayopt::param::{self, Param};
use grayopt::utils::RunContext;
use grayopt::{cinfo, run};
use log::{error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const DEFAULT_PARAM_FILE: &str = "param.yaml";

/// `grayopt [param.yaml] [section.key=value ...]`
fn load_param(args: &[String]) -> Result<Param> {
    let (files, overrides): (Vec<String>, Vec<String>) = args.iter().cloned().partition(|a| !a.contains('='));
    if files.len() > 1 {
        return Err(OptError::Configuration(format!(
            "Expected at most one parameter file, got {}",
            files.join(" ")
        )));
    }

    match files.first() {
        Some(file) => param::get_with_overrides(file, &overrides),
        None if Path::new(DEFAULT_PARAM_FILE).exists() => param::get_with_overrides(DEFAULT_PARAM_FILE, &overrides),
        None => param::from_overrides(&overrides),
    }
}

fn start_logger(param: &Param, ctx: &RunContext) -> std::result::Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let logger = Logger::try_with_str(&param.general.log_level)?;
    if param.general.log_base.is_empty() {
        logger.start()
    } else {
        logger
            .log_to_file(
                FileSpec::default()
                    .directory(ctx.run_dir.clone())
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix)
                    .suppress_timestamp(),
            )
            .duplicate_to_stderr(Duplicate::Info)
            .start()
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let param = match load_param(&args) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let ctx = RunContext::new(&param);
    let _logger = match start_logger(&param, &ctx) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Unable to start logger: {}", e);
            return ExitCode::from(2);
        }
    };

    cinfo!(
        param.general.display_colorful,
        "\x1b[1;96mgrayopt v{}\x1b[0m ({} build, run {})",
        grayopt::experiment::version(),
        env!("GRAYOPT_BUILD_PROFILE"),
        ctx.timestamp
    );

    let running = Arc::new(AtomicBool::new(true));
    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            let r = Arc::clone(&running);
            thread::spawn(move || {
                for sig in signals.forever() {
                    warn!("Received signal {}, stopping at the end of the current generation", sig);
                    r.store(false, Ordering::Relaxed);
                }
            });
        }
        Err(e) => warn!("Signal handlers not installed: {}", e),
    }

    match run(&param, &ctx, running) {
        Ok(exp) => {
            info!("{}", exp.display_results());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            if e.is_configuration() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}
