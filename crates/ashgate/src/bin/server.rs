//! # Ashgate Server
//!
//! Headless login and game services for the 8.60 client.
//!
//! ```bash
//! # Stock settings: login on 7171, game on 7172, account "account"
//! ./ashgate_server
//!
//! # Custom settings, verbose logging, stop after a minute
//! RUST_LOG=ashgate_networking=debug ./ashgate_server --config ashgate.toml --duration 60
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ashgate::{ServiceError, ServiceLoop};
use ashgate_shared::ServiceConfig;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: ashgate_server [--config <path>] [--duration <secs>]

Options:
  --config <path>     TOML service configuration (defaults apply when omitted)
  --duration <secs>   Stop after this many seconds instead of running forever
  --help              Print this message";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    duration: Option<Duration>,
}

enum Parsed {
    Run(Args),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Parsed, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--duration" => {
                let secs = args
                    .next()
                    .ok_or("--duration needs a number of seconds")?
                    .parse::<u64>()
                    .map_err(|e| format!("--duration: {e}"))?;
                parsed.duration = Some(Duration::from_secs(secs));
            }
            "--help" | "-h" => return Ok(Parsed::Help),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Parsed::Run(parsed))
}

fn load_config(path: Option<&PathBuf>) -> Result<ServiceConfig, ServiceError> {
    let config = match path {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };
    config.validate_strict()?;
    Ok(config)
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Parsed::Run(args)) => args,
        Ok(Parsed::Help) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    // Logging is not up yet; configuration errors go to stderr.
    let config = match load_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "Ashgate server starting"
    );

    let mut service = match ServiceLoop::build(config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    if let Some(duration) = args.duration {
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            std::thread::sleep(duration);
            running.store(false, Ordering::Relaxed);
        });
        tracing::info!(?duration, "Stopping after the run duration");
    }

    match service.run(&running) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Service loop failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Parsed, String> {
        parse_args(args.iter().map(ToString::to_string))
    }

    #[test]
    fn test_parse_args() {
        let Ok(Parsed::Run(args)) = parse(&["--config", "a.toml", "--duration", "3"]) else {
            panic!("expected run");
        };
        assert_eq!(args.config, Some(PathBuf::from("a.toml")));
        assert_eq!(args.duration, Some(Duration::from_secs(3)));

        assert!(matches!(parse(&[]), Ok(Parsed::Run(_))));
        assert!(matches!(parse(&["--help"]), Ok(Parsed::Help)));
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--duration", "soon"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("ashgate_test_{}.toml", std::process::id()));
        std::fs::write(&path, "tick_interval_ms = 0\n").unwrap();
        let result = load_config(Some(&path));
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }
}
