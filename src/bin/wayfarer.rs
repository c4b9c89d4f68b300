//! wayfarer - trip itinerary companion: nearby stops, agenda and an offline cache.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;
use std::path::PathBuf;

use chrono::NaiveDate;

use wayfarer::cli::{AgendaArgs, NearbyArgs, ServeArgs};
use wayfarer::{AppConfig, Coordinate};

// ============================================================================
// CLI Configuration
// ============================================================================

enum Command {
    Nearby(NearbyArgs),
    Agenda(AgendaArgs),
    Serve(ServeArgs),
}

struct CliConfig {
    config_path: PathBuf,
    command: Command,
}

// ============================================================================
// CLI Parsing
// ============================================================================

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    eprintln!("Run 'wayfarer --help' for usage.");
    std::process::exit(1);
}

fn value(args: &[String], i: &mut usize, flag: &str) -> String {
    *i += 1;
    args.get(*i)
        .cloned()
        .unwrap_or_else(|| fail(&format!("{flag} requires a value")))
}

fn parse_date(raw: &str) -> NaiveDate {
    raw.parse()
        .unwrap_or_else(|_| fail(&format!("invalid date {raw:?}, expected YYYY-MM-DD")))
}

fn parse_args() -> CliConfig {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut config_path = AppConfig::default_path();
    let mut subcommand: Option<String> = None;
    let mut positional = Vec::new();
    let mut at = None;
    let mut date = None;
    let mut toggle = None;
    let mut threshold_km = None;
    let mut json = false;
    let mut serve = ServeArgs::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => config_path = PathBuf::from(value(&args, &mut i, "--config")),
            "--at" => {
                let raw = value(&args, &mut i, "--at");
                at = Some(
                    raw.parse::<Coordinate>()
                        .unwrap_or_else(|e| fail(&e.to_string())),
                );
            }
            "--date" => date = Some(parse_date(&value(&args, &mut i, "--date"))),
            "--toggle" => toggle = Some(parse_date(&value(&args, &mut i, "--toggle"))),
            "--threshold" => {
                let raw = value(&args, &mut i, "--threshold");
                threshold_km = Some(
                    raw.parse::<f64>()
                        .ok()
                        .filter(|km| km.is_finite() && *km >= 0.0)
                        .unwrap_or_else(|| fail(&format!("invalid threshold {raw:?}"))),
                );
            }
            "--json" => json = true,
            "--origin" => serve.origin = Some(value(&args, &mut i, "--origin")),
            "--host" => serve.host = Some(value(&args, &mut i, "--host")),
            "--port" => {
                let raw = value(&args, &mut i, "--port");
                serve.port = Some(
                    raw.parse()
                        .unwrap_or_else(|_| fail(&format!("invalid port {raw:?}"))),
                );
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                if subcommand.is_none() {
                    subcommand = Some(arg.to_string());
                } else {
                    positional.push(PathBuf::from(arg));
                }
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let itinerary = || {
        positional
            .first()
            .cloned()
            .unwrap_or_else(|| fail("missing <itinerary.toml>"))
    };

    let command = match subcommand.as_deref() {
        Some("nearby") => Command::Nearby(NearbyArgs {
            itinerary: itinerary(),
            at: at.unwrap_or_else(|| fail("nearby requires --at <lat,lon>")),
            date,
            threshold_km,
            json,
        }),
        Some("agenda") => Command::Agenda(AgendaArgs {
            itinerary: itinerary(),
            date,
            toggle,
        }),
        Some("serve") => Command::Serve(serve),
        Some(other) => fail(&format!("unknown command {other:?}")),
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    CliConfig {
        config_path,
        command,
    }
}

fn print_usage() {
    eprintln!("Usage: wayfarer [--config <PATH>] <COMMAND> [OPTIONS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  nearby <itinerary.toml> --at <LAT,LON>   Mark stops close to a position");
    eprintln!("  agenda <itinerary.toml>                  List days, collapsed or expanded");
    eprintln!("  serve --origin <URL>                     Serve the site through the offline cache");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --date <YYYY-MM-DD>    Day to treat as today (default: local date)");
    eprintln!("  --threshold <KM>       Proximity threshold (default: from config, 1.0)");
    eprintln!("  --json                 Print the nearby report as JSON");
    eprintln!("  --toggle <YYYY-MM-DD>  Flip and remember one day's collapsed state");
    eprintln!("  --host <HOST>          Bind address for serve (default: 127.0.0.1)");
    eprintln!("  --port <PORT>          Bind port for serve (default: 8787)");
    eprintln!("  --config <PATH>        Config file (default: <config dir>/wayfarer/config.toml)");
    eprintln!("  -h, --help             Show this help");
    eprintln!();
    eprintln!("Set RUST_LOG=debug for per-stop diagnostics.");
}

#[tokio::main]
async fn main() -> wayfarer::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = parse_args();
    let config = AppConfig::load(&cli.config_path)?;
    log::debug!("Loaded config from {}", cli.config_path.display());

    match cli.command {
        Command::Nearby(args) => {
            wayfarer::cli::run_nearby(&config, &args).await?;
        }
        Command::Agenda(args) => {
            wayfarer::cli::run_agenda(&config, &args)?;
        }
        Command::Serve(args) => {
            #[cfg(feature = "server")]
            {
                wayfarer::cli::run_serve(&config, &args).await?;
            }
            #[cfg(not(feature = "server"))]
            {
                let _ = args;
                eprintln!("HTTP front support not compiled in");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
