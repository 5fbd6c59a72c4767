//! Battery Shunt CLI Application
//!
//! Command-line front-end for the shunt-decoder library. It replays captured
//! response frames through the router and adds:
//! - TOML configuration with command-line overrides
//! - Sample output as JSON lines or plain text
//! - Field discovery scan logging
//! - Load switching requests

use anyhow::{Context, Result};
use clap::Parser;
use shunt_decoder::{ResponseRouter, Sample, Section};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

mod config;
mod replay;

use config::{AppConfig, OutputFormat};
use replay::ReplayTransport;

/// Battery Shunt Decoder - Decode shunt responses and hunt for undocumented fields
#[derive(Parser, Debug)]
#[command(name = "shunt-cli")]
#[command(about = "Decode battery shunt telemetry frames", long_about = None)]
#[command(version)]
struct Args {
    /// Capture file with one hex-encoded response frame per line
    #[arg(short, long, value_name = "FILE")]
    frames: Option<PathBuf>,

    /// Path to configuration file (shunt.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Device address (overrides the config file)
    #[arg(long, value_name = "ID")]
    device_id: Option<u8>,

    /// Scan log target (overrides the config file)
    #[arg(long, value_name = "FILE")]
    scan_log: Option<PathBuf>,

    /// Disable field discovery
    #[arg(long)]
    no_scan: bool,

    /// Also decode model and address responses
    #[arg(long)]
    identity: bool,

    /// Send a load switching request with this value
    #[arg(long, value_name = "VALUE")]
    set_load: Option<u16>,

    /// Sample output format (overrides the config file)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

/// Counters for the end-of-run summary
#[derive(Debug, Default)]
struct RunStats {
    frames: usize,
    samples: usize,
    errors: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Shunt CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", shunt_decoder::VERSION);

    if args.frames.is_none() && args.set_load.is_none() {
        println!("Shunt CLI - No input specified");
        println!("\nQuick Start:");
        println!("  shunt-cli --frames capture.hex");
        println!("  shunt-cli --frames capture.hex --scan-log renogy_scan.csv");
        println!("  shunt-cli --set-load 1");
        println!("\nUse --help for more options");
        return Ok(());
    }

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    run(&args, app_config)
}

fn run(args: &Args, app_config: AppConfig) -> Result<()> {
    let mut shunt_config = app_config.shunt_config();
    if let Some(device_id) = args.device_id {
        shunt_config = shunt_config.with_device_id(device_id);
    }
    if let Some(path) = &args.scan_log {
        shunt_config = shunt_config.with_log_path(path);
    }
    if args.no_scan {
        shunt_config = shunt_config.with_discovery(false);
    }
    let format = args.format.unwrap_or(app_config.output.format);

    let mut sections = app_config.sections();
    if args.identity {
        sections.add(Section::device_info());
        sections.add(Section::device_address());
    }

    let stats = Rc::new(RefCell::new(RunStats::default()));
    let (data_stats, error_stats) = (stats.clone(), stats.clone());

    let mut router = ResponseRouter::new(shunt_config, ReplayTransport::default())
        .context("Failed to set up response router")?
        .with_sections(sections)
        .on_data(move |sample| {
            data_stats.borrow_mut().samples += 1;
            match render_sample(sample, format) {
                Ok(text) => println!("{}", text),
                Err(e) => log::error!("Failed to render sample: {}", e),
            }
        })
        .on_error(move |err| {
            error_stats.borrow_mut().errors += 1;
            log::error!("{}", err);
        });

    if let Some(path) = &args.frames {
        let frames = replay::load_frames(path)?;
        log::info!("Replaying {} frames from {:?}", frames.len(), path);

        for frame in &frames {
            stats.borrow_mut().frames += 1;
            // Failures were already reported through on_error
            if let Ok(event) = router.on_frame(frame) {
                log::debug!("{:?}", event);
            }
        }
    }

    if let Some(value) = args.set_load {
        router.set_load(value)?;
    }

    if !router.sample().is_empty() {
        log::warn!(
            "{} decoded fields were never completed by a write acknowledgement",
            router.sample().len()
        );
    }

    let stats = stats.borrow();
    log::info!(
        "Processed {} frames: {} samples, {} errors",
        stats.frames,
        stats.samples,
        stats.errors
    );

    Ok(())
}

/// Render a completed sample in the chosen output format
fn render_sample(sample: &Sample, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(sample)?),
        OutputFormat::Txt => Ok(sample
            .iter()
            .map(|(name, value)| format!("{:<24} {}", name, value))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        let mut sample = Sample::new();
        sample.insert("charge_battery_voltage", 13.2);
        sample.insert("model", "RSHST-B02P300".to_string());
        sample
    }

    #[test]
    fn test_render_json() {
        let text = render_sample(&sample(), OutputFormat::Json).unwrap();
        assert_eq!(text, r#"{"charge_battery_voltage":13.2,"model":"RSHST-B02P300"}"#);
    }

    #[test]
    fn test_render_txt() {
        let text = render_sample(&sample(), OutputFormat::Txt).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("charge_battery_voltage"));
        assert!(lines[0].ends_with("13.2"));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "shunt-cli",
            "--frames",
            "capture.hex",
            "--no-scan",
            "--set-load",
            "1",
            "--format",
            "txt",
            "-vv",
        ]);
        assert_eq!(args.frames, Some(PathBuf::from("capture.hex")));
        assert!(args.no_scan);
        assert_eq!(args.set_load, Some(1));
        assert_eq!(args.format, Some(OutputFormat::Txt));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_run_replays_capture() {
        let dir = tempfile::tempdir().unwrap();
        let capture = dir.path().join("capture.hex");
        let mut response = vec![0u8; 225];
        response[0] = 0xFF;
        response[1] = 0x03;
        response[2] = 220;
        response[25..28].copy_from_slice(&[0x00, 0x33, 0x90]);
        let content = format!(
            "{}\nff06010a00010000\n",
            response.iter().map(|b| format!("{:02x}", b)).collect::<String>()
        );
        std::fs::write(&capture, content).unwrap();

        let scan_log = dir.path().join("scan.csv");
        let args = Args::parse_from([
            "shunt-cli",
            "--frames",
            capture.to_str().unwrap(),
            "--scan-log",
            scan_log.to_str().unwrap(),
        ]);
        run(&args, AppConfig::default()).unwrap();
        assert!(scan_log.exists());
    }
}
