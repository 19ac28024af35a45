//! Command-line entry point for the water-level fleet simulator.
//!
//! Usage:
//!   sparkplug-sim run [--config simulator.json] [--duration-secs 60] [--report-secs 30]
//!   sparkplug-sim example [--encoding json]

use clap::{Parser, Subcommand};
use log::{info, warn};
use sparkplug_sim::{
    water_level_catalogue, DeviceReport, DeviceSession, Encoder, Encoding, MetricRegistry,
    MqttConnector, Orchestrator, RunLimit, SimulatorConfig,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "sparkplug-sim", version, about = "Sparkplug B water-level sensor simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the simulated devices against an MQTT broker
    Run {
        /// JSON configuration file; the two-device demo fleet when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop every device after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Stop every device after this many NDATA messages
        #[arg(long)]
        messages: Option<u64>,

        /// Payload encoding (protobuf or json)
        #[arg(long)]
        encoding: Option<Encoding>,

        /// Override the broker host
        #[arg(long)]
        host: Option<String>,

        /// Override the broker port
        #[arg(long)]
        port: Option<u16>,

        /// Seconds between per-device health reports
        #[arg(long, default_value_t = 30)]
        report_secs: u64,
    },
    /// Print one NBIRTH and one NDATA payload of a demo device
    Example {
        /// Print payloads as protobuf hex instead of JSON
        #[arg(long)]
        protobuf: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Run {
            config,
            duration_secs,
            messages,
            encoding,
            host,
            port,
            report_secs,
        } => {
            let mut config = match config {
                Some(path) => SimulatorConfig::from_file(path)?,
                None => SimulatorConfig::water_level_demo(),
            };
            if let Some(encoding) = encoding {
                config.encoding = encoding;
            }
            if let Some(host) = host {
                config.broker.host = host;
            }
            if let Some(port) = port {
                config.broker.port = port;
            }
            if duration_secs.is_some() || messages.is_some() {
                config.run = RunLimit {
                    duration_secs,
                    max_data_messages: messages,
                };
            }
            config.validate()?;
            run(config, Duration::from_secs(report_secs.max(1)))
        }
        Command::Example { protobuf } => example(protobuf),
    }
}

fn run(config: SimulatorConfig, report_interval: Duration) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Simulating {} device(s) against {}:{} ({:?})",
        config.devices.len(),
        config.broker.host,
        config.broker.port,
        config.encoding
    );

    let mut orchestrator = Orchestrator::from_config(&config, MqttConnector::new());
    let shutdown = orchestrator.shutdown_handle();
    let handler = orchestrator.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("Caught signal, shutting down gracefully...");
        handler.trigger();
    })?;

    orchestrator.start(config.devices)?;
    let mut next_report = Instant::now() + report_interval;
    while !shutdown.wait_timeout(POLL_INTERVAL) && !orchestrator.all_stopped() {
        if Instant::now() >= next_report {
            for report in orchestrator.statuses() {
                log_report(&report);
            }
            next_report += report_interval;
        }
    }

    for report in orchestrator.wait() {
        log_report(&report);
    }
    Ok(())
}

fn log_report(report: &DeviceReport) {
    let seq = report
        .last_seq
        .map_or_else(|| "-".to_string(), |seq| seq.to_string());
    match &report.last_error {
        Some(error) => warn!(
            "{}: {} seq={} published={} failures={}: {}",
            report.device_id, report.state, seq, report.published, report.failures, error
        ),
        None => info!(
            "{}: {} seq={} published={} failures={}",
            report.device_id, report.state, seq, report.published, report.failures
        ),
    }
}

fn example(protobuf: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = MetricRegistry::new(&water_level_catalogue(150.0, 20.0, 300.0))?;
    let mut session = DeviceSession::new("9d3e50ea-e160-4e59-a98e-6b13f51e5e1f", registry, None, 0.0);
    let birth = session.birth()?;
    let data = session.data()?;

    if protobuf {
        let encoder = Encoder::new(Encoding::Protobuf);
        for (label, payload) in [("NBIRTH", &birth), ("NDATA", &data)] {
            let bytes = encoder.encode(payload)?;
            let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            println!("{} ({} bytes): {}", label, bytes.len(), hex);
        }
        return Ok(());
    }

    let encoder = Encoder::new(Encoding::Json);
    for (label, payload) in [("NBIRTH", &birth), ("NDATA", &data)] {
        let value: serde_json::Value = serde_json::from_slice(&encoder.encode(payload)?)?;
        println!("{}:\n{}\n", label, serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
