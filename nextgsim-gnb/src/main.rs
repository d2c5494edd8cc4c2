//! nextgsim gNB RRC control plane
//!
//! This is the main binary for the gNB RRC session manager. It implements:
//! - CLI argument parsing
//! - Configuration loading and validation
//! - RRC task spawning and lifecycle management
//! - Graceful shutdown handling
//!
//! Without a radio or core network attached, every RRC output is logged.
//!
//! # Usage
//!
//! ```bash
//! nr-gnb -c config/gnb.yaml
//! ```

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use nextgsim_common::{format_hex_compact, init_logging, LogLevel};
use nextgsim_gnb::{
    channel_collaborators, load_and_validate_gnb_config, RrcMessage, RrcOutput, RrcTask, Task,
    TaskHandle, TaskMessage, DEFAULT_CHANNEL_CAPACITY,
};

/// nextgsim gNB - RRC control-plane session manager
#[derive(Parser, Debug)]
#[command(name = "nr-gnb")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the gNB configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: String,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(short = 'd', long = "duration", value_name = "SECONDS")]
    duration: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: LogLevel,
}

/// Application state for the gNB
struct GnbApp {
    rrc: TaskHandle<RrcMessage>,
    rrc_join: JoinHandle<()>,
    output_join: JoinHandle<()>,
}

impl GnbApp {
    /// Creates a new gNB application with the given configuration file
    fn new(config_path: &str) -> Result<Self> {
        info!("Loading configuration from: {}", config_path);
        let config = load_and_validate_gnb_config(config_path)
            .with_context(|| format!("Failed to load configuration from {config_path}"))?;

        info!(
            "Configuration loaded: gNB={}, PLMN={}-{}, TAC={}",
            config.gnb_id, config.plmn.mcc, config.plmn.mnc, config.tac
        );
        for cell in &config.cells {
            info!(
                "Cell {}: PCI={}, ARFCN={}, {} PRBs",
                cell.cell_id, cell.pci, cell.arfcn, cell.dl_bandwidth_prbs
            );
        }
        info!("X2 neighbours: {} cell(s)", config.neighbours.len());

        let (output, output_rx) = TaskHandle::channel(DEFAULT_CHANNEL_CAPACITY);
        let (rrc, rrc_rx) = TaskHandle::channel(DEFAULT_CHANNEL_CAPACITY);

        let collab = channel_collaborators(&config, output);
        let mut rrc_task = RrcTask::new(config, collab);
        let rrc_join = tokio::spawn(async move {
            rrc_task.run(rrc_rx).await;
        });
        info!("RRC task spawned");

        let output_join = tokio::spawn(log_outputs(output_rx));

        Ok(Self {
            rrc,
            rrc_join,
            output_join,
        })
    }

    /// Runs until Ctrl+C, or for `duration` when given
    async fn run(&self, duration: Option<u64>) -> Result<()> {
        info!("gNB started, waiting for shutdown signal...");

        match duration {
            Some(secs) => tokio::select! {
                _ = signal::ctrl_c() => info!("Received Ctrl+C, initiating shutdown..."),
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!("Run time of {}s elapsed, initiating shutdown...", secs);
                }
            },
            None => {
                signal::ctrl_c()
                    .await
                    .context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, initiating shutdown...");
            }
        }
        Ok(())
    }

    /// Reports the final registry state and stops the RRC task
    async fn shutdown(self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        let (reply, stats) = oneshot::channel();
        if self.rrc.send(RrcMessage::Stats { reply }).await.is_ok() {
            if let Ok(stats) = stats.await {
                info!(
                    "RRC: {} live, {} created, {} removed, handovers {}/{}/{} (started/completed/failed)",
                    stats.live,
                    stats.created,
                    stats.removed,
                    stats.handovers_started,
                    stats.handovers_completed,
                    stats.handovers_failed
                );
            }
        }

        if let Err(e) = self.rrc.shutdown().await {
            warn!("RRC task already stopped: {}", e);
        }
        self.rrc_join.await.context("RRC task panicked")?;
        // the output channel closes once the RRC task drops its collaborators
        self.output_join.await.context("Output task panicked")?;
        info!("All tasks shut down successfully");
        Ok(())
    }
}

/// Logs what the RRC layer hands to its collaborators.
async fn log_outputs(mut rx: mpsc::Receiver<TaskMessage<RrcOutput>>) {
    while let Some(msg) = rx.recv().await {
        let Some(output) = msg.into_message() else {
            break;
        };
        match output {
            RrcOutput::UeAdded { rnti, cell_id } => info!("UE[{}] added in cell {}", rnti, cell_id),
            RrcOutput::UeRemoved { rnti } => info!("UE[{}] removed", rnti),
            RrcOutput::Core(event) => info!("Core network: {}", event.name()),
            RrcOutput::X2(message) => info!("X2: {}", message.name()),
            RrcOutput::Broadcast { cell_id, data } => {
                trace!("Cell {} broadcast {}", cell_id, format_hex_compact(&data, 4));
            }
            RrcOutput::Downlink { rnti, channel, data } => {
                debug!("UE[{}] {} {}", rnti, channel, format_hex_compact(&data, 4));
            }
            other => debug!("RRC output: {}", other.name()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    println!("nextgsim gNB - RRC Control Plane");
    println!("================================");

    match run_gnb(args).await {
        Ok(()) => {
            info!("gNB exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("gNB failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main gNB execution logic
async fn run_gnb(args: Args) -> Result<()> {
    let app = GnbApp::new(&args.config_file)?;
    app.run(args.duration).await?;
    app.shutdown().await?;
    Ok(())
}
