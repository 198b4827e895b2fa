use anyhow::{bail, Context, Result};
use board_link::command::custom::{parse_byte, parse_payload, Radix};
use board_link::command::{requests, Task, TaskContext};
use board_link::response::ResponseClassifier;
use board_link::{logging, BoardLink, EventReceiver, LinkConfig, LinkEvent};
use board_protocol::hex_dump;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Operator client for the TCP forwarding board
#[derive(Parser, Debug)]
#[command(name = "board-link", author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Board host (overrides network.host)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Board port (overrides network.port)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Status polling interval in seconds (overrides polling.interval_secs)
    #[arg(long, global = true)]
    interval: Option<f64>,

    /// Also write the log to this file (overrides logging.file)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Connect and report temperature, voltage and runtime until stopped
    Monitor {
        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Set the output current of a channel (cmd 0x03)
    SetCurrent {
        #[arg(long, value_parser = byte_arg)]
        address: u8,
        #[arg(long, value_parser = byte_arg)]
        value: u8,
    },
    /// Read the SCR register (cmd 0x04)
    ReadScr {
        #[arg(long, value_parser = byte_arg)]
        address: u8,
    },
    /// Write the SCR register (cmd 0x05)
    WriteScr {
        #[arg(long, value_parser = byte_arg)]
        address: u8,
        #[arg(long, value_parser = byte_arg, default_value = "0x48")]
        value: u8,
    },
    /// Query board uptime (cmd 0xF2)
    Runtime {
        #[arg(long, value_parser = byte_arg)]
        address: u8,
    },
    /// Send raw bytes as typed, hex unless --decimal
    Send {
        #[arg(long)]
        decimal: bool,
        data: String,
    },
    /// Write the default configuration as JSON
    InitConfig { path: PathBuf },
}

fn byte_arg(s: &str) -> Result<u8, String> {
    parse_byte(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Cmd::InitConfig { path } = &cli.command {
        let _guard = logging::init(cli.log_file.as_deref())?;
        LinkConfig::default().save(path)?;
        info!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let mut config = LinkConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(interval) = cli.interval {
        config.polling.interval_secs = interval;
    }
    if let Some(file) = cli.log_file {
        config.logging.file = Some(file);
    }
    // Only the monitor polls; one-shot commands want a quiet queue
    if !matches!(cli.command, Cmd::Monitor { .. }) {
        config.polling.enabled = false;
    }

    let _guard = logging::init(config.logging.file.as_deref())?;

    info!(
        "Board link starting: {}:{}",
        config.network.host, config.network.port
    );

    let (link, mut events) = BoardLink::new(config).await?;
    let mut classifier = link.classifier();

    if let Err(e) = link.connect_default().await {
        link.shutdown().await;
        return Err(e).context("Could not reach the board");
    }

    let result = match cli.command {
        Cmd::Monitor { duration } => {
            let duration = duration
                .map(Duration::try_from_secs_f64)
                .transpose()
                .context("--duration must be a non-negative number of seconds")?;
            run_monitor(&mut events, &mut classifier, duration).await
        }
        Cmd::SetCurrent { address, value } => {
            run_once(&link, &mut events, &mut classifier, requests::set_current(address, value)).await
        }
        Cmd::ReadScr { address } => {
            run_once(&link, &mut events, &mut classifier, requests::read_scr(address)).await
        }
        Cmd::WriteScr { address, value } => {
            run_once(&link, &mut events, &mut classifier, requests::write_scr(address, value)).await
        }
        Cmd::Runtime { address } => {
            run_once(&link, &mut events, &mut classifier, requests::query_runtime(address)).await
        }
        Cmd::Send { decimal, data } => {
            let radix = if decimal { Radix::Decimal } else { Radix::Hex };
            let bytes = parse_payload(&data, radix)?;
            let label = hex_dump(&bytes);
            info!("Sending custom data: {}", label);
            let task = Task::new(bytes, Some(TaskContext::Custom { label }));
            run_once(&link, &mut events, &mut classifier, task).await
        }
        Cmd::InitConfig { .. } => Ok(()),
    };

    link.shutdown().await;
    result
}

/// Log every event until the duration elapses or Ctrl-C
async fn run_monitor(
    events: &mut EventReceiver,
    classifier: &mut ResponseClassifier,
    duration: Option<Duration>,
) -> Result<()> {
    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Monitor duration elapsed");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Some(event) => report(event, classifier),
                None => break,
            },
        }
    }

    Ok(())
}

/// Submit one task and print what its response meant
async fn run_once(
    link: &BoardLink,
    events: &mut EventReceiver,
    classifier: &mut ResponseClassifier,
    task: Task,
) -> Result<()> {
    if link.submit(task).is_err() {
        bail!("Dispatcher is not running");
    }

    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::ResponseReceived { response, context } => {
                let classification = classifier
                    .classify(&response, context.as_ref())
                    .with_context(|| format!("Unexpected response: {}", hex_dump(&response)))?;
                println!("{}", classification);
                return Ok(());
            }
            LinkEvent::TaskFailed { error, .. } => return Err(error.into()),
            other => report(other, classifier),
        }
    }

    bail!("Link closed before a response arrived")
}

fn report(event: LinkEvent, classifier: &mut ResponseClassifier) {
    match event {
        LinkEvent::ConnectionStatusChanged { connected: true } => info!("[LINK] Connected"),
        LinkEvent::ConnectionStatusChanged { connected: false } => warn!("[LINK] Disconnected"),
        LinkEvent::ConnectionError { reason } => error!("[LINK] Connection error: {}", reason),
        LinkEvent::TaskFailed { error, context } => {
            let kind = context.as_ref().map_or("raw", |c| c.kind());
            warn!("[LINK] {} request failed: {}", kind, error);
        }
        LinkEvent::ResponseReceived { response, context } => {
            classifier.handle(&response, context.as_ref());
        }
        LinkEvent::StatusUpdated { runtime } => {
            let temperature = classifier.temperature_history().latest().copied();
            let voltage = classifier.voltage_history().latest().copied();
            info!(
                "[POLL] Up {} | temperature {} | voltage {}",
                runtime,
                temperature.map_or("-".into(), |t| format!("{} °C", t)),
                voltage.map_or("-".into(), |v| format!("{:.1} V", v)),
            );
        }
        LinkEvent::StatusError { reason } => warn!("[POLL] {}", reason),
    }
}
