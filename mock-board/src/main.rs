use clap::Parser;
use mock_board::MockBoard;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Reference forwarding board for development and testing
#[derive(Parser, Debug)]
#[command(name = "mock-board", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:9420")]
    bind: String,

    /// Delay before every reply, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Command codes to record but never answer (repeatable)
    #[arg(long = "silence", value_parser = clap_num_u8)]
    silenced: Vec<u8>,
}

fn clap_num_u8(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("'{}' is not a byte (0-255 or 0x00-0xFF)", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let mut board = MockBoard::bind(&args.bind)
        .await?
        .with_response_delay(Duration::from_millis(args.delay_ms));
    for command in &args.silenced {
        board = board.silence(*command);
    }

    let handle = board.spawn();
    info!("[MOCK] Serving on {} (Ctrl-C to stop)", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!(
        "[MOCK] Shutting down after {} connection(s), {} request(s)",
        handle.connection_count(),
        handle.received().len()
    );
    Ok(())
}
