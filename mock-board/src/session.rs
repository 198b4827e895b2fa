//! One connected client

use crate::responder::respond;
use crate::BoardState;
use board_protocol::{hex_dump, FrameDecoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

pub(crate) struct ClientSession {
    socket: TcpStream,
    addr: SocketAddr,
    decoder: FrameDecoder,
    state: Arc<BoardState>,
}

impl ClientSession {
    pub(crate) fn new(socket: TcpStream, addr: SocketAddr, state: Arc<BoardState>) -> Self {
        Self {
            socket,
            addr,
            decoder: FrameDecoder::new(),
            state,
        }
    }

    /// Serve requests until the client goes away
    pub(crate) async fn run(mut self) {
        let mut buf = vec![0u8; 4096];

        loop {
            let n = match self.socket.read(&mut buf).await {
                Ok(0) => {
                    info!("[MOCK] Client disconnected: {}", self.addr);
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("[MOCK] Read error from {}: {}", self.addr, e);
                    break;
                }
            };

            self.decoder.extend(&buf[..n]);
            if let Err(e) = self.drain_frames().await {
                warn!("[MOCK] Write error to {}: {}", self.addr, e);
                break;
            }
        }
    }

    async fn drain_frames(&mut self) -> std::io::Result<()> {
        loop {
            let frame = match self.decoder.decode_next() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(e) => {
                    // Corrupt frame already consumed; keep going
                    warn!("[MOCK] Dropping bad frame from {}: {}", self.addr, e);
                    continue;
                }
            };

            debug!(
                "[MOCK] {} addr={:#04X} cmd={:#04X} data=[{}]",
                self.addr,
                frame.address,
                frame.command,
                hex_dump(&frame.data)
            );
            self.state.record(frame.clone());

            if self.state.is_silenced(frame.command) {
                debug!("[MOCK] Not answering cmd {:#04X}", frame.command);
                continue;
            }

            let delay = self.state.response_delay;
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }

            let reply = respond(&frame);
            self.socket.write_all(&reply).await?;
        }
    }
}
