//! Reference forwarding-board emulator
//!
//! Listens on TCP, decodes request frames and answers each one with a
//! canned reply. Used as the counterparty in `board-link` tests and as a
//! stand-in board during development.

mod responder;
mod session;

pub use responder::{reply_payload, respond};

use anyhow::{Context, Result};
use board_protocol::ParsedFrame;
use session::ClientSession;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// State shared by every client session
#[derive(Default)]
pub(crate) struct BoardState {
    received: Mutex<Vec<ParsedFrame>>,
    connections: AtomicUsize,
    silenced: HashSet<u8>,
    response_delay: Duration,
}

impl BoardState {
    pub(crate) fn record(&self, frame: ParsedFrame) {
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame);
    }

    pub(crate) fn is_silenced(&self, command: u8) -> bool {
        self.silenced.contains(&command)
    }
}

/// A bound but not yet serving board
pub struct MockBoard {
    listener: TcpListener,
    silenced: HashSet<u8>,
    response_delay: Duration,
}

impl MockBoard {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        Ok(Self {
            listener,
            silenced: HashSet::new(),
            response_delay: Duration::ZERO,
        })
    }

    /// Wait this long before every reply
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Record requests with this command code but never answer them
    pub fn silence(mut self, command: u8) -> Self {
        self.silenced.insert(command);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start accepting clients in the background
    pub fn spawn(self) -> MockBoardHandle {
        let addr = self
            .listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        let state = Arc::new(BoardState {
            silenced: self.silenced,
            response_delay: self.response_delay,
            ..Default::default()
        });

        let listener = self.listener;
        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            info!("[MOCK] Board listening on {}", addr);
            loop {
                match listener.accept().await {
                    Ok((socket, peer)) => {
                        info!("[MOCK] Connection from: {}", peer);
                        accept_state.connections.fetch_add(1, Ordering::SeqCst);
                        let _ = socket.set_nodelay(true);
                        tokio::spawn(ClientSession::new(socket, peer, accept_state.clone()).run());
                    }
                    Err(e) => warn!("[MOCK] Accept failed: {}", e),
                }
            }
        });

        MockBoardHandle { addr, state, task }
    }
}

/// A running board; stops accepting when dropped
pub struct MockBoardHandle {
    addr: SocketAddr,
    state: Arc<BoardState>,
    task: JoinHandle<()>,
}

impl MockBoardHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every well-formed request seen so far, in arrival order
    pub fn received(&self) -> Vec<ParsedFrame> {
        self.state
            .received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clients accepted so far
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockBoardHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_protocol::{codec, FrameDecoder};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::{timeout, Instant};

    async fn read_frame(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> ParsedFrame {
        let mut buf = [0u8; 256];
        loop {
            if let Some(frame) = decoder.decode_next().unwrap() {
                return frame;
            }
            let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
                .await
                .expect("no reply")
                .unwrap();
            assert!(n > 0, "board closed the connection");
            decoder.extend(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn test_answers_split_and_coalesced_frames() {
        let board = MockBoard::bind("127.0.0.1:0").await.unwrap().spawn();
        let mut stream = TcpStream::connect(board.addr()).await.unwrap();

        let first = codec::encode(0x02, 0x04, &[]).unwrap();
        let second = codec::encode(0xFF, 0xF7, &[]).unwrap();

        // First frame arrives in two pieces, then glued to line noise and the second
        stream.write_all(&first[..3]).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut rest = first[3..].to_vec();
        rest.extend_from_slice(&[0x13, 0x37]);
        rest.extend_from_slice(&second);
        stream.write_all(&rest).await.unwrap();

        let mut decoder = FrameDecoder::new();
        let scr = read_frame(&mut stream, &mut decoder).await;
        assert_eq!((scr.address, scr.command, &scr.data[..]), (0x02, 0x04, &[0x48][..]));
        let volts = read_frame(&mut stream, &mut decoder).await;
        assert_eq!(&volts.data[..], &[0x09, 0xC4]);

        assert_eq!(board.received().len(), 2);
        assert_eq!(board.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_silenced_command_is_recorded_not_answered() {
        let board = MockBoard::bind("127.0.0.1:0").await.unwrap().silence(0xF6).spawn();
        let mut stream = TcpStream::connect(board.addr()).await.unwrap();

        stream.write_all(&codec::encode(0xFF, 0xF6, &[]).unwrap()).await.unwrap();
        let mut buf = [0u8; 32];
        assert!(timeout(Duration::from_millis(200), stream.read(&mut buf)).await.is_err());
        assert_eq!(board.received()[0].command, 0xF6);
    }

    #[tokio::test]
    async fn test_response_delay() {
        let board = MockBoard::bind("127.0.0.1:0")
            .await
            .unwrap()
            .with_response_delay(Duration::from_millis(150))
            .spawn();
        let mut stream = TcpStream::connect(board.addr()).await.unwrap();

        let started = Instant::now();
        stream.write_all(&codec::encode(0x01, 0x01, &[]).unwrap()).await.unwrap();
        let reply = read_frame(&mut stream, &mut FrameDecoder::new()).await;
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(&reply.data[..], &[0x01]);
    }
}
