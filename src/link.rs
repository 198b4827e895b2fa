//! BoardLink: the surface a UI or CLI drives
//!
//! Owns the connection manager, the dispatcher loop and the status poller,
//! and publishes everything they report on one event channel.

use crate::command::{CommandDispatcher, DispatchStats, Task, TaskSender};
use crate::config::LinkConfig;
use crate::connection::ConnectionManager;
use crate::error::LinkError;
use crate::events::{event_channel, EventReceiver, EventSender};
use crate::polling::{PollerHandle, StatusPoller};
use crate::response::ResponseClassifier;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub struct BoardLink {
    config: LinkConfig,
    connection: Arc<ConnectionManager>,
    dispatcher: CommandDispatcher,
    event_tx: EventSender,
    poller: Mutex<Option<PollerHandle>>,
}

impl BoardLink {
    /// Validate the configuration, build the link and start its dispatcher loop
    pub async fn new(config: LinkConfig) -> Result<(Self, EventReceiver)> {
        config.validate()?;

        let (event_tx, event_rx) = event_channel();
        let connection = Arc::new(ConnectionManager::new(config.network.clone(), event_tx.clone()));
        let dispatcher = CommandDispatcher::new(connection.clone(), event_tx.clone());
        dispatcher.start().await;

        let link = Self {
            config,
            connection,
            dispatcher,
            event_tx,
            poller: Mutex::new(None),
        };
        Ok((link, event_rx))
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// A classifier configured from this link's history and checksum settings
    pub fn classifier(&self) -> ResponseClassifier {
        ResponseClassifier::new(
            self.config.history.max_length,
            self.config.protocol.verify_checksum,
        )
    }

    /// Connect, then start a fresh poller when polling is enabled
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), LinkError> {
        self.stop_poller().await;
        self.connection.connect(host, port).await?;

        if self.config.polling.enabled {
            let poller = StatusPoller::new(
                self.connection.clone(),
                self.dispatcher.sender(),
                self.event_tx.clone(),
                self.config.polling.interval(),
            );
            *self.poller.lock().await = Some(poller.start());
        }
        Ok(())
    }

    /// Connect to the configured host and port
    pub async fn connect_default(&self) -> Result<(), LinkError> {
        let network = &self.config.network;
        self.connect(&network.host, network.port).await
    }

    /// Stop polling, then close the connection
    pub async fn disconnect(&self) -> bool {
        self.stop_poller().await;
        self.connection.disconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    /// Queue a task; gives it back once the link has shut down
    pub fn submit(&self, task: Task) -> Result<(), Task> {
        self.dispatcher.submit(task)
    }

    pub fn sender(&self) -> TaskSender {
        self.dispatcher.sender()
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Stop the poller and the dispatcher, then disconnect
    pub async fn shutdown(&self) {
        info!("[LINK] Shutting down");
        self.stop_poller().await;
        self.dispatcher.stop().await;
    }

    async fn stop_poller(&self) {
        let handle = self.poller.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }
}
