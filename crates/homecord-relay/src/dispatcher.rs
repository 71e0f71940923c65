//! Change dispatcher
//!
//! The `Dispatcher` owns the delivery side of the relay. It consumes the
//! change feed, runs each change through the `ChangeFilter`, and hands
//! accepted updates to the `DeliveryChannel`. It also drives the optional
//! periodic whole-device refresh and exposes a manual one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use homecord_core::ChangeEvent;
use homecord_registry::{ChangeFeed, EntityDirectory, StateLookup};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval};
use tracing::{debug, error, info, trace, warn};

use crate::channel::{DeliveryChannel, DeliveryError, DeliveryOutcome};
use crate::config::RelayConfig;
use crate::filter::{ChangeFilter, Decision};
use crate::payload::UpdatePayload;
use crate::records::device_records;
use crate::snapshot::{SnapshotError, SnapshotFetcher};

/// Errors from assembling a dispatcher out of its configuration
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Dispatcher that connects the change feed to the delivery channel
///
/// Changes are processed one at a time in arrival order; a delivery in
/// flight delays the next change instead of racing it. The feed buffers
/// a bounded backlog, and a consumer that falls too far behind skips
/// ahead rather than growing memory.
pub struct Dispatcher {
    /// Entity directory for whole-device queries
    directory: Arc<dyn EntityDirectory>,
    /// State lookup for current values
    states: Arc<dyn StateLookup>,
    /// Relevance filter for individual changes
    filter: Arc<ChangeFilter>,
    /// Delivery channel to the bot
    channel: Arc<DeliveryChannel>,
    /// Snapshot fetcher, present when a source platform is configured
    fetcher: Option<Arc<SnapshotFetcher>>,
    /// Relay configuration
    config: RelayConfig,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
    /// Handle of the feed loop, held so shutdown can await its exit
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Build a dispatcher for one configured relay target
    pub fn new(
        config: RelayConfig,
        directory: Arc<dyn EntityDirectory>,
        states: Arc<dyn StateLookup>,
    ) -> Result<Self, DispatcherError> {
        let channel = Arc::new(DeliveryChannel::new(
            &config.bot_url,
            config.bot_ws_url.clone(),
            config.connect_timeout(),
        )?);

        let fetcher = match config.source_url.as_deref() {
            Some(source_url) => Some(Arc::new(SnapshotFetcher::new(
                source_url,
                config.access_token.clone(),
                config.snapshot_timeout(),
            )?)),
            None => None,
        };

        let filter = Arc::new(ChangeFilter::new(
            directory.clone(),
            states.clone(),
            config.device_id.clone(),
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            directory,
            states,
            filter,
            channel,
            fetcher,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            task: Mutex::new(None),
        })
    }

    /// The underlying delivery channel
    pub fn channel(&self) -> Arc<DeliveryChannel> {
        self.channel.clone()
    }

    /// Start consuming the change feed
    ///
    /// Also arms the periodic whole-device refresh when the configuration
    /// asks for one.
    pub async fn start(&self, feed: &ChangeFeed) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Dispatcher already running");
            return;
        }

        info!(device_id = %self.config.device_id, "Starting dispatcher");

        let mut change_rx = feed.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let directory = self.directory.clone();
        let states = self.states.clone();
        let filter = self.filter.clone();
        let channel = self.channel.clone();
        let fetcher = self.fetcher.clone();
        let device_id = self.config.device_id.clone();
        let allowlist = self.config.entities.clone();
        let update_interval = self.config.update_interval();
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            // First periodic refresh fires one full period after start
            let mut ticker =
                update_interval.map(|period| time::interval_at(Instant::now() + period, period));

            loop {
                tokio::select! {
                    change = change_rx.recv() => {
                        match change {
                            Ok(event) => {
                                Self::process_change(
                                    &event,
                                    &filter,
                                    &channel,
                                    fetcher.as_deref(),
                                    &device_id,
                                ).await;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("Dispatcher lagged by {} changes", n);
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                info!("Change feed closed, stopping dispatcher");
                                break;
                            }
                        }
                    }
                    _ = Self::next_tick(&mut ticker) => {
                        Self::periodic_refresh(
                            directory.as_ref(),
                            states.as_ref(),
                            fetcher.as_deref(),
                            &channel,
                            &device_id,
                            &allowlist,
                        ).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Received shutdown signal");
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("Dispatcher stopped");
        });

        *self.task.lock().await = Some(task);
    }

    /// Stop consuming changes, then shut the delivery channel
    ///
    /// The feed loop exits and is awaited before the channel closes, so a
    /// delivery in flight completes and nothing is handed to a closing
    /// channel. Safe to call more than once.
    pub async fn shutdown(&self) {
        info!("Shutting down dispatcher");
        let _ = self.shutdown_tx.send(());

        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }

        self.channel.close().await;
    }

    /// Check if the feed loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one change through the filter and deliver the result
    ///
    /// The feed loop takes this same path; callers holding a change in
    /// hand can invoke it directly.
    pub async fn handle_change(&self, event: &ChangeEvent) {
        Self::process_change(
            event,
            &self.filter,
            &self.channel,
            self.fetcher.as_deref(),
            &self.config.device_id,
        )
        .await;
    }

    /// Send the whole device's current records, honoring the allowlist
    ///
    /// Sends even when no entity qualifies; the bot sees an empty entity
    /// list rather than silence.
    pub async fn send_device(&self) -> Result<DeliveryOutcome, DeliveryError> {
        let records = device_records(
            self.directory.as_ref(),
            self.states.as_ref(),
            self.fetcher.as_deref(),
            &self.config.device_id,
            &self.config.entities,
        )
        .await;

        info!(
            device_id = %self.config.device_id,
            entity_count = records.len(),
            "Sending whole-device update"
        );
        self.channel
            .deliver(UpdatePayload::new(self.config.device_id.as_str(), records))
            .await
    }

    /// Filter one change and deliver it when accepted
    async fn process_change(
        event: &ChangeEvent,
        filter: &ChangeFilter,
        channel: &DeliveryChannel,
        fetcher: Option<&SnapshotFetcher>,
        device_id: &str,
    ) {
        match filter.decide(event, fetcher).await {
            Decision::Emit(records) => {
                debug!(entity_id = %event.entity_id, "Change accepted, delivering");
                Self::deliver_logged(channel, UpdatePayload::new(device_id, records)).await;
            }
            Decision::Suppress => {
                trace!(entity_id = %event.entity_id, "Change suppressed");
            }
        }
    }

    /// Deliver a payload, logging the outcome instead of surfacing it
    async fn deliver_logged(channel: &DeliveryChannel, payload: UpdatePayload) {
        let entity_count = payload.entities.len();
        match channel.deliver(payload).await {
            Ok(DeliveryOutcome::Streamed) => {
                debug!(entity_count, "Update streamed to bot");
            }
            Ok(DeliveryOutcome::HttpFallback) => {
                debug!(entity_count, "Update delivered over HTTP fallback");
            }
            Err(error) => {
                error!(error = %error, "Update delivery failed");
            }
        }
    }

    /// Refresh the whole device on the periodic tick
    ///
    /// Unlike the manual path, an empty entity set is skipped here; the
    /// timer should not spam the bot with empty updates.
    async fn periodic_refresh(
        directory: &dyn EntityDirectory,
        states: &dyn StateLookup,
        fetcher: Option<&SnapshotFetcher>,
        channel: &DeliveryChannel,
        device_id: &str,
        allowlist: &[String],
    ) {
        let records = device_records(directory, states, fetcher, device_id, allowlist).await;
        if records.is_empty() {
            debug!(device_id, "No entities to refresh, skipping periodic update");
            return;
        }

        debug!(device_id, entity_count = records.len(), "Periodic refresh");
        Self::deliver_logged(channel, UpdatePayload::new(device_id, records)).await;
    }

    /// Wait for the next periodic tick, or forever when none is configured
    async fn next_tick(ticker: &mut Option<Interval>) {
        match ticker {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
