//! Reading pipeline: decode, evaluate, persist, publish, alert.
//!
//! Only a malformed record fails [`ReadingPipeline::ingest`]. A store
//! failure still lets the reading go out live, and an alert failure never
//! touches ingestion at all since delivery runs on its own task.
//!
//! Evaluate, persist and publish run under a per-sensor lock, so readings
//! from one sensor reach subscribers in the order they were evaluated even
//! when a store write is slow. Different sensors do not wait on each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::alert::{AlertDecision, AlertPolicy, AlertTracker, TemperatureAlert};
use crate::config::{Config, StorageBackend};
use crate::decoder::decode;
use crate::error::{ColdtraceError, Result};
use crate::hub::{BroadcastHub, PublishReport};
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::store::{JsonLinesStore, MemoryStore, Store, StoreError, RECENT_READINGS_LIMIT};
use crate::types::DecodedReading;

/// What happened to one ingested record.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The stamped reading.
    pub reading: Arc<DecodedReading>,
    /// Alert tracker decision for this sample.
    pub decision: AlertDecision,
    /// Whether the store accepted the reading.
    pub persisted: bool,
    /// Live delivery result.
    pub published: PublishReport,
}

/// Connects decoding to the tracker, the store, the hub and the notifier.
pub struct ReadingPipeline {
    tracker: AlertTracker,
    hub: BroadcastHub,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    write_timeout: Duration,
    sensor_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ReadingPipeline {
    /// Assemble a pipeline from its parts.
    #[must_use]
    pub fn new(
        tracker: AlertTracker,
        hub: BroadcastHub,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            tracker,
            hub,
            store,
            notifier,
            write_timeout,
            sensor_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build the pipeline described by `config`.
    ///
    /// Falls back to logging alerts when Telegram is not configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the Telegram client
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn Store> = match config.storage.backend {
            StorageBackend::JsonLines => Arc::new(JsonLinesStore::open(&config.storage.data_dir)?),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };

        let tz = config.timezone();
        let notifier: Arc<dyn Notifier> = if config.telegram.is_configured() {
            Arc::new(TelegramNotifier::from_config(&config.telegram, tz)?)
        } else {
            warn!("Telegram not configured; alerts will only be logged");
            Arc::new(LogNotifier::new(tz))
        };

        Ok(Self::new(
            AlertTracker::new(AlertPolicy::from(&config.alerts)),
            BroadcastHub::new(config.hub.subscriber_buffer),
            store,
            notifier,
            Duration::from_millis(config.storage.write_timeout_ms),
        ))
    }

    /// Ingest one raw record, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ColdtraceError::MalformedRecord`] if the record does not
    /// match the wire grammar. No other error is surfaced.
    pub async fn ingest(&self, raw: &str) -> Result<IngestOutcome> {
        self.ingest_at(raw, Utc::now()).await
    }

    /// Ingest one raw record as if received at `now`.
    ///
    /// # Errors
    ///
    /// Same as [`ReadingPipeline::ingest`].
    pub async fn ingest_at(&self, raw: &str, now: DateTime<Utc>) -> Result<IngestOutcome> {
        let payload = decode(raw).map_err(|e| {
            warn!(raw, error = %e, "Rejecting malformed record");
            ColdtraceError::from(e)
        })?;

        let reading = Arc::new(DecodedReading::new(payload, now));
        debug!(
            sensor_mac = %reading.sensor_mac(),
            temperature_c = reading.temperature_c(),
            "Decoded reading"
        );

        let sensor_lock = self.sensor_lock(reading.sensor_mac());
        let (decision, persisted, published) = {
            let _ordered = sensor_lock.lock().await;
            let decision = self
                .tracker
                .evaluate(reading.sensor_mac(), reading.temperature_c(), now);
            let persisted = self.persist(&reading).await;
            let published = self.hub.publish(Arc::clone(&reading));
            (decision, persisted, published)
        };

        if let AlertDecision::FireAlert { out_of_range_since } = decision {
            self.dispatch_alert(TemperatureAlert {
                reading: Arc::clone(&reading),
                out_of_range_since,
                policy: *self.tracker.policy(),
            });
        }

        Ok(IngestOutcome {
            reading,
            decision,
            persisted,
            published,
        })
    }

    /// The most recently persisted readings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ColdtraceError::PersistenceFailure`] if the store cannot be
    /// read.
    pub async fn recent_readings(&self) -> Result<Vec<DecodedReading>> {
        Ok(self.store.recent(RECENT_READINGS_LIMIT).await?)
    }

    /// Live subscriber hub.
    #[must_use]
    pub const fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Alert state tracker.
    #[must_use]
    pub const fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    fn sensor_lock(&self, sensor_mac: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.sensor_locks
                .lock()
                .entry(sensor_mac.to_string())
                .or_default(),
        )
    }

    async fn persist(&self, reading: &DecodedReading) -> bool {
        let result = match tokio::time::timeout(self.write_timeout, self.store.append(reading)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(
                u64::try_from(self.write_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                let err = ColdtraceError::from(e);
                error!(
                    sensor_mac = %reading.sensor_mac(),
                    error = %err,
                    "Failed to persist reading; publishing anyway"
                );
                false
            }
        }
    }

    fn dispatch_alert(&self, alert: TemperatureAlert) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let sensor_mac = alert.reading.sensor_mac().to_string();
            match notifier.notify(&alert).await {
                Ok(()) => info!(sensor_mac = %sensor_mac, "Temperature alert delivered"),
                Err(e) => {
                    let err = ColdtraceError::from(e);
                    error!(sensor_mac = %sensor_mac, error = %err, "Failed to deliver temperature alert");
                }
            }
        });
    }
}

impl std::fmt::Debug for ReadingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingPipeline")
            .field("tracker", &self.tracker)
            .field("hub", &self.hub)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}
