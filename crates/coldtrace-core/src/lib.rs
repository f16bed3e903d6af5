//! # coldtrace-core
//!
//! Core logic for the coldtrace sensor ingestion service.
//!
//! This crate provides:
//! - Decoding of BLE environmental sensor manufacturer-data records
//! - Debounced per-sensor temperature alerting
//! - Live fan-out of decoded readings to subscribers
//! - Persistence and alert delivery seams
//!
//! ## Architecture
//!
//! - [`decoder`] - Fixed-grammar record decoding (pure)
//! - [`alert`] - Per-sensor alert state machine
//! - [`hub`] - Subscriber set with bounded, non-blocking delivery
//! - [`pipeline`] - Decode, evaluate, persist, publish, notify
//! - [`store`] - Reading persistence (JSON lines file or memory)
//! - [`notify`] - Alert delivery (Telegram or log)
//! - [`config`] - Layered configuration loading and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared reading types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod alert;
pub mod config;
pub mod decoder;
pub mod error;
pub mod hub;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod types;

// Re-export primary types for convenience
pub use alert::{AlertDecision, AlertPolicy, AlertTracker, TemperatureAlert};
pub use config::{
    is_valid_timezone, Config, ConfigError, ConfigResult, LoggingConfig, StorageBackend,
};
pub use decoder::{decode, DecodeError};
pub use error::{ColdtraceError, Result};
pub use hub::{BroadcastHub, DeliveryFailure, PublishReport, SubscriberId, Subscription};
pub use notify::{format_alert_message, LogNotifier, Notifier, NotifyError, TelegramNotifier};
pub use pipeline::{IngestOutcome, ReadingPipeline};
pub use store::{JsonLinesStore, MemoryStore, Store, StoreError, StoreResult, RECENT_READINGS_LIMIT};
pub use types::{DecodedPayload, DecodedReading};
