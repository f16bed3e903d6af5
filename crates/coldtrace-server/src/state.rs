//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use coldtrace_core::{Config, ReadingPipeline};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Handler state type used by every router.
pub type SharedState = AppState;

struct AppStateInner {
    config: Config,
    pipeline: ReadingPipeline,
}

impl AppState {
    /// Wrap an already assembled pipeline.
    #[must_use]
    pub fn new(config: Config, pipeline: ReadingPipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, pipeline }),
        }
    }

    /// Validate `config` and build the pipeline it describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store or
    /// notifier cannot be created.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let pipeline = ReadingPipeline::from_config(&config)?;
        Ok(Self::new(config, pipeline))
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The reading pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &ReadingPipeline {
        &self.inner.pipeline
    }

    /// Upper bound on one WebSocket write.
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.config.hub.send_timeout_ms)
    }
}
