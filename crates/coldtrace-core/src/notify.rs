//! Alert delivery.
//!
//! Delivery is best-effort: callers log failures and move on. A failed
//! alert is not retried; the sensor has to cross the debounce window again.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::TemperatureAlert;
use crate::config::TelegramConfig;

/// Errors raised while delivering an alert.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request never got a response.
    #[error("alert request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote API answered with an error.
    #[error("alert rejected with status {status}: {description}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error text from the API.
        description: String,
    },

    /// The notifier is missing required settings.
    #[error("notifier not configured: {0}")]
    NotConfigured(String),
}

/// Delivers formatted alert messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert.
    async fn notify(&self, alert: &TemperatureAlert) -> Result<(), NotifyError>;
}

/// Render an alert as plain text.
///
/// Fields appear in a fixed order; times are shown in `tz`.
#[must_use]
pub fn format_alert_message(alert: &TemperatureAlert, tz: Tz) -> String {
    let reading = &alert.reading;
    let p = &reading.payload;
    let local = |t: chrono::DateTime<chrono::Utc>| t.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z");

    let mut msg = String::from("Temperature alert:\n\n");
    let _ = writeln!(msg, "sensorMac: {}", p.sensor_mac);
    let _ = writeln!(msg, "temperature: {:.2}", p.temperature_c);
    let _ = writeln!(
        msg,
        "range: {:.2} - {:.2}",
        alert.policy.min_celsius, alert.policy.max_celsius
    );
    let _ = writeln!(msg, "outOfRangeSince: {}", local(alert.out_of_range_since));
    let _ = writeln!(msg, "timestamp: {}", local(reading.timestamp));
    let _ = writeln!(msg, "trackingHead: {}", p.tracking_head);
    let _ = writeln!(msg, "imei: {}", p.imei);
    let _ = writeln!(msg, "company: {}", p.company);
    let _ = writeln!(msg, "protocol: {}", p.protocol);
    let _ = writeln!(msg, "flags: {}", p.flags);
    let _ = writeln!(msg, "temperatureRaw: {}", p.temperature_raw);
    let _ = writeln!(msg, "humidity: {}", p.humidity_pct);
    let _ = writeln!(msg, "movement: {}", p.movement);
    let _ = writeln!(msg, "angle: {}", p.angle);
    let _ = writeln!(msg, "battery: {}", p.battery_voltage);
    msg
}

/// Logs alerts instead of sending them.
///
/// Used when no remote channel is configured.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    tz: Tz,
}

impl LogNotifier {
    /// Create a notifier rendering times in `tz`.
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &TemperatureAlert) -> Result<(), NotifyError> {
        tracing::warn!(
            sensor_mac = %alert.reading.sensor_mac(),
            message = %format_alert_message(alert, self.tz),
            "Temperature alert (no notifier configured)"
        );
        Ok(())
    }
}

/// The send URL embeds the bot token; keep it out of error text and logs.
fn redact(error: reqwest::Error) -> NotifyError {
    NotifyError::Transport(error.without_url())
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends alerts through the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    send_url: String,
    chat_id: i64,
    tz: Tz,
}

impl TelegramNotifier {
    /// Build a notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::NotConfigured`] when token or chat id is
    /// missing, or a transport error if the HTTP client cannot be built.
    pub fn from_config(config: &TelegramConfig, tz: Tz) -> Result<Self, NotifyError> {
        let (Some(token), Some(chat_id)) = (config.bot_token.as_deref(), config.chat_id) else {
            return Err(NotifyError::NotConfigured(
                "telegram.bot_token and telegram.chat_id are required".to_string(),
            ));
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(redact)?;

        Ok(Self {
            client,
            send_url: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            chat_id,
            tz,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, alert: &TemperatureAlert) -> Result<(), NotifyError> {
        let text = format_alert_message(alert, self.tz);
        let response = self
            .client
            .post(&self.send_url)
            .json(&SendMessage {
                chat_id: self.chat_id,
                text: &text,
            })
            .send()
            .await
            .map_err(redact)?;

        let status = response.status();
        let reply: Option<ApiReply> = response.json().await.ok();
        match reply {
            Some(ApiReply { ok: true, .. }) if status.is_success() => Ok(()),
            other => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: other
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertPolicy;
    use crate::decoder::decode;
    use crate::types::DecodedReading;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn alert() -> TemperatureAlert {
        let payload =
            decode("TRK;865412345678;AC233FA1B2C3;0D1010A50FA06400FF1A2B3C00").unwrap();
        let reading = DecodedReading::new(
            payload,
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 1, 5).unwrap(),
        );
        TemperatureAlert {
            reading: Arc::new(reading),
            out_of_range_since: Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
            policy: AlertPolicy::default(),
        }
    }

    #[test]
    fn test_message_contains_reading_fields() {
        let msg = format_alert_message(&alert(), chrono_tz::UTC);

        assert!(msg.starts_with("Temperature alert:\n\n"));
        assert!(msg.contains("sensorMac: AC233FA1B2C3"));
        assert!(msg.contains("temperature: 40.00"));
        assert!(msg.contains("range: 25.00 - 35.00"));
        assert!(msg.contains("imei: 865412345678"));
        assert!(msg.contains("battery: 2"));
        assert!(msg.contains("outOfRangeSince: 2025-01-15 12:00:00 UTC"));
    }

    #[test]
    fn test_message_uses_timezone() {
        let msg = format_alert_message(&alert(), chrono_tz::America::Santiago);
        // Santiago is UTC-3 in January (summer time).
        assert!(msg.contains("timestamp: 2025-01-15 09:01:05"));
    }

    #[test]
    fn test_telegram_requires_token_and_chat() {
        let config = TelegramConfig::default();
        assert!(matches!(
            TelegramNotifier::from_config(&config, chrono_tz::UTC),
            Err(NotifyError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_telegram_send_url() {
        let config = TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            chat_id: Some(42),
            api_base: "https://api.telegram.org/".to_string(),
            timeout_secs: 5,
        };
        let notifier = TelegramNotifier::from_config(&config, chrono_tz::UTC).unwrap();
        assert_eq!(
            notifier.send_url,
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn test_transport_error_hides_bot_token() {
        let config = TelegramConfig {
            bot_token: Some("SECRET123:tok".to_string()),
            chat_id: Some(42),
            api_base: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
        };
        let notifier = TelegramNotifier::from_config(&config, chrono_tz::UTC).unwrap();

        let err = notifier.notify(&alert()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));

        let logged = crate::error::ColdtraceError::from(err).to_string();
        assert!(!logged.contains("SECRET123"), "token leaked: {logged}");
        assert!(!logged.contains("/bot"), "url leaked: {logged}");
    }

    #[tokio::test]
    async fn test_log_notifier_succeeds() {
        let notifier = LogNotifier::new(chrono_tz::UTC);
        assert!(notifier.notify(&alert()).await.is_ok());
    }
}
