//! Shared reading types and OpenAPI schemas.
//!
//! JSON field names follow what deployed dashboards already consume
//! (`sensorMac`, `temperature`, `battery`, ...), so the Rust names and the
//! wire names differ for the scaled fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Typed fields decoded from one manufacturer-data record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecodedPayload {
    /// Tracking head token (3-8 letters).
    #[schema(example = "TRK")]
    pub tracking_head: String,

    /// Gateway IMEI token.
    #[schema(example = "865412345678")]
    pub imei: String,

    /// Sensor identifier; keys the alert state.
    #[schema(example = "AC233FA1B2C3")]
    pub sensor_mac: String,

    /// Company identifier.
    #[schema(example = 3344)]
    pub company: u16,

    /// Protocol version.
    #[schema(example = 16)]
    pub protocol: u8,

    /// Flags byte as 8 binary digits, bit 7 first.
    #[schema(example = "10100101")]
    pub flags: String,

    /// Temperature token exactly as received.
    #[schema(example = "0BB8")]
    pub temperature_raw: String,

    /// Temperature in degrees Celsius (unsigned scaling).
    #[serde(rename = "temperature")]
    #[schema(example = 30.0)]
    pub temperature_c: f64,

    /// Relative humidity in percent.
    #[serde(rename = "humidity")]
    #[schema(example = 50.0)]
    pub humidity_pct: f64,

    /// Movement field as two 8-bit binary groups.
    #[schema(example = "0000000011111111")]
    pub movement: String,

    /// Angle field as three 8-bit binary groups.
    #[schema(example = "000110100010101100111100")]
    pub angle: String,

    /// Battery voltage in volts.
    #[serde(rename = "battery")]
    #[schema(example = 3.2)]
    pub battery_voltage: f64,
}

/// A decoded payload stamped by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "0192f0c4-5b1e-7d2a-9c3e-1f2a3b4c5d6e",
    "trackingHead": "TRK",
    "imei": "865412345678",
    "sensorMac": "AC233FA1B2C3",
    "company": 3344,
    "protocol": 16,
    "flags": "10100101",
    "temperatureRaw": "0BB8",
    "temperature": 30.0,
    "humidity": 50.0,
    "movement": "0000000011111111",
    "angle": "000110100010101100111100",
    "battery": 2.0,
    "timestamp": "2025-01-15T03:30:00Z"
}))]
pub struct DecodedReading {
    /// Time-ordered reading identifier.
    pub id: Uuid,

    /// Decoded fields.
    #[serde(flatten)]
    pub payload: DecodedPayload,

    /// When the pipeline accepted the reading (server clock).
    pub timestamp: DateTime<Utc>,
}

impl DecodedReading {
    /// Stamp a decoded payload with an id and the given acceptance time.
    #[must_use]
    pub fn new(payload: DecodedPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            payload,
            timestamp,
        }
    }

    /// Sensor identifier of this reading.
    #[must_use]
    pub fn sensor_mac(&self) -> &str {
        &self.payload.sensor_mac
    }

    /// Temperature in degrees Celsius.
    #[must_use]
    pub fn temperature_c(&self) -> f64 {
        self.payload.temperature_c
    }
}
