//! Manufacturer-data record decoding.
//!
//! A record is three `;`-separated identity tokens followed by a fixed-width
//! run of hex fields:
//!
//! ```text
//! <trackingHead:3-8 alpha>;<imei:12 alnum>;<sensorMac:12 alnum>;
//! <company:4 alnum><protocol:2 digit><flags:2 hex><temperature:4 hex>
//! <humidity:2 hex><movement:4 hex><angle:6 hex><battery:2 hex>
//! ```
//!
//! Decoding is all-or-nothing: a record that does not match the grammar
//! exactly, or whose numeric tokens are not valid hex, yields a
//! [`DecodeError`] and no payload.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::types::DecodedPayload;

/// Anchored grammar for one record. Field widths are fixed for interop.
static RECORD_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<tracking_head>[A-Za-z]{3,8});",
        r"(?P<imei>[A-Za-z0-9]{12});",
        r"(?P<sensor_mac>[A-Za-z0-9]{12});",
        r"(?P<company>[A-Za-z0-9]{4})",
        r"(?P<protocol>[0-9]{2})",
        r"(?P<flags>[0-9A-Fa-f]{2})",
        r"(?P<temperature>[0-9A-Fa-f]{4})",
        r"(?P<humidity>[0-9A-Fa-f]{2})",
        r"(?P<movement>[0-9A-Fa-f]{4})",
        r"(?P<angle>[0-9A-Fa-f]{6})",
        r"(?P<battery>[0-9A-Fa-f]{2})$",
    ))
    .expect("record grammar is a valid regex")
});

/// Reasons a raw record is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The record does not match the fixed grammar.
    #[error("record does not match the expected format: {raw}")]
    GrammarMismatch {
        /// The offending raw text.
        raw: String,
    },

    /// A field matched the grammar but is not valid hexadecimal.
    #[error("field '{field}' is not valid hex: {token}")]
    InvalidHex {
        /// Field name.
        field: &'static str,
        /// Token that failed to parse.
        token: String,
    },
}

/// Decode one raw manufacturer-data record.
///
/// Pure function: no clock, no I/O, no alert evaluation.
///
/// # Errors
///
/// Returns [`DecodeError::GrammarMismatch`] when the shape of `raw` differs
/// from the grammar in any way, including trailing or missing characters,
/// and [`DecodeError::InvalidHex`] when the company token is alphanumeric but
/// not hexadecimal.
pub fn decode(raw: &str) -> Result<DecodedPayload, DecodeError> {
    let caps = RECORD_GRAMMAR
        .captures(raw)
        .ok_or_else(|| DecodeError::GrammarMismatch {
            raw: raw.to_string(),
        })?;

    // Every group is mandatory, so a successful match always captures it.
    let field = |name: &str| caps.name(name).map_or("", |m| m.as_str());

    let temperature_raw = field("temperature");
    let temperature = parse_hex_u16("temperature", temperature_raw)?;
    let battery = parse_hex_u8("battery", field("battery"))?;
    let humidity = parse_hex_u8("humidity", field("humidity"))?;

    Ok(DecodedPayload {
        tracking_head: field("tracking_head").to_string(),
        imei: field("imei").to_string(),
        sensor_mac: field("sensor_mac").to_string(),
        company: parse_hex_u16("company", field("company"))?,
        protocol: parse_hex_u8("protocol", field("protocol"))?,
        flags: binary_groups("flags", field("flags"))?,
        temperature_raw: temperature_raw.to_string(),
        temperature_c: temperature_celsius(temperature),
        humidity_pct: humidity_percent(humidity),
        movement: binary_groups("movement", field("movement"))?,
        angle: binary_groups("angle", field("angle"))?,
        battery_voltage: battery_volts(battery),
    })
}

/// Hundredths of a degree to degrees Celsius.
///
/// The raw value is read as unsigned, so sub-zero readings are not
/// representable: `0xFF9C` decodes to 654.36, not -1.00. Downstream
/// consumers depend on this scaling.
#[must_use]
pub fn temperature_celsius(raw: u16) -> f64 {
    f64::from(raw) / 100.0
}

/// Half-percent steps to relative humidity.
#[must_use]
pub fn humidity_percent(raw: u8) -> f64 {
    f64::from(raw) / 2.0
}

/// Battery code to volts: `(2000 + raw * 10) / 1000`.
#[must_use]
pub fn battery_volts(raw: u8) -> f64 {
    (2000.0 + f64::from(raw) * 10.0) / 1000.0
}

fn parse_hex_u16(field: &'static str, token: &str) -> Result<u16, DecodeError> {
    u16::from_str_radix(token, 16).map_err(|_| invalid_hex(field, token))
}

fn parse_hex_u8(field: &'static str, token: &str) -> Result<u8, DecodeError> {
    u8::from_str_radix(token, 16).map_err(|_| invalid_hex(field, token))
}

/// Render a hex token as concatenated 8-bit binary groups, most significant
/// bit first (`"A5"` becomes `"10100101"`).
fn binary_groups(field: &'static str, token: &str) -> Result<String, DecodeError> {
    let bytes = token.as_bytes();
    let mut out = String::with_capacity(bytes.len() * 4);
    for pair in bytes.chunks(2) {
        let byte = std::str::from_utf8(pair)
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .ok_or_else(|| invalid_hex(field, token))?;
        let _ = write!(out, "{byte:08b}");
    }
    Ok(out)
}

fn invalid_hex(field: &'static str, token: &str) -> DecodeError {
    DecodeError::InvalidHex {
        field,
        token: token.to_string(),
    }
}
