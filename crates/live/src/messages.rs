//! Telemetry stream wire format.
//!
//! Outbound text frames are `{"action": "subscribe"|"unsubscribe",
//! "channel": "<device id>"}`. Inbound text frames are
//! `{"channel": "<device id>", "data": {...}}` where `data` is one sample.
//!
//! Controllers are inconsistent about field naming and numeric encoding,
//! so sample decoding accepts camelCase or snake_case keys and numbers,
//! numeric strings or `null` for every channel value.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weldwatch_core::telemetry::RawSample;
use weldwatch_core::types::{DeviceId, Timestamp};

/// Subscription command sent to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Subscribe,
    Unsubscribe,
}

/// Encode a subscription command as a text frame.
pub fn encode_command(action: Action, channel: &DeviceId) -> String {
    serde_json::json!({
        "action": action,
        "channel": channel.as_str(),
    })
    .to_string()
}

/// Envelope of an inbound text frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(alias = "deviceId", alias = "device_id")]
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}

/// Parse the envelope of an inbound text frame.
pub fn parse_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    serde_json::from_str(text)
}

#[derive(Debug, Deserialize)]
struct SamplePayload {
    #[serde(default, deserialize_with = "lenient_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    current: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    voltage: Option<f64>,
    #[serde(default, alias = "gasFlow", deserialize_with = "lenient_f64")]
    gas_flow: Option<f64>,
    #[serde(default, alias = "identityTag", alias = "rfid", deserialize_with = "lenient_string")]
    identity_tag: Option<String>,
}

/// Decode the `data` of a channel message into a raw sample.
///
/// The channel is authoritative for the device id; any id inside the
/// payload is ignored.
pub fn decode_sample(
    device_id: DeviceId,
    payload: Value,
    received_at: Timestamp,
) -> Result<RawSample, serde_json::Error> {
    let payload: SamplePayload = serde_json::from_value(payload)?;
    Ok(RawSample {
        device_id,
        status: payload.status.unwrap_or_default(),
        current: payload.current,
        voltage: payload.voltage,
        gas_flow: payload.gas_flow,
        identity_tag: payload.identity_tag,
        received_at,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a numeric string, got {s:?}"))),
        Some(other) => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        // RFID readers sometimes report the tag as a bare number.
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("expected a string, got {other}"))),
    }
}
