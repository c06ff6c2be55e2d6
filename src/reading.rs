//! Sensor readings and the datagram decoder
//!
//! Every inbound packet becomes a [`Reading`], whether it parses or not.
//! Structured payloads contribute their channel values; anything else is kept
//! verbatim in the `raw` field so nothing a device sends is lost.
//!
//! ## Lifecycle
//!
//! ```text
//! decode() ──► Reading (no id) ──► store.insert_reading() ──► Reading (id) ──► hub.publish()
//! ```
//!
//! The timestamp and origin are always assigned here, never taken from the
//! sender.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Keys a sender may not set; the hub assigns them itself.
const RESERVED_KEYS: [&str; 5] = ["id", "_id", "timestamp", "origin", "raw"];

/// Origin tag for readings submitted through the REST intake
const MANUAL_TAG: &str = "manual";

/// Where a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Sender address of the datagram
    Network(SocketAddr),

    /// Submitted by a client through the manual intake
    Manual,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Network(addr) => write!(f, "{addr}"),
            Origin::Manual => f.write_str(MANUAL_TAG),
        }
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == MANUAL_TAG {
            return Ok(Origin::Manual);
        }

        s.parse::<SocketAddr>()
            .map(Origin::Network)
            .map_err(|_| format!("invalid origin '{s}'"))
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Fields a device (or the companion app) may send
///
/// The short keys match the firmware payload (`t`, `h`, `l`); the long names
/// are accepted as aliases. Extraction is per field: a channel only counts
/// when its value is a JSON number, and anything that does not fit a typed
/// field lands in `extra` under its original key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorPayload {
    /// Temperature (°C)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,

    /// Relative humidity (%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,

    /// Illuminance (lx)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l: Option<f64>,

    /// Free-form device identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Unknown keys, preserved for forward compatibility
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Channel fields and the keys they may arrive under, preferred key first
const CHANNEL_KEYS: [(&str, &str); 3] = [("t", "temperature"), ("h", "humidity"), ("l", "light")];

impl SensorPayload {
    /// Interpret a JSON value as a payload. Only objects qualify.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Pull the typed fields out of an object, leaving the rest in `extra`
    pub fn from_map(mut extra: Map<String, Value>) -> Self {
        let [t, h, l] = CHANNEL_KEYS.map(|(short, long)| {
            take_channel(&mut extra, short).or_else(|| take_channel(&mut extra, long))
        });

        let device_id = match extra.remove("device_id") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(other) => {
                extra.insert("device_id".to_string(), other);
                None
            }
            None => None,
        };

        Self {
            t,
            h,
            l,
            device_id,
            extra,
        }
    }
}

/// Remove `key` when it holds a number; any other value stays put
fn take_channel(map: &mut Map<String, Value>, key: &str) -> Option<f64> {
    let value = map.get(key)?.as_f64()?;
    map.remove(key);
    Some(value)
}

impl<'de> Deserialize<'de> for SensorPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(Self::from_map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One telemetry sample plus hub-assigned metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Store-assigned identifier; `None` means unsaved, live-only
    #[serde(default)]
    pub id: Option<String>,

    /// Ingestion time (hub clock, millisecond precision)
    pub timestamp: DateTime<Utc>,

    pub origin: Origin,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Original payload text when it could not be decoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reading {
    /// Build a reading from a client-submitted payload
    pub fn manual(payload: SensorPayload) -> Self {
        Decoded::Structured(payload).into_reading(Origin::Manual, ingestion_time())
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Whether the reading carries at least one channel value
    pub fn has_channels(&self) -> bool {
        self.t.is_some() || self.h.is_some() || self.l.is_some()
    }
}

/// Result of decoding a datagram payload
///
/// Decoding never fails: anything that is not a JSON object is
/// `Unstructured` and keeps its text.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Structured(SensorPayload),
    Unstructured(String),
}

impl Decoded {
    pub fn is_structured(&self) -> bool {
        matches!(self, Decoded::Structured(_))
    }

    /// Stamp origin and timestamp, producing an unsaved reading
    pub fn into_reading(self, origin: Origin, timestamp: DateTime<Utc>) -> Reading {
        let mut reading = Reading {
            id: None,
            timestamp,
            origin,
            t: None,
            h: None,
            l: None,
            device_id: None,
            raw: None,
            extra: Map::new(),
        };

        match self {
            Decoded::Structured(payload) => {
                let SensorPayload {
                    t,
                    h,
                    l,
                    device_id,
                    mut extra,
                } = payload;

                for key in RESERVED_KEYS {
                    extra.remove(key);
                }

                reading.t = t;
                reading.h = h;
                reading.l = l;
                reading.device_id = device_id;
                reading.extra = extra;
            }
            Decoded::Unstructured(text) => {
                reading.raw = Some(text);
            }
        }

        reading
    }
}

/// Decode a datagram payload
///
/// Invalid UTF-8 is replaced lossily. Any JSON object is `Structured`, even
/// when its fields have unexpected types; text that is not JSON, or JSON that
/// is not an object, is `Unstructured`.
pub fn decode(payload: &[u8]) -> Decoded {
    let text = String::from_utf8_lossy(payload);

    let parsed = serde_json::from_str::<Value>(&text)
        .and_then(SensorPayload::from_json);

    match parsed {
        Ok(payload) => Decoded::Structured(payload),
        Err(_) => Decoded::Unstructured(text.into_owned()),
    }
}

/// Decode and enrich a datagram received from `sender`
pub fn enrich(payload: &[u8], sender: SocketAddr) -> Reading {
    decode(payload).into_reading(Origin::Network(sender), ingestion_time())
}

/// Current hub time, truncated to what the store can round-trip
pub fn ingestion_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
