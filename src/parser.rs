//! Turns the router's client list into a flat device set.
//!
//! The document has a single top-level entry whose value groups clients by
//! band:
//!
//! ```json
//! {"<id>": {"2G": {"<mac>": {"ip": "...", "rssi": -40}}, "5G": {...}}}
//! ```
//!
//! A MAC listed under both bands yields the 2.4GHz record. Any malformed
//! client entry fails the whole document.

use std::collections::HashSet;
use std::fmt;

use mac_address::MacAddress;
use serde::de::{self, Deserializer, Visitor};
use serde_derive::Deserialize;
use serde_json::{Map, Value};

use crate::device::{ConnectedDevice, FrequencyBand};
use crate::error::PresenceError;

/// Bands in precedence order.
const BANDS: [FrequencyBand; 2] = [FrequencyBand::TwoGhz, FrequencyBand::FiveGhz];

#[derive(Deserialize, Debug)]
struct ClientEntry {
    ip: String,
    #[serde(deserialize_with = "lenient_i32")]
    rssi: i32,
}

/// Parses raw command output. Blank output is an empty list, not an error.
pub fn parse_clientlist(raw: &str) -> Result<HashSet<ConnectedDevice>, PresenceError> {
    if raw.trim().is_empty() {
        return Ok(HashSet::new());
    }

    let root: Map<String, Value> =
        serde_json::from_str(raw).map_err(|e| PresenceError::Parse(e.to_string()))?;

    let groups = match root.into_iter().next() {
        Some((_, Value::Object(groups))) => groups,
        Some((id, other)) => {
            return Err(PresenceError::Parse(format!(
                "entry {id} is not an object: {other}"
            )));
        }
        None => Map::new(),
    };

    let mut devices = HashSet::new();
    for band in BANDS {
        let Some(clients) = groups.get(band.clientlist_key()) else {
            continue;
        };
        let clients = clients.as_object().ok_or_else(|| {
            PresenceError::Parse(format!("{} group is not an object", band.clientlist_key()))
        })?;
        for (mac, entry) in clients {
            // insert() keeps an existing record, so earlier bands win
            devices.insert(parse_device(mac, entry, band)?);
        }
    }

    Ok(devices)
}

/// Like [`parse_clientlist`], but absorbs every failure into an empty set.
pub fn parse_clientlist_lenient(raw: &str) -> HashSet<ConnectedDevice> {
    parse_clientlist(raw).unwrap_or_default()
}

fn parse_device(
    mac: &str,
    entry: &Value,
    band: FrequencyBand,
) -> Result<ConnectedDevice, PresenceError> {
    let mac_address: MacAddress = mac
        .parse()
        .map_err(|e| PresenceError::Parse(format!("bad MAC {mac:?}: {e}")))?;
    let entry = <ClientEntry as serde::Deserialize>::deserialize(entry)
        .map_err(|e| PresenceError::Parse(format!("client {mac}: {e}")))?;

    Ok(ConnectedDevice::new(mac_address, entry.ip, entry.rssi, band))
}

// Firmware versions disagree on whether rssi is a number or a string.
// Floats are accepted only when they hold a whole number.
fn lenient_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientI32;

    impl Visitor<'_> for LenientI32 {
        type Value = i32;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a whole number or a numeric string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i32, E> {
            i32::try_from(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i32, E> {
            i32::try_from(v).map_err(E::custom)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i32, E> {
            if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
                Ok(v as i32)
            } else {
                Err(E::invalid_value(de::Unexpected::Float(v), &self))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i32, E> {
            v.trim().parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(LenientI32)
}
