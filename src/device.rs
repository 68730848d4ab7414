use std::fmt;
use std::hash::{Hash, Hasher};

use mac_address::MacAddress;
use serde_derive::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FrequencyBand {
    #[serde(rename = "2.4GHz")]
    TwoGhz,
    #[serde(rename = "5GHz")]
    FiveGhz,
}

impl FrequencyBand {
    /// Key the router uses for this band in its client list.
    pub fn clientlist_key(&self) -> &'static str {
        match self {
            FrequencyBand::TwoGhz => "2G",
            FrequencyBand::FiveGhz => "5G",
        }
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyBand::TwoGhz => write!(f, "2.4GHz"),
            FrequencyBand::FiveGhz => write!(f, "5GHz"),
        }
    }
}

/// A device the router reports as associated.
///
/// Identity is the MAC address alone: two records with the same MAC are equal
/// and hash the same, whatever their address, signal or band.
#[derive(Clone, Debug, Serialize)]
pub struct ConnectedDevice {
    mac_address: MacAddress,
    ip_address: String,
    rssi: i32,
    band: FrequencyBand,
}

impl ConnectedDevice {
    pub fn new(mac_address: MacAddress, ip_address: String, rssi: i32, band: FrequencyBand) -> Self {
        ConnectedDevice {
            mac_address,
            ip_address,
            rssi,
            band,
        }
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac_address
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    pub fn rssi(&self) -> i32 {
        self.rssi
    }

    pub fn band(&self) -> FrequencyBand {
        self.band
    }
}

impl PartialEq for ConnectedDevice {
    fn eq(&self, other: &Self) -> bool {
        self.mac_address == other.mac_address
    }
}

impl Eq for ConnectedDevice {}

impl Hash for ConnectedDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mac_address.hash(state);
    }
}

impl fmt::Display for ConnectedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} rssi={} {}",
            self.mac_address, self.ip_address, self.rssi, self.band
        )
    }
}
