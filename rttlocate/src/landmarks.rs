//! Landmark positions and the shared landmark table.
//!
//! A landmark is a network host at a known location. The table is loaded
//! once from the `hosts` table and shared read-only across workers.

use std::collections::HashMap;
use std::net::Ipv4Addr;

/// A landmark host with a known position.
///
/// `ilabel` is the numeric sub-label derived from the trailing digits of
/// the human label (`"ripe-anchor-17"` yields 17), or −1 when the label
/// carries no numeric suffix. It is the lowest-priority calibration lookup
/// key after the IPv4 address and the full label.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkPosition {
    pub ipv4: Ipv4Addr,
    pub label: String,
    pub ilabel: i64,
    /// Longitude in degrees WGS-84, wrapped into (−180, 180].
    pub lon: f64,
    /// Latitude in degrees WGS-84, never exactly ±90.
    pub lat: f64,
    pub country: Option<String>,
    pub asn: Option<i64>,
}

impl LandmarkPosition {
    /// Build a landmark, deriving `ilabel` from the label suffix and
    /// wrapping the longitude.
    pub fn new(ipv4: Ipv4Addr, label: impl Into<String>, lon: f64, lat: f64) -> Self {
        let label = label.into();
        let ilabel = numeric_sublabel(&label);
        Self {
            ipv4,
            label,
            ilabel,
            lon: wrap_longitude(lon),
            lat,
            country: None,
            asn: None,
        }
    }
}

/// Parse the numeric sub-label from a host label's trailing digits.
///
/// Returns −1 when the label does not end in a digit.
pub fn numeric_sublabel(label: &str) -> i64 {
    let digits: String = label
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        return -1;
    }
    digits.parse().unwrap_or(-1)
}

/// Wrap a longitude into (−180, 180].
pub fn wrap_longitude(lon: f64) -> f64 {
    let mut wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        wrapped = 180.0;
    }
    wrapped
}

/// Read-only map of all known landmarks, keyed by IPv4 address.
#[derive(Debug, Clone, Default)]
pub struct LandmarkTable {
    entries: HashMap<Ipv4Addr, LandmarkPosition>,
}

impl LandmarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a landmark, replacing any previous entry for the address.
    pub fn insert(&mut self, landmark: LandmarkPosition) {
        self.entries.insert(landmark.ipv4, landmark);
    }

    pub fn get(&self, addr: &Ipv4Addr) -> Option<&LandmarkPosition> {
        self.entries.get(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LandmarkPosition> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<LandmarkPosition> for LandmarkTable {
    fn from_iter<I: IntoIterator<Item = LandmarkPosition>>(iter: I) -> Self {
        let mut table = Self::new();
        for lm in iter {
            table.insert(lm);
        }
        table
    }
}
