use crate::position::GeoPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleKind {
    Bus,
    Tram,
    Train,
    Ferry,
}

impl VehicleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleKind::Bus => "bus",
            VehicleKind::Tram => "tram",
            VehicleKind::Train => "train",
            VehicleKind::Ferry => "ferry",
        }
    }
}

impl fmt::Display for VehicleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked vehicle as reported by the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub kind: VehicleKind,
    pub line: String,
    pub position: GeoPosition,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(id: impl Into<String>, kind: VehicleKind, line: impl Into<String>, position: GeoPosition) -> Self {
        Vehicle {
            id: id.into(),
            kind,
            line: line.into(),
            position,
            updated_at: Utc::now(),
        }
    }

    /// Refreshes the position and bumps the report timestamp.
    pub fn reposition(&mut self, position: GeoPosition) {
        self.position = position;
        self.updated_at = Utc::now();
    }
}

/// A fixed stop on the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub position: GeoPosition,
}
