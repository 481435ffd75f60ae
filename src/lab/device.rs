use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    Available,
    Reserved,
    Occupied,
    Maintenance,
    Error,
}

impl DeviceStatus {
    /// Reserved or Occupied by an assignment, as opposed to taken out of service.
    pub fn is_held(&self) -> bool {
        matches!(self, DeviceStatus::Reserved | DeviceStatus::Occupied)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Available => write!(f, "available"),
            DeviceStatus::Reserved => write!(f, "reserved"),
            DeviceStatus::Occupied => write!(f, "occupied"),
            DeviceStatus::Maintenance => write!(f, "maintenance"),
            DeviceStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub supported_types: BTreeSet<String>,
    pub status: DeviceStatus,
}

impl Device {
    pub fn new(id: u64, name: impl Into<String>, status: DeviceStatus) -> Self {
        Self {
            id,
            name: name.into(),
            supported_types: BTreeSet::new(),
            status,
        }
    }

    pub fn with_supported_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_types
            .extend(types.into_iter().map(Into::into));
        self
    }

    pub fn supports(&self, test_type: &str) -> bool {
        self.supported_types.contains(test_type)
    }
}
