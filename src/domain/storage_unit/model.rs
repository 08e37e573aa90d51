//! Storage unit (locker) and location entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operational status of a storage unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStatus {
    /// In service; eligible for assignment
    Idle,
    /// Out of service; never assigned
    Faulty,
}

impl StorageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Faulty => "faulty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "faulty" => Some(Self::Faulty),
            _ => None,
        }
    }
}

impl std::fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hotel site holding storage units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn new(tenant_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A single locker / shelf that a reservation can be bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUnit {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    /// Human-facing code, e.g. "A-01". Auto-assignment walks codes ascending.
    pub code: String,
    pub status: StorageStatus,
    pub created_at: DateTime<Utc>,
}

impl StorageUnit {
    pub fn new(location: &Location, code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: location.tenant_id,
            location_id: location.id,
            code: code.into(),
            status: StorageStatus::Idle,
            created_at: Utc::now(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == StorageStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_unit_inherits_location_and_is_idle() {
        let location = Location::new(Uuid::new_v4(), "Lobby");
        let unit = StorageUnit::new(&location, "A-01");
        assert_eq!(unit.location_id, location.id);
        assert_eq!(unit.tenant_id, location.tenant_id);
        assert!(unit.is_idle());
    }

    #[test]
    fn status_parses_canonical_names() {
        assert_eq!(StorageStatus::parse("idle"), Some(StorageStatus::Idle));
        assert_eq!(StorageStatus::parse("faulty"), Some(StorageStatus::Faulty));
        assert_eq!(StorageStatus::parse("Idle"), None);
    }
}
