//! Reservation domain entity and its status state machine
//!
//! ```text
//! reserved ──► active ──► completed
//!    │           ├──────► no_show
//!    └───────────┴──────► cancelled
//! ```
//!
//! `storage_id` is set exactly when the status is `active` or `completed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::normalize_currency;
use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Provisional booking, no storage bound yet
    Reserved,
    /// Storage bound, guest's items may be stored
    Active,
    /// Items collected
    Completed,
    Cancelled,
    /// Guest never showed up after the start time
    NoShow,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reserved" => Some(Self::Reserved),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "no_show" => Some(Self::NoShow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Statuses that block the storage slot for `[start_at, end_at)`
    pub fn blocks_slot(&self) -> bool {
        matches!(self, Self::Reserved | Self::Active)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the booking came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationOrigin {
    /// Public embeddable booking widget
    Widget,
    /// Hotel staff panel
    Panel,
    /// Partner API
    Api,
}

impl ReservationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Widget => "widget",
            Self::Panel => "panel",
            Self::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "widget" => Some(Self::Widget),
            "panel" => Some(Self::Panel),
            "api" => Some(Self::Api),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Input for creating a reservation
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    /// Pre-chosen storage (staff panel / API only)
    pub storage_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub guest: GuestInfo,
    pub amount_minor: i64,
    pub currency: String,
    pub origin: ReservationOrigin,
    pub payment_required: bool,
}

/// Storage reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub status: ReservationStatus,
    pub storage_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub guest: GuestInfo,
    /// Price in minor units of `currency`
    pub amount_minor: i64,
    pub currency: String,
    pub origin: ReservationOrigin,
    pub payment_required: bool,
    /// Optimistic-concurrency version, bumped on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Validate input and build a `reserved` reservation.
    ///
    /// A pre-chosen storage is not bound here; the ledger activates it
    /// once the slot has been checked.
    pub fn create(input: NewReservation) -> DomainResult<Self> {
        if input.start_at >= input.end_at {
            return Err(DomainError::Validation(format!(
                "start_at ({}) must be before end_at ({})",
                input.start_at, input.end_at
            )));
        }
        if input.amount_minor < 0 {
            return Err(DomainError::Validation(format!(
                "amount_minor must not be negative, got {}",
                input.amount_minor
            )));
        }
        let guest_name = input.guest.name.trim();
        if guest_name.is_empty() {
            return Err(DomainError::Validation("guest name is required".into()));
        }
        if input.origin == ReservationOrigin::Widget && input.storage_id.is_some() {
            return Err(DomainError::Validation(
                "widget reservations cannot pre-select a storage".into(),
            ));
        }
        let currency = normalize_currency(&input.currency)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            location_id: input.location_id,
            status: ReservationStatus::Reserved,
            storage_id: None,
            start_at: input.start_at,
            end_at: input.end_at,
            guest: GuestInfo {
                name: guest_name.to_string(),
                email: non_blank(input.guest.email),
                phone: non_blank(input.guest.phone),
            },
            amount_minor: input.amount_minor,
            currency,
            origin: input.origin,
            payment_required: input.payment_required,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Half-open interval test against `[start_at, end_at)`
    pub fn overlaps(&self, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> bool {
        self.start_at < end_at && start_at < self.end_at
    }

    /// Whether this reservation holds `storage_id` during an overlapping window
    pub fn blocks(&self, storage_id: Uuid, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> bool {
        self.status.blocks_slot()
            && self.storage_id == Some(storage_id)
            && self.overlaps(start_at, end_at)
    }

    /// Storage bound and moved past `reserved`
    pub fn is_converted(&self) -> bool {
        self.storage_id.is_some() && self.status != ReservationStatus::Reserved
    }

    fn illegal(&self, action: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            entity: "Reservation",
            from: self.status.to_string(),
            action,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// reserved → active, binding `storage_id`
    pub fn activate(&mut self, storage_id: Uuid) -> DomainResult<()> {
        if self.status != ReservationStatus::Reserved {
            return Err(self.illegal("assign storage to"));
        }
        self.status = ReservationStatus::Active;
        self.storage_id = Some(storage_id);
        self.touch();
        Ok(())
    }

    /// active → completed
    pub fn complete(&mut self) -> DomainResult<()> {
        if self.status != ReservationStatus::Active {
            return Err(self.illegal("complete"));
        }
        self.status = ReservationStatus::Completed;
        self.touch();
        Ok(())
    }

    /// reserved | active → cancelled; releases the storage
    pub fn cancel(&mut self) -> DomainResult<()> {
        if !matches!(
            self.status,
            ReservationStatus::Reserved | ReservationStatus::Active
        ) {
            return Err(self.illegal("cancel"));
        }
        self.status = ReservationStatus::Cancelled;
        self.storage_id = None;
        self.touch();
        Ok(())
    }

    /// active → no_show once `now` has reached `start_at`; releases the storage
    pub fn mark_no_show(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != ReservationStatus::Active || now < self.start_at {
            return Err(self.illegal("mark no-show"));
        }
        self.status = ReservationStatus::NoShow;
        self.storage_id = None;
        self.touch();
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Query filter for listing reservations
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub tenant_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub storage_id: Option<Uuid>,
    pub status: Option<ReservationStatus>,
    pub origin: Option<ReservationOrigin>,
    /// Only reservations starting at or after this instant
    pub starts_from: Option<DateTime<Utc>>,
    /// Only reservations starting before this instant
    pub starts_before: Option<DateTime<Utc>>,
}

impl ReservationFilter {
    pub fn matches(&self, r: &Reservation) -> bool {
        self.tenant_id.map_or(true, |t| r.tenant_id == t)
            && self.location_id.map_or(true, |l| r.location_id == l)
            && self.storage_id.map_or(true, |s| r.storage_id == Some(s))
            && self.status.map_or(true, |s| r.status == s)
            && self.origin.map_or(true, |o| r.origin == o)
            && self.starts_from.map_or(true, |from| r.start_at >= from)
            && self.starts_before.map_or(true, |before| r.start_at < before)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input() -> NewReservation {
        let start = Utc::now() + Duration::hours(1);
        NewReservation {
            tenant_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            storage_id: None,
            start_at: start,
            end_at: start + Duration::hours(4),
            guest: GuestInfo {
                name: "  Ayşe Yılmaz ".into(),
                email: Some(" ".into()),
                phone: Some("+90 555 000 0000".into()),
            },
            amount_minor: 500_000,
            currency: "try".into(),
            origin: ReservationOrigin::Widget,
            payment_required: true,
        }
    }

    fn active() -> Reservation {
        let mut r = Reservation::create(input()).unwrap();
        r.activate(Uuid::new_v4()).unwrap();
        r
    }

    #[test]
    fn create_normalises_boundary_fields() {
        let r = Reservation::create(input()).unwrap();
        assert_eq!(r.status, ReservationStatus::Reserved);
        assert_eq!(r.storage_id, None);
        assert_eq!(r.currency, "TRY");
        assert_eq!(r.guest.name, "Ayşe Yılmaz");
        assert_eq!(r.guest.email, None);
    }

    #[test]
    fn create_rejects_inverted_window() {
        let mut i = input();
        i.end_at = i.start_at;
        assert!(matches!(Reservation::create(i), Err(DomainError::Validation(_))));
    }

    #[test]
    fn create_rejects_negative_amount() {
        let mut i = input();
        i.amount_minor = -1;
        assert!(matches!(Reservation::create(i), Err(DomainError::Validation(_))));
    }

    #[test]
    fn widget_cannot_preselect_storage() {
        let mut i = input();
        i.storage_id = Some(Uuid::new_v4());
        assert!(matches!(Reservation::create(i), Err(DomainError::Validation(_))));
    }

    #[test]
    fn activate_binds_storage() {
        let mut r = Reservation::create(input()).unwrap();
        let storage = Uuid::new_v4();
        r.activate(storage).unwrap();
        assert_eq!(r.status, ReservationStatus::Active);
        assert_eq!(r.storage_id, Some(storage));
        assert!(r.is_converted());
    }

    #[test]
    fn complete_only_from_active() {
        let mut reserved = Reservation::create(input()).unwrap();
        let before = reserved.clone();
        assert!(matches!(
            reserved.complete(),
            Err(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(reserved, before);

        let mut r = active();
        r.complete().unwrap();
        assert_eq!(r.status, ReservationStatus::Completed);
        assert!(r.storage_id.is_some());
    }

    #[test]
    fn cancel_releases_storage() {
        let mut r = active();
        r.cancel().unwrap();
        assert_eq!(r.status, ReservationStatus::Cancelled);
        assert_eq!(r.storage_id, None);
    }

    #[test]
    fn terminal_states_reject_every_action() {
        let mut completed = active();
        completed.complete().unwrap();
        let snapshot = completed.clone();

        assert!(completed.cancel().is_err());
        assert!(completed.complete().is_err());
        assert!(completed.activate(Uuid::new_v4()).is_err());
        assert!(completed.mark_no_show(Utc::now() + Duration::days(1)).is_err());
        assert_eq!(completed, snapshot);
    }

    #[test]
    fn no_show_requires_start_time_reached() {
        let mut r = active();
        assert!(r.mark_no_show(Utc::now()).is_err());
        assert_eq!(r.status, ReservationStatus::Active);

        r.mark_no_show(r.start_at).unwrap();
        assert_eq!(r.status, ReservationStatus::NoShow);
        assert_eq!(r.storage_id, None);
    }

    #[test]
    fn half_open_overlap() {
        let r = Reservation::create(input()).unwrap();
        // touching intervals do not overlap
        assert!(!r.overlaps(r.end_at, r.end_at + Duration::hours(1)));
        assert!(!r.overlaps(r.start_at - Duration::hours(1), r.start_at));
        assert!(r.overlaps(r.end_at - Duration::minutes(1), r.end_at + Duration::hours(1)));
        assert!(r.overlaps(r.start_at - Duration::hours(1), r.start_at + Duration::seconds(1)));
    }

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            ReservationStatus::Reserved,
            ReservationStatus::Active,
            ReservationStatus::Completed,
            ReservationStatus::Cancelled,
            ReservationStatus::NoShow,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReservationStatus::parse("Accepted"), None);
        assert_eq!(
            serde_json::to_string(&ReservationStatus::NoShow).unwrap(),
            "\"no_show\""
        );
    }

    #[test]
    fn filter_matches_by_status_and_window() {
        let r = active();
        let filter = ReservationFilter {
            status: Some(ReservationStatus::Active),
            starts_from: Some(r.start_at),
            ..Default::default()
        };
        assert!(filter.matches(&r));

        let filter = ReservationFilter {
            starts_before: Some(r.start_at),
            ..Default::default()
        };
        assert!(!filter.matches(&r));
    }
}
