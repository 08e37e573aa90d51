//! Reservation ledger
//!
//! Owns reservation state transitions and storage assignment.
//!
//! Two in-process lock families keep transitions consistent:
//! - one mutex per reservation id serialises every transition of that
//!   reservation;
//! - one mutex per location serialises the overlap check with the write
//!   that claims a slot.
//!
//! The repository write is still a compare-and-swap on `version` and
//! re-checks the overlap atomically, so a second process racing on the
//! same storage loses with `Conflict`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::events::{
    Event, ReservationCreatedEvent, ReservationStatusChangedEvent, SharedEventBus,
};
use crate::domain::{
    DomainError, DomainResult, NewReservation, RepositoryProvider, Reservation, ReservationFilter,
    ReservationStatus, StorageUnit,
};
use crate::shared::types::{PaginatedResult, PaginationParams};
use crate::shared::utills::KeyedLocks;

pub struct ReservationLedger {
    repos: Arc<dyn RepositoryProvider>,
    event_bus: SharedEventBus,
    reservation_locks: KeyedLocks<Uuid>,
    location_locks: KeyedLocks<Uuid>,
}

impl ReservationLedger {
    pub fn new(repos: Arc<dyn RepositoryProvider>, event_bus: SharedEventBus) -> Self {
        Self {
            repos,
            event_bus,
            reservation_locks: KeyedLocks::new(),
            location_locks: KeyedLocks::new(),
        }
    }

    /// Create a reservation.
    ///
    /// Widget bookings and bookings without a storage start `reserved`.
    /// Staff panel and API bookings that name a storage go straight to
    /// `active` after the same availability check `assign_storage` runs.
    pub async fn create(&self, input: NewReservation) -> DomainResult<Reservation> {
        self.repos
            .tenants()
            .find_by_id(input.tenant_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Tenant", input.tenant_id))?;
        let location = self
            .repos
            .locations()
            .find_by_id(input.location_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Location", input.location_id))?;
        if location.tenant_id != input.tenant_id {
            return Err(DomainError::Validation(format!(
                "location {} does not belong to tenant {}",
                location.id, input.tenant_id
            )));
        }

        let requested_storage = input.storage_id;
        let mut reservation = Reservation::create(input)?;

        let stored = match requested_storage {
            None => self.repos.reservations().insert(reservation).await?,
            Some(storage_id) => {
                let _slot = self.location_locks.lock(&reservation.location_id).await;
                self.check_explicit_storage(&reservation, storage_id).await?;
                reservation.activate(storage_id)?;
                self.repos.reservations().insert(reservation).await?
            }
        };

        info!(
            reservation_id = %stored.id,
            tenant_id = %stored.tenant_id,
            origin = %stored.origin,
            status = %stored.status,
            storage_id = ?stored.storage_id,
            "Reservation created"
        );
        metrics::counter!(
            "kyradi_reservation_transitions_total",
            "to" => stored.status.as_str()
        )
        .increment(1);
        self.event_bus
            .publish(Event::ReservationCreated(ReservationCreatedEvent {
                reservation_id: stored.id,
                tenant_id: stored.tenant_id,
                location_id: stored.location_id,
                status: stored.status,
                origin: stored.origin,
                storage_id: stored.storage_id,
                start_at: stored.start_at,
                end_at: stored.end_at,
            }));

        Ok(stored)
    }

    /// Bind a storage and move `reserved → active`.
    ///
    /// With `storage_id` the unit must be in service at the reservation's
    /// location and free for `[start_at, end_at)`, otherwise `Conflict`.
    /// Without it the first free idle unit by code is taken, or `NotFound`
    /// when none is free.
    pub async fn assign_storage(
        &self,
        reservation_id: Uuid,
        storage_id: Option<Uuid>,
    ) -> DomainResult<Reservation> {
        let _guard = self.reservation_locks.lock(&reservation_id).await;
        let mut reservation = self.load(reservation_id).await?;
        if reservation.status != ReservationStatus::Reserved {
            return Err(DomainError::InvalidTransition {
                entity: "Reservation",
                from: reservation.status.to_string(),
                action: "assign storage to",
            });
        }

        let _slot = self.location_locks.lock(&reservation.location_id).await;
        let chosen = match storage_id {
            Some(id) => {
                self.check_explicit_storage(&reservation, id).await?;
                id
            }
            None => self.auto_select_storage(&reservation).await?,
        };

        let from = reservation.status;
        reservation.activate(chosen)?;
        let stored = self.repos.reservations().update(reservation).await?;
        self.record_transition(&stored, from);
        Ok(stored)
    }

    /// active → completed
    pub async fn complete(&self, reservation_id: Uuid) -> DomainResult<Reservation> {
        self.transition(reservation_id, |r| r.complete()).await
    }

    /// reserved | active → cancelled
    pub async fn cancel(&self, reservation_id: Uuid) -> DomainResult<Reservation> {
        self.transition(reservation_id, |r| r.cancel()).await
    }

    /// active → no_show, only once the start time has passed
    pub async fn mark_no_show(&self, reservation_id: Uuid) -> DomainResult<Reservation> {
        let now = Utc::now();
        self.transition(reservation_id, move |r| r.mark_no_show(now))
            .await
    }

    pub async fn get(&self, reservation_id: Uuid) -> DomainResult<Reservation> {
        self.load(reservation_id).await
    }

    pub async fn list(
        &self,
        filter: &ReservationFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Reservation>> {
        self.repos.reservations().find(filter, page).await
    }

    // ── internals ───────────────────────────────────────────────

    async fn load(&self, reservation_id: Uuid) -> DomainResult<Reservation> {
        self.repos
            .reservations()
            .find_by_id(reservation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Reservation", reservation_id))
    }

    async fn transition<F>(&self, reservation_id: Uuid, apply: F) -> DomainResult<Reservation>
    where
        F: FnOnce(&mut Reservation) -> DomainResult<()> + Send,
    {
        let _guard = self.reservation_locks.lock(&reservation_id).await;
        let mut reservation = self.load(reservation_id).await?;
        let from = reservation.status;
        if let Err(e) = apply(&mut reservation) {
            debug!(%reservation_id, %from, error = %e, "Reservation transition rejected");
            return Err(e);
        }
        let stored = self.repos.reservations().update(reservation).await?;
        self.record_transition(&stored, from);
        Ok(stored)
    }

    async fn check_explicit_storage(
        &self,
        reservation: &Reservation,
        storage_id: Uuid,
    ) -> DomainResult<StorageUnit> {
        let unit = self
            .repos
            .storage_units()
            .find_by_id(storage_id)
            .await?
            .ok_or_else(|| DomainError::not_found("StorageUnit", storage_id))?;

        if unit.location_id != reservation.location_id || unit.tenant_id != reservation.tenant_id
        {
            return Err(DomainError::Conflict(format!(
                "storage {} is not at location {}",
                unit.code, reservation.location_id
            )));
        }
        if !unit.is_idle() {
            return Err(DomainError::Conflict(format!(
                "storage {} is {}",
                unit.code, unit.status
            )));
        }

        let blocking = self
            .repos
            .reservations()
            .find_overlapping(
                storage_id,
                reservation.start_at,
                reservation.end_at,
                Some(reservation.id),
            )
            .await?;
        if let Some(other) = blocking.first() {
            warn!(
                reservation_id = %reservation.id,
                storage = %unit.code,
                held_by = %other.id,
                "Storage unavailable for requested window"
            );
            return Err(DomainError::Conflict(format!(
                "storage {} is already booked by reservation {} for an overlapping window",
                unit.code, other.id
            )));
        }
        Ok(unit)
    }

    async fn auto_select_storage(&self, reservation: &Reservation) -> DomainResult<Uuid> {
        let units = self
            .repos
            .storage_units()
            .find_by_location(reservation.location_id)
            .await?;

        for unit in units.iter().filter(|u| u.is_idle()) {
            let blocking = self
                .repos
                .reservations()
                .find_overlapping(
                    unit.id,
                    reservation.start_at,
                    reservation.end_at,
                    Some(reservation.id),
                )
                .await?;
            if blocking.is_empty() {
                debug!(reservation_id = %reservation.id, storage = %unit.code, "Storage auto-selected");
                return Ok(unit.id);
            }
        }

        Err(DomainError::NotFound {
            entity: "StorageUnit",
            field: "location_id",
            value: format!(
                "{} (no idle storage free between {} and {})",
                reservation.location_id, reservation.start_at, reservation.end_at
            ),
        })
    }

    fn record_transition(&self, stored: &Reservation, from: ReservationStatus) {
        info!(
            reservation_id = %stored.id,
            %from,
            to = %stored.status,
            storage_id = ?stored.storage_id,
            "Reservation transition"
        );
        metrics::counter!(
            "kyradi_reservation_transitions_total",
            "to" => stored.status.as_str()
        )
        .increment(1);
        self.event_bus.publish(Event::ReservationStatusChanged(
            ReservationStatusChangedEvent {
                reservation_id: stored.id,
                tenant_id: stored.tenant_id,
                from,
                to: stored.status,
                storage_id: stored.storage_id,
            },
        ));
        self.reservation_locks.prune();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::Fixture;
    use crate::domain::{ReservationOrigin, StorageStatus};
    use chrono::Duration;

    #[tokio::test]
    async fn widget_booking_starts_reserved_without_storage() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.ledger.create(fx.booking(ReservationOrigin::Widget, 1, 4)).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Reserved);
        assert!(r.storage_id.is_none());
    }

    #[tokio::test]
    async fn widget_booking_cannot_preselect_storage() {
        let fx = Fixture::new(&["A-01"]).await;
        let mut input = fx.booking(ReservationOrigin::Widget, 1, 4);
        input.storage_id = Some(fx.units[0].id);
        assert!(matches!(
            fx.ledger.create(input).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn panel_booking_with_storage_is_active() {
        let fx = Fixture::new(&["A-01"]).await;
        let mut input = fx.booking(ReservationOrigin::Panel, 1, 4);
        input.storage_id = Some(fx.units[0].id);
        let r = fx.ledger.create(input).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Active);
        assert_eq!(r.storage_id, Some(fx.units[0].id));
    }

    #[tokio::test]
    async fn create_rejects_foreign_location() {
        let fx = Fixture::new(&["A-01"]).await;
        let foreign = fx.foreign_location().await;
        let mut input = fx.booking(ReservationOrigin::Panel, 1, 2);
        input.location_id = foreign.id;
        assert!(matches!(
            fx.ledger.create(input).await,
            Err(DomainError::Validation(_))
        ));

        let mut input = fx.booking(ReservationOrigin::Panel, 1, 2);
        input.location_id = uuid::Uuid::new_v4();
        assert!(matches!(
            fx.ledger.create(input).await,
            Err(DomainError::NotFound { entity: "Location", .. })
        ));
    }

    #[tokio::test]
    async fn auto_assignment_takes_lowest_free_code() {
        let fx = Fixture::new(&["B-01", "A-02", "A-01"]).await;
        let first = fx.reserve(1, 4).await;
        let first = fx.ledger.assign_storage(first.id, None).await.unwrap();
        assert_eq!(first.storage_id, Some(fx.unit("A-01").id));

        let second = fx.reserve(2, 4).await;
        let second = fx.ledger.assign_storage(second.id, None).await.unwrap();
        assert_eq!(second.storage_id, Some(fx.unit("A-02").id));
    }

    #[tokio::test]
    async fn auto_assignment_skips_faulty_units() {
        let fx = Fixture::new(&["A-01", "A-02"]).await;
        fx.set_status("A-01", StorageStatus::Faulty).await;
        let r = fx.reserve(1, 2).await;
        let r = fx.ledger.assign_storage(r.id, None).await.unwrap();
        assert_eq!(r.storage_id, Some(fx.unit("A-02").id));
    }

    #[tokio::test]
    async fn auto_assignment_not_found_when_everything_is_taken() {
        let fx = Fixture::new(&["A-01"]).await;
        let a = fx.reserve(1, 4).await;
        fx.ledger.assign_storage(a.id, None).await.unwrap();

        let b = fx.reserve(3, 4).await;
        assert!(matches!(
            fx.ledger.assign_storage(b.id, None).await,
            Err(DomainError::NotFound { .. })
        ));
        assert_eq!(fx.ledger.get(b.id).await.unwrap().status, ReservationStatus::Reserved);
    }

    #[tokio::test]
    async fn explicit_overlap_is_conflict_and_adjacent_window_is_free() {
        let fx = Fixture::new(&["A-01"]).await;
        let storage = fx.unit("A-01").id;

        let a = fx.reserve(1, 4).await;
        let a = fx.ledger.assign_storage(a.id, Some(storage)).await.unwrap();

        let overlapping = fx.reserve(4, 2).await;
        assert!(matches!(
            fx.ledger.assign_storage(overlapping.id, Some(storage)).await,
            Err(DomainError::Conflict(_))
        ));

        // starts exactly when `a` ends
        let mut adjacent = fx.booking(ReservationOrigin::Panel, 0, 1);
        adjacent.start_at = a.end_at;
        adjacent.end_at = a.end_at + Duration::hours(1);
        let adjacent = fx.ledger.create(adjacent).await.unwrap();
        assert!(fx.ledger.assign_storage(adjacent.id, Some(storage)).await.is_ok());
    }

    #[tokio::test]
    async fn explicit_faulty_storage_is_conflict() {
        let fx = Fixture::new(&["A-01"]).await;
        fx.set_status("A-01", StorageStatus::Faulty).await;
        let r = fx.reserve(1, 2).await;
        assert!(matches!(
            fx.ledger.assign_storage(r.id, Some(fx.unit("A-01").id)).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn assign_storage_only_from_reserved() {
        let fx = Fixture::new(&["A-01", "A-02"]).await;
        let r = fx.reserve(1, 2).await;
        fx.ledger.assign_storage(r.id, None).await.unwrap();
        let err = fx.ledger.assign_storage(r.id, None).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                entity: "Reservation",
                from: "active".into(),
                action: "assign storage to",
            }
        );
    }

    #[tokio::test]
    async fn cancel_releases_storage_for_others() {
        let fx = Fixture::new(&["A-01"]).await;
        let storage = fx.unit("A-01").id;
        let a = fx.reserve(1, 4).await;
        fx.ledger.assign_storage(a.id, Some(storage)).await.unwrap();

        let cancelled = fx.ledger.cancel(a.id).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert!(cancelled.storage_id.is_none());

        let b = fx.reserve(2, 1).await;
        assert!(fx.ledger.assign_storage(b.id, Some(storage)).await.is_ok());
    }

    #[tokio::test]
    async fn terminal_reservations_stay_terminal() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.reserve(1, 2).await;
        fx.ledger.assign_storage(r.id, None).await.unwrap();
        fx.ledger.complete(r.id).await.unwrap();

        for result in [
            fx.ledger.cancel(r.id).await,
            fx.ledger.complete(r.id).await,
            fx.ledger.mark_no_show(r.id).await,
        ] {
            assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
        }
        assert_eq!(fx.ledger.get(r.id).await.unwrap().status, ReservationStatus::Completed);
    }

    #[tokio::test]
    async fn no_show_requires_start_time_reached() {
        let fx = Fixture::new(&["A-01", "A-02"]).await;
        let future = fx.reserve(2, 2).await;
        fx.ledger.assign_storage(future.id, None).await.unwrap();
        assert!(matches!(
            fx.ledger.mark_no_show(future.id).await,
            Err(DomainError::InvalidTransition { .. })
        ));

        let started = fx.reserve(-1, 3).await;
        fx.ledger.assign_storage(started.id, None).await.unwrap();
        let no_show = fx.ledger.mark_no_show(started.id).await.unwrap();
        assert_eq!(no_show.status, ReservationStatus::NoShow);
        assert!(no_show.storage_id.is_none());
    }

    #[tokio::test]
    async fn concurrent_assignments_of_same_storage_have_one_winner() {
        let fx = Arc::new(Fixture::new(&["A-01"]).await);
        let storage = fx.unit("A-01").id;
        let a = fx.reserve(1, 4).await;
        let b = fx.reserve(2, 4).await;

        let (ra, rb) = tokio::join!(
            {
                let fx = fx.clone();
                async move { fx.ledger.assign_storage(a.id, Some(storage)).await }
            },
            {
                let fx = fx.clone();
                async move { fx.ledger.assign_storage(b.id, Some(storage)).await }
            }
        );

        let outcomes = [ra.is_ok(), rb.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let loser = if ra.is_err() { ra } else { rb };
        assert!(matches!(loser, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let fx = Fixture::new(&["A-01"]).await;
        let a = fx.reserve(1, 2).await;
        fx.reserve(3, 2).await;
        fx.ledger.assign_storage(a.id, None).await.unwrap();

        let filter = ReservationFilter {
            tenant_id: Some(fx.tenant.id),
            status: Some(ReservationStatus::Active),
            ..Default::default()
        };
        let page = fx.ledger.list(&filter, PaginationParams::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, a.id);
    }

    #[tokio::test]
    async fn transitions_are_published() {
        let fx = Fixture::new(&["A-01"]).await;
        let mut events = fx.event_bus.subscribe();
        let r = fx.reserve(1, 2).await;
        fx.ledger.cancel(r.id).await.unwrap();

        let created = events.recv().await.unwrap();
        assert_eq!(created.event.event_type(), "reservation_created");
        let changed = events.recv().await.unwrap();
        match changed.event {
            Event::ReservationStatusChanged(e) => {
                assert_eq!(e.from, ReservationStatus::Reserved);
                assert_eq!(e.to, ReservationStatus::Cancelled);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
