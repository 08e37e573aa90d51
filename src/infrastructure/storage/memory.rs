//! In-memory repositories for development and testing
//!
//! DashMap holds the rows. Writes that must check other rows first
//! (slot overlap, 1:1 payment per reservation) run behind a per-table
//! write gate so the check and the write are one atomic step.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::payment::PaymentRepository;
use crate::domain::reservation::ReservationRepository;
use crate::domain::settlement::SettlementRepository;
use crate::domain::storage_unit::{LocationRepository, StorageUnitRepository};
use crate::domain::tenant::TenantRepository;
use crate::domain::{
    DomainError, DomainResult, Location, Payment, PaymentStatus, RepositoryProvider, Reservation,
    ReservationFilter, ReservationStatus, Settlement, SettlementFilter, SettlementStatus,
    StorageUnit, Tenant,
};
use crate::shared::types::{PaginatedResult, PaginationParams};

fn gate(lock: &Mutex<()>) -> DomainResult<MutexGuard<'_, ()>> {
    lock.lock()
        .map_err(|_| DomainError::Repository("in-memory write gate poisoned".into()))
}

fn slot_conflict(r: &Reservation, other: &Reservation) -> DomainError {
    DomainError::Conflict(format!(
        "storage {} is already held by reservation {} for an overlapping window",
        r.storage_id.map(|s| s.to_string()).unwrap_or_default(),
        other.id
    ))
}

// ── Tenants / locations / storage units ─────────────────────────

#[derive(Default)]
pub struct InMemoryTenantRepository {
    tenants: DashMap<Uuid, Tenant>,
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Tenant>> {
        Ok(self.tenants.get(&id).map(|t| t.clone()))
    }

    async fn find_all(&self) -> DomainResult<Vec<Tenant>> {
        let mut all: Vec<Tenant> = self.tenants.iter().map(|t| t.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn save(&self, tenant: Tenant) -> DomainResult<()> {
        self.tenants.insert(tenant.id, tenant);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLocationRepository {
    locations: DashMap<Uuid, Location>,
}

#[async_trait]
impl LocationRepository for InMemoryLocationRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Location>> {
        Ok(self.locations.get(&id).map(|l| l.clone()))
    }

    async fn find_by_tenant(&self, tenant_id: Uuid) -> DomainResult<Vec<Location>> {
        let mut found: Vec<Location> = self
            .locations
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .map(|l| l.value().clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn save(&self, location: Location) -> DomainResult<()> {
        self.locations.insert(location.id, location);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStorageUnitRepository {
    units: DashMap<Uuid, StorageUnit>,
}

#[async_trait]
impl StorageUnitRepository for InMemoryStorageUnitRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<StorageUnit>> {
        Ok(self.units.get(&id).map(|u| u.clone()))
    }

    async fn find_by_location(&self, location_id: Uuid) -> DomainResult<Vec<StorageUnit>> {
        let mut found: Vec<StorageUnit> = self
            .units
            .iter()
            .filter(|u| u.location_id == location_id)
            .map(|u| u.value().clone())
            .collect();
        found.sort_by(|a, b| a.code.cmp(&b.code).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn save(&self, unit: StorageUnit) -> DomainResult<()> {
        self.units.insert(unit.id, unit);
        Ok(())
    }
}

// ── Reservations ────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: DashMap<Uuid, Reservation>,
    write_gate: Mutex<()>,
}

impl InMemoryReservationRepository {
    fn ensure_slot_free(&self, r: &Reservation) -> DomainResult<()> {
        let Some(storage_id) = r.storage_id else {
            return Ok(());
        };
        if r.status != ReservationStatus::Active {
            return Ok(());
        }
        let clash = self
            .reservations
            .iter()
            .find(|other| other.id != r.id && other.blocks(storage_id, r.start_at, r.end_at));
        match clash {
            Some(other) => Err(slot_conflict(r, other.value())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn insert(&self, mut reservation: Reservation) -> DomainResult<Reservation> {
        let _gate = gate(&self.write_gate)?;
        if self.reservations.contains_key(&reservation.id) {
            return Err(DomainError::Conflict(format!(
                "reservation {} already exists",
                reservation.id
            )));
        }
        self.ensure_slot_free(&reservation)?;
        reservation.version += 1;
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn update(&self, mut reservation: Reservation) -> DomainResult<Reservation> {
        let _gate = gate(&self.write_gate)?;
        let stored_version = self
            .reservations
            .get(&reservation.id)
            .map(|r| r.version)
            .ok_or_else(|| DomainError::not_found("Reservation", reservation.id))?;
        if stored_version != reservation.version {
            return Err(DomainError::Conflict(format!(
                "reservation {} was modified concurrently (version {} != {})",
                reservation.id, reservation.version, stored_version
            )));
        }
        self.ensure_slot_free(&reservation)?;
        reservation.version += 1;
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn find_overlapping(
        &self,
        storage_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> DomainResult<Vec<Reservation>> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| Some(r.id) != exclude && r.blocks(storage_id, start_at, end_at))
            .map(|r| r.value().clone())
            .collect())
    }

    async fn find(
        &self,
        filter: &ReservationFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Reservation>> {
        let mut found: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| b.start_at.cmp(&a.start_at).then(a.id.cmp(&b.id)));
        Ok(PaginatedResult::from_vec(found, page))
    }
}

// ── Payments ────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    payments: DashMap<Uuid, Payment>,
    write_gate: Mutex<()>,
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, mut payment: Payment) -> DomainResult<Payment> {
        let _gate = gate(&self.write_gate)?;
        let duplicate = self.payments.iter().find(|p| {
            p.id == payment.id
                || p.reservation_id == payment.reservation_id
                || p.provider_intent_id == payment.provider_intent_id
        });
        if let Some(existing) = duplicate {
            return Err(DomainError::Conflict(format!(
                "reservation {} already has payment {}",
                payment.reservation_id, existing.id
            )));
        }
        payment.version += 1;
        self.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Payment>> {
        Ok(self.payments.get(&id).map(|p| p.clone()))
    }

    async fn find_by_reservation(&self, reservation_id: Uuid) -> DomainResult<Option<Payment>> {
        Ok(self
            .payments
            .iter()
            .find(|p| p.reservation_id == reservation_id)
            .map(|p| p.value().clone()))
    }

    async fn find_by_checkout_session(&self, session_id: &str) -> DomainResult<Option<Payment>> {
        Ok(self
            .payments
            .iter()
            .find(|p| {
                p.checkout_session_id.as_deref() == Some(session_id)
                    || p.superseded_attempt(session_id).is_some()
            })
            .map(|p| p.value().clone()))
    }

    async fn find_by_status(&self, status: PaymentStatus) -> DomainResult<Vec<Payment>> {
        let mut found: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.value().clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn update(&self, mut payment: Payment) -> DomainResult<Payment> {
        let _gate = gate(&self.write_gate)?;
        let (stored_version, stored_status) = self
            .payments
            .get(&payment.id)
            .map(|p| (p.version, p.status))
            .ok_or_else(|| DomainError::not_found("Payment", payment.id))?;
        if stored_status == PaymentStatus::Refunded {
            return Err(DomainError::InvalidState(format!(
                "payment {} is refunded and immutable",
                payment.id
            )));
        }
        if stored_version != payment.version {
            return Err(DomainError::Conflict(format!(
                "payment {} was modified concurrently (version {} != {})",
                payment.id, payment.version, stored_version
            )));
        }
        payment.version += 1;
        self.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }
}

// ── Settlements ─────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemorySettlementRepository {
    settlements: DashMap<Uuid, Settlement>,
    /// payment_id → settlement_id; the unique constraint
    by_payment: DashMap<Uuid, Uuid>,
}

#[async_trait]
impl SettlementRepository for InMemorySettlementRepository {
    async fn insert(&self, settlement: Settlement) -> DomainResult<Settlement> {
        match self.by_payment.entry(settlement.payment_id) {
            Entry::Occupied(_) => Err(DomainError::AlreadySettled {
                payment_id: settlement.payment_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                self.settlements.insert(settlement.id, settlement.clone());
                slot.insert(settlement.id);
                Ok(settlement)
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Settlement>> {
        Ok(self.settlements.get(&id).map(|s| s.clone()))
    }

    async fn find_by_payment(&self, payment_id: Uuid) -> DomainResult<Option<Settlement>> {
        let Some(id) = self.by_payment.get(&payment_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.settlements.get(&id).map(|s| s.clone()))
    }

    async fn find(
        &self,
        filter: &SettlementFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Settlement>> {
        let mut found: Vec<Settlement> = self
            .settlements
            .iter()
            .filter(|s| filter.matches(s.value()))
            .map(|s| s.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(PaginatedResult::from_vec(found, page))
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: SettlementStatus,
        to: SettlementStatus,
        settled_at: Option<DateTime<Utc>>,
    ) -> DomainResult<Settlement> {
        let mut stored = self
            .settlements
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Settlement", id))?;
        if stored.status != from {
            return Err(DomainError::Conflict(format!(
                "settlement {} is {}, expected {}",
                id, stored.status, from
            )));
        }
        stored.status = to;
        if settled_at.is_some() {
            stored.settled_at = settled_at;
        }
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}

// ── Provider ────────────────────────────────────────────────────

/// In-memory `RepositoryProvider` for development and testing
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    tenants: InMemoryTenantRepository,
    locations: InMemoryLocationRepository,
    storage_units: InMemoryStorageUnitRepository,
    reservations: InMemoryReservationRepository,
    payments: InMemoryPaymentRepository,
    settlements: InMemorySettlementRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn tenants(&self) -> &dyn TenantRepository {
        &self.tenants
    }

    fn locations(&self) -> &dyn LocationRepository {
        &self.locations
    }

    fn storage_units(&self) -> &dyn StorageUnitRepository {
        &self.storage_units
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }

    fn payments(&self) -> &dyn PaymentRepository {
        &self.payments
    }

    fn settlements(&self) -> &dyn SettlementRepository {
        &self.settlements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::CommissionRate;
    use crate::domain::{CheckoutReference, GuestInfo, NewReservation, PaymentMode, ReservationOrigin};
    use chrono::Duration;

    fn reservation(start: DateTime<Utc>, hours: i64) -> Reservation {
        Reservation::create(NewReservation {
            tenant_id: Uuid::nil(),
            location_id: Uuid::nil(),
            storage_id: None,
            start_at: start,
            end_at: start + Duration::hours(hours),
            guest: GuestInfo {
                name: "Guest".into(),
                email: None,
                phone: None,
            },
            amount_minor: 1_000,
            currency: "TRY".into(),
            origin: ReservationOrigin::Panel,
            payment_required: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn stale_reservation_update_is_rejected() {
        let repo = InMemoryReservationRepository::default();
        let stored = repo.insert(reservation(Utc::now(), 2)).await.unwrap();
        assert_eq!(stored.version, 1);

        let mut first = stored.clone();
        first.cancel().unwrap();
        let updated = repo.update(first).await.unwrap();
        assert_eq!(updated.version, 2);

        let mut stale = stored;
        stale.activate(Uuid::new_v4()).unwrap();
        assert!(matches!(repo.update(stale).await, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn overlapping_activation_is_rejected() {
        let repo = InMemoryReservationRepository::default();
        let storage = Uuid::new_v4();
        let start = Utc::now();

        let mut a = repo.insert(reservation(start, 3)).await.unwrap();
        a.activate(storage).unwrap();
        repo.update(a).await.unwrap();

        let mut b = repo.insert(reservation(start + Duration::hours(2), 3)).await.unwrap();
        b.activate(storage).unwrap();
        assert!(matches!(repo.update(b).await, Err(DomainError::Conflict(_))));

        // back-to-back window is fine
        let mut c = repo.insert(reservation(start + Duration::hours(3), 1)).await.unwrap();
        c.activate(storage).unwrap();
        assert!(repo.update(c).await.is_ok());
    }

    #[tokio::test]
    async fn second_payment_for_reservation_conflicts() {
        let repo = InMemoryPaymentRepository::default();
        let r = reservation(Utc::now(), 1);
        repo.insert(Payment::intent_for(&r, PaymentMode::Cash, "manual"))
            .await
            .unwrap();
        let again = repo
            .insert(Payment::intent_for(&r, PaymentMode::Cash, "manual"))
            .await;
        assert!(matches!(again, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn refunded_payment_is_immutable() {
        let repo = InMemoryPaymentRepository::default();
        let r = reservation(Utc::now(), 1);
        let mut p = repo
            .insert(Payment::intent_for(&r, PaymentMode::Cash, "manual"))
            .await
            .unwrap();
        p.mark_paid(None, Utc::now()).unwrap();
        let mut p = repo.update(p).await.unwrap();
        p.mark_refunded(Utc::now()).unwrap();
        let mut p = repo.update(p).await.unwrap();

        p.failure_reason = Some("tamper".into());
        assert!(matches!(repo.update(p).await, Err(DomainError::InvalidState(_))));
    }

    #[tokio::test]
    async fn superseded_checkout_session_still_resolves() {
        let repo = InMemoryPaymentRepository::default();
        let r = reservation(Utc::now(), 1);
        let mut p = repo
            .insert(Payment::intent_for(&r, PaymentMode::GatewayDemo, "demo"))
            .await
            .unwrap();
        p.attach_checkout(&CheckoutReference {
            session_id: "cs_old".into(),
            redirect_url: "https://pay.example/cs_old".into(),
        })
        .unwrap();
        p.mark_failed("declined").unwrap();
        p.restart_attempt().unwrap();
        let p = repo.update(p).await.unwrap();

        let found = repo.find_by_checkout_session("cs_old").await.unwrap().unwrap();
        assert_eq!(found.id, p.id);
        assert!(repo.find_by_checkout_session("cs_other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settlement_is_write_once_per_payment() {
        let repo = InMemorySettlementRepository::default();
        let r = reservation(Utc::now(), 1);
        let mut p = Payment::intent_for(&r, PaymentMode::Cash, "manual");
        p.mark_paid(None, Utc::now()).unwrap();

        let first = Settlement::for_payment(&p, CommissionRate::zero()).unwrap();
        repo.insert(first).await.unwrap();
        let second = Settlement::for_payment(&p, CommissionRate::zero()).unwrap();
        assert!(matches!(
            repo.insert(second).await,
            Err(DomainError::AlreadySettled { .. })
        ));
        assert!(repo.find_by_payment(p.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn storage_units_are_listed_by_code() {
        let repo = InMemoryStorageUnitRepository::default();
        let location = Location::new(Uuid::new_v4(), "Lobby");
        for code in ["B-02", "A-10", "A-02"] {
            repo.save(StorageUnit::new(&location, code)).await.unwrap();
        }
        let codes: Vec<String> = repo
            .find_by_location(location.id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.code)
            .collect();
        assert_eq!(codes, vec!["A-02", "A-10", "B-02"]);
    }
}
