//! Lifecycle engine facade
//!
//! Single entry point for the interface layer. Wires the ledger, gateway,
//! settlement calculator and conversion service over one repository
//! provider and event bus, and enforces tenant scoping on every call.

use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use crate::application::catalog::{CatalogService, NewTenant, TenantUpdate};
use crate::application::conversion::{ConversionResult, ConversionService};
use crate::application::events::SharedEventBus;
use crate::application::ledger::ReservationLedger;
use crate::application::payments::{
    CaptureOutcome, CheckoutProvider, GatewayConfig, PaymentGateway,
};
use crate::application::settlement::SettlementCalculator;
use crate::domain::{
    CheckoutOutcome, CheckoutReference, DomainError, DomainResult, Location, NewReservation,
    Payment, RepositoryProvider, Reservation, ReservationFilter, Settlement, SettlementFilter,
    SettlementStatus, StorageStatus, StorageUnit, Tenant,
};
use crate::shared::types::{PaginatedResult, PaginationParams};

/// Who is calling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    /// Platform operator; sees every tenant
    Platform,
    /// Hotel staff or integration; limited to one tenant
    Tenant(Uuid),
}

impl AccessScope {
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            AccessScope::Platform => None,
            AccessScope::Tenant(id) => Some(*id),
        }
    }

    /// Allow access to a record owned by `owner`
    pub fn check(&self, owner: Uuid) -> DomainResult<()> {
        match self {
            AccessScope::Tenant(id) if *id != owner => Err(DomainError::Unauthorized(format!(
                "record belongs to another tenant ({})",
                owner
            ))),
            _ => Ok(()),
        }
    }

    pub fn require_platform(&self, action: &str) -> DomainResult<()> {
        match self {
            AccessScope::Platform => Ok(()),
            AccessScope::Tenant(_) => Err(DomainError::Unauthorized(format!(
                "{} requires platform access",
                action
            ))),
        }
    }

    /// Narrow a list filter's tenant to the caller's own
    fn scope_tenant(&self, requested: Option<Uuid>) -> DomainResult<Option<Uuid>> {
        match (self, requested) {
            (AccessScope::Platform, requested) => Ok(requested),
            (AccessScope::Tenant(own), None) => Ok(Some(*own)),
            (AccessScope::Tenant(own), Some(requested)) => {
                self.check(requested)?;
                Ok(Some(*own))
            }
        }
    }
}

/// Checkout providers installed at startup
#[derive(Default, Clone)]
pub struct CheckoutProviders {
    pub demo: Option<Arc<dyn CheckoutProvider>>,
    pub live: Option<Arc<dyn CheckoutProvider>>,
}

pub struct LifecycleEngine {
    repos: Arc<dyn RepositoryProvider>,
    event_bus: SharedEventBus,
    catalog: Arc<CatalogService>,
    ledger: Arc<ReservationLedger>,
    gateway: Arc<PaymentGateway>,
    settlement: Arc<SettlementCalculator>,
    conversion: Arc<ConversionService>,
}

impl LifecycleEngine {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        event_bus: SharedEventBus,
        gateway_config: GatewayConfig,
        providers: CheckoutProviders,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(repos.clone()));
        let ledger = Arc::new(ReservationLedger::new(repos.clone(), event_bus.clone()));
        let settlement = Arc::new(SettlementCalculator::new(repos.clone(), event_bus.clone()));

        let mut gateway = PaymentGateway::new(
            repos.clone(),
            event_bus.clone(),
            settlement.clone(),
            gateway_config,
        );
        if let Some(demo) = providers.demo {
            gateway = gateway.with_demo_provider(demo);
        }
        if let Some(live) = providers.live {
            gateway = gateway.with_live_provider(live);
        }
        let gateway = Arc::new(gateway);

        let conversion = Arc::new(ConversionService::new(
            ledger.clone(),
            gateway.clone(),
            event_bus.clone(),
        ));

        Self {
            repos,
            event_bus,
            catalog,
            ledger,
            gateway,
            settlement,
            conversion,
        }
    }

    pub fn repos(&self) -> &Arc<dyn RepositoryProvider> {
        &self.repos
    }

    pub fn event_bus(&self) -> &SharedEventBus {
        &self.event_bus
    }

    pub fn catalog(&self) -> &Arc<CatalogService> {
        &self.catalog
    }

    pub fn ledger(&self) -> &Arc<ReservationLedger> {
        &self.ledger
    }

    pub fn gateway(&self) -> &Arc<PaymentGateway> {
        &self.gateway
    }

    pub fn settlement(&self) -> &Arc<SettlementCalculator> {
        &self.settlement
    }

    pub fn conversion(&self) -> &Arc<ConversionService> {
        &self.conversion
    }

    // ── Reservations ────────────────────────────────────────────

    pub async fn list_reservations(
        &self,
        scope: AccessScope,
        mut filter: ReservationFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Reservation>> {
        filter.tenant_id = scope.scope_tenant(filter.tenant_id)?;
        self.ledger.list(&filter, page).await
    }

    pub async fn get_reservation(&self, scope: AccessScope, id: Uuid) -> DomainResult<Reservation> {
        let reservation = self.ledger.get(id).await?;
        scope.check(reservation.tenant_id)?;
        Ok(reservation)
    }

    pub async fn create_reservation(
        &self,
        scope: AccessScope,
        input: NewReservation,
    ) -> DomainResult<Reservation> {
        scope.check(input.tenant_id)?;
        self.ledger.create(input).await
    }

    pub async fn convert(
        &self,
        scope: AccessScope,
        reservation_id: Uuid,
        storage_id: Option<Uuid>,
    ) -> DomainResult<ConversionResult> {
        self.get_reservation(scope, reservation_id).await?;
        self.conversion.convert(reservation_id, storage_id).await
    }

    pub async fn complete_reservation(
        &self,
        scope: AccessScope,
        reservation_id: Uuid,
    ) -> DomainResult<Reservation> {
        self.get_reservation(scope, reservation_id).await?;
        self.ledger.complete(reservation_id).await
    }

    /// Cancel the reservation and its open payment, if any
    pub async fn cancel_reservation(
        &self,
        scope: AccessScope,
        reservation_id: Uuid,
    ) -> DomainResult<Reservation> {
        self.get_reservation(scope, reservation_id).await?;
        let reservation = self.ledger.cancel(reservation_id).await?;
        self.release_payment(reservation_id).await;
        Ok(reservation)
    }

    pub async fn mark_no_show(
        &self,
        scope: AccessScope,
        reservation_id: Uuid,
    ) -> DomainResult<Reservation> {
        self.get_reservation(scope, reservation_id).await?;
        let reservation = self.ledger.mark_no_show(reservation_id).await?;
        self.release_payment(reservation_id).await;
        Ok(reservation)
    }

    async fn release_payment(&self, reservation_id: Uuid) {
        if let Err(e) = self.gateway.cancel_for_reservation(reservation_id).await {
            error!(%reservation_id, error = %e, "Failed to cancel payment of ended reservation");
        }
    }

    // ── Payments ────────────────────────────────────────────────

    pub async fn get_payment(&self, scope: AccessScope, payment_id: Uuid) -> DomainResult<Payment> {
        let payment = self.gateway.get(payment_id).await?;
        scope.check(payment.tenant_id)?;
        Ok(payment)
    }

    pub async fn payment_for_reservation(
        &self,
        scope: AccessScope,
        reservation_id: Uuid,
    ) -> DomainResult<Option<Payment>> {
        self.get_reservation(scope, reservation_id).await?;
        self.gateway.find_by_reservation(reservation_id).await
    }

    pub async fn capture(&self, scope: AccessScope, payment_id: Uuid) -> DomainResult<CaptureOutcome> {
        self.get_payment(scope, payment_id).await?;
        self.gateway.capture(payment_id).await
    }

    pub async fn confirm_pos(&self, scope: AccessScope, payment_id: Uuid) -> DomainResult<Payment> {
        self.get_payment(scope, payment_id).await?;
        self.gateway.confirm_pos(payment_id).await
    }

    pub async fn create_checkout_session(
        &self,
        scope: AccessScope,
        payment_id: Uuid,
    ) -> DomainResult<(Payment, CheckoutReference)> {
        self.get_payment(scope, payment_id).await?;
        self.gateway.create_checkout_session(payment_id).await
    }

    /// Provider callback
    pub async fn complete_checkout(
        &self,
        scope: AccessScope,
        session_id: &str,
        outcome: CheckoutOutcome,
        transaction_id: Option<String>,
    ) -> DomainResult<Payment> {
        scope.require_platform("completing a checkout")?;
        self.gateway
            .complete_checkout(session_id, outcome, transaction_id)
            .await
    }

    pub async fn refund_payment(&self, scope: AccessScope, payment_id: Uuid) -> DomainResult<Payment> {
        self.get_payment(scope, payment_id).await?;
        self.gateway.refund(payment_id).await
    }

    pub async fn reconcile_payment(
        &self,
        scope: AccessScope,
        payment_id: Uuid,
    ) -> DomainResult<Payment> {
        self.get_payment(scope, payment_id).await?;
        self.gateway.reconcile(payment_id).await
    }

    // ── Settlements ─────────────────────────────────────────────

    pub async fn list_settlements(
        &self,
        scope: AccessScope,
        mut filter: SettlementFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Settlement>> {
        filter.tenant_id = scope.scope_tenant(filter.tenant_id)?;
        self.settlement.list(&filter, page).await
    }

    pub async fn get_settlement(&self, scope: AccessScope, id: Uuid) -> DomainResult<Settlement> {
        let settlement = self.settlement.get(id).await?;
        scope.check(settlement.tenant_id)?;
        Ok(settlement)
    }

    pub async fn update_settlement_status(
        &self,
        scope: AccessScope,
        id: Uuid,
        status: SettlementStatus,
    ) -> DomainResult<Settlement> {
        scope.require_platform("changing a settlement status")?;
        self.settlement.update_settlement_status(id, status).await
    }

    // ── Catalog ─────────────────────────────────────────────────

    pub async fn create_tenant(&self, scope: AccessScope, input: NewTenant) -> DomainResult<Tenant> {
        scope.require_platform("creating a tenant")?;
        self.catalog.create_tenant(input).await
    }

    pub async fn update_tenant(
        &self,
        scope: AccessScope,
        tenant_id: Uuid,
        update: TenantUpdate,
    ) -> DomainResult<Tenant> {
        scope.require_platform("changing tenant settings")?;
        self.catalog.update_tenant(tenant_id, update).await
    }

    pub async fn get_tenant(&self, scope: AccessScope, tenant_id: Uuid) -> DomainResult<Tenant> {
        scope.check(tenant_id)?;
        self.catalog.tenant(tenant_id).await
    }

    pub async fn list_tenants(&self, scope: AccessScope) -> DomainResult<Vec<Tenant>> {
        match scope {
            AccessScope::Platform => self.catalog.list_tenants().await,
            AccessScope::Tenant(id) => Ok(vec![self.catalog.tenant(id).await?]),
        }
    }

    pub async fn create_location(
        &self,
        scope: AccessScope,
        tenant_id: Uuid,
        name: &str,
    ) -> DomainResult<Location> {
        scope.check(tenant_id)?;
        self.catalog.create_location(tenant_id, name).await
    }

    pub async fn list_locations(&self, scope: AccessScope, tenant_id: Uuid) -> DomainResult<Vec<Location>> {
        scope.check(tenant_id)?;
        self.catalog.list_locations(tenant_id).await
    }

    pub async fn create_storage_unit(
        &self,
        scope: AccessScope,
        location_id: Uuid,
        code: &str,
    ) -> DomainResult<StorageUnit> {
        scope.check(self.catalog.location(location_id).await?.tenant_id)?;
        self.catalog.create_storage_unit(location_id, code).await
    }

    pub async fn list_storage_units(
        &self,
        scope: AccessScope,
        location_id: Uuid,
    ) -> DomainResult<Vec<StorageUnit>> {
        scope.check(self.catalog.location(location_id).await?.tenant_id)?;
        self.catalog.list_storage_units(location_id).await
    }

    pub async fn set_storage_status(
        &self,
        scope: AccessScope,
        storage_id: Uuid,
        status: StorageStatus,
    ) -> DomainResult<StorageUnit> {
        scope.check(self.catalog.storage_unit(storage_id).await?.tenant_id)?;
        self.catalog.set_storage_status(storage_id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::Fixture;
    use crate::domain::{PaymentMode, PaymentStatus, ReservationOrigin, ReservationStatus};

    #[test]
    fn tenant_scope_narrows_filters() {
        let own = Uuid::new_v4();
        let scope = AccessScope::Tenant(own);
        assert_eq!(scope.scope_tenant(None).unwrap(), Some(own));
        assert_eq!(scope.scope_tenant(Some(own)).unwrap(), Some(own));
        assert!(matches!(
            scope.scope_tenant(Some(Uuid::new_v4())),
            Err(DomainError::Unauthorized(_))
        ));
        assert_eq!(AccessScope::Platform.scope_tenant(None).unwrap(), None);
    }

    #[tokio::test]
    async fn other_tenant_cannot_touch_records() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.reserve(1, 2).await;
        let stranger = AccessScope::Tenant(Uuid::new_v4());

        assert!(matches!(
            fx.engine.get_reservation(stranger, r.id).await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.engine.cancel_reservation(stranger, r.id).await,
            Err(DomainError::Unauthorized(_))
        ));
        assert_eq!(fx.ledger.get(r.id).await.unwrap().status, ReservationStatus::Reserved);

        let mut input = fx.booking(ReservationOrigin::Api, 1, 2);
        input.tenant_id = Uuid::new_v4();
        assert!(matches!(
            fx.engine.create_reservation(AccessScope::Tenant(fx.tenant.id), input).await,
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn platform_only_operations() {
        let fx = Fixture::new(&["A-01"]).await;
        let own = AccessScope::Tenant(fx.tenant.id);
        assert!(matches!(
            fx.engine
                .complete_checkout(own, "cs_x", CheckoutOutcome::Success, None)
                .await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.engine
                .update_settlement_status(own, Uuid::new_v4(), SettlementStatus::Settled)
                .await,
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn scenario_a_capture_settles_at_tenant_rate() {
        let fx = Fixture::with_rate("5.0", PaymentMode::Cash, &["A-01"]).await;
        let scope = AccessScope::Tenant(fx.tenant.id);
        let r = fx.reserve(1, 3).await;
        let converted = fx.engine.convert(scope, r.id, None).await.unwrap();
        let payment = converted.payment.unwrap();

        fx.engine.confirm_pos(scope, payment.id).await.unwrap();
        let page = fx
            .engine
            .list_settlements(scope, SettlementFilter::default(), PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        let s = &page.items[0];
        assert_eq!(s.total_amount_minor, 500_000);
        assert_eq!(s.kyradi_commission_minor, 25_000);
        assert_eq!(s.tenant_settlement_minor, 475_000);
    }

    #[tokio::test]
    async fn scenario_b_double_confirmation_is_idempotent() {
        let fx = Fixture::new(&["A-01"]).await;
        let scope = AccessScope::Tenant(fx.tenant.id);
        let r = fx.reserve(1, 3).await;
        let payment = fx.engine.convert(scope, r.id, None).await.unwrap().payment.unwrap();

        let first = fx.engine.confirm_pos(scope, payment.id).await.unwrap();
        let second = fx.engine.confirm_pos(scope, payment.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.status, PaymentStatus::Paid);

        let page = fx
            .engine
            .list_settlements(scope, SettlementFilter::default(), PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn scenario_d_cancel_after_completion_is_rejected() {
        let fx = Fixture::new(&["A-01"]).await;
        let scope = AccessScope::Platform;
        let r = fx.active_reservation(1, 2).await;
        let completed = fx.engine.complete_reservation(scope, r.id).await.unwrap();

        assert!(matches!(
            fx.engine.cancel_reservation(scope, r.id).await,
            Err(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(fx.engine.get_reservation(scope, r.id).await.unwrap(), completed);
    }

    #[tokio::test]
    async fn cancelling_reservation_cancels_its_open_payment() {
        let fx = Fixture::new(&["A-01"]).await;
        let scope = AccessScope::Tenant(fx.tenant.id);
        let r = fx.reserve(1, 2).await;
        let payment = fx.engine.convert(scope, r.id, None).await.unwrap().payment.unwrap();

        fx.engine.cancel_reservation(scope, r.id).await.unwrap();
        assert_eq!(
            fx.engine.get_payment(scope, payment.id).await.unwrap().status,
            PaymentStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn tenant_listing_is_limited_to_own_records() {
        let fx = Fixture::new(&["A-01"]).await;
        let other_location = fx.foreign_location().await;
        fx.reserve(1, 2).await;
        let mut foreign = fx.booking(ReservationOrigin::Panel, 1, 2);
        foreign.tenant_id = other_location.tenant_id;
        foreign.location_id = other_location.id;
        fx.ledger.create(foreign).await.unwrap();

        let own = fx
            .engine
            .list_reservations(
                AccessScope::Tenant(fx.tenant.id),
                ReservationFilter::default(),
                PaginationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(own.total, 1);
        assert_eq!(own.items[0].tenant_id, fx.tenant.id);

        let all = fx
            .engine
            .list_reservations(
                AccessScope::Platform,
                ReservationFilter::default(),
                PaginationParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(all.total, 2);
    }
}
