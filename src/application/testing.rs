//! Shared fixture for service tests: one tenant, one location, a few
//! storage units, and the full service graph over the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::application::catalog::CatalogService;
use crate::application::conversion::ConversionService;
use crate::application::engine::{CheckoutProviders, LifecycleEngine};
use crate::application::events::{create_event_bus, SharedEventBus};
use crate::application::ledger::ReservationLedger;
use crate::application::payments::{DemoCheckoutProvider, GatewayConfig, PaymentGateway};
use crate::application::settlement::SettlementCalculator;
use crate::domain::{
    CheckoutOutcome, CommissionRate, GuestInfo, Location, NewReservation, Payment, PaymentMode,
    RepositoryProvider, Reservation, ReservationOrigin, StorageStatus, StorageUnit, Tenant,
};
use crate::infrastructure::InMemoryRepositoryProvider;
use crate::shared::utills::RetryConfig;

pub(crate) const AMOUNT_MINOR: i64 = 500_000;

pub(crate) struct Fixture {
    pub repos: Arc<InMemoryRepositoryProvider>,
    pub event_bus: SharedEventBus,
    pub engine: Arc<LifecycleEngine>,
    pub catalog: Arc<CatalogService>,
    pub ledger: Arc<ReservationLedger>,
    pub gateway: Arc<PaymentGateway>,
    pub settlement: Arc<SettlementCalculator>,
    pub conversion: Arc<ConversionService>,
    pub demo: Arc<DemoCheckoutProvider>,
    pub tenant: Tenant,
    pub location: Location,
    /// In the order given to the constructor
    pub units: Vec<StorageUnit>,
}

pub(crate) fn fast_gateway_config() -> GatewayConfig {
    GatewayConfig {
        provider_timeout: Duration::from_millis(100),
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2,
            max_delay: Duration::from_millis(5),
        },
        allow_demo_for_live: false,
    }
}

impl Fixture {
    /// CASH tenant at 5%
    pub async fn new(codes: &[&str]) -> Self {
        Self::with_rate("5.0", PaymentMode::Cash, codes).await
    }

    /// GATEWAY_DEMO tenant at 5%
    pub async fn new_gateway(codes: &[&str]) -> Self {
        Self::with_rate("5.0", PaymentMode::GatewayDemo, codes).await
    }

    pub async fn with_rate(rate: &str, mode: PaymentMode, codes: &[&str]) -> Self {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let event_bus = create_event_bus();
        let demo = Arc::new(DemoCheckoutProvider::new("https://pay.example/checkout"));

        let engine = Arc::new(LifecycleEngine::new(
            repos.clone() as Arc<dyn RepositoryProvider>,
            event_bus.clone(),
            fast_gateway_config(),
            CheckoutProviders {
                demo: Some(demo.clone()),
                live: None,
            },
        ));

        let tenant = Tenant::new(
            "Grand Hotel",
            rate.parse::<CommissionRate>().unwrap(),
            mode,
            "TRY",
        );
        repos.tenants().save(tenant.clone()).await.unwrap();
        let location = Location::new(tenant.id, "Lobby");
        repos.locations().save(location.clone()).await.unwrap();

        let mut units = Vec::with_capacity(codes.len());
        for code in codes {
            let unit = StorageUnit::new(&location, *code);
            repos.storage_units().save(unit.clone()).await.unwrap();
            units.push(unit);
        }

        Self {
            catalog: engine.catalog().clone(),
            ledger: engine.ledger().clone(),
            gateway: engine.gateway().clone(),
            settlement: engine.settlement().clone(),
            conversion: engine.conversion().clone(),
            engine,
            repos,
            event_bus,
            demo,
            tenant,
            location,
            units,
        }
    }

    /// Panel-style input starting `start_offset_h` hours from now
    pub fn booking(&self, origin: ReservationOrigin, start_offset_h: i64, duration_h: i64) -> NewReservation {
        let start_at = Utc::now() + chrono::Duration::hours(start_offset_h);
        NewReservation {
            tenant_id: self.tenant.id,
            location_id: self.location.id,
            storage_id: None,
            start_at,
            end_at: start_at + chrono::Duration::hours(duration_h),
            guest: GuestInfo {
                name: "Ayşe Yılmaz".into(),
                email: Some("guest@example.com".into()),
                phone: None,
            },
            amount_minor: AMOUNT_MINOR,
            currency: "TRY".into(),
            origin,
            payment_required: true,
        }
    }

    /// A `reserved` reservation without storage
    pub async fn reserve(&self, start_offset_h: i64, duration_h: i64) -> Reservation {
        self.ledger
            .create(self.booking(ReservationOrigin::Panel, start_offset_h, duration_h))
            .await
            .unwrap()
    }

    /// A reservation activated on the first free unit
    pub async fn active_reservation(&self, start_offset_h: i64, duration_h: i64) -> Reservation {
        let r = self.reserve(start_offset_h, duration_h).await;
        self.ledger.assign_storage(r.id, None).await.unwrap()
    }

    /// Gateway payment taken through the demo checkout
    pub async fn paid_gateway_payment(&self, start_offset_h: i64, duration_h: i64) -> Payment {
        let r = self.active_reservation(start_offset_h, duration_h).await;
        let intent = self.gateway.create_intent(r.id, None).await.unwrap();
        let (_, checkout) = self.gateway.create_checkout_session(intent.id).await.unwrap();
        self.demo
            .finish_checkout(&checkout.session_id, CheckoutOutcome::Success)
            .unwrap();
        self.gateway
            .complete_checkout(&checkout.session_id, CheckoutOutcome::Success, None)
            .await
            .unwrap()
    }

    pub fn unit(&self, code: &str) -> &StorageUnit {
        self.units
            .iter()
            .find(|u| u.code == code)
            .unwrap_or_else(|| panic!("no unit {}", code))
    }

    pub async fn set_status(&self, code: &str, status: StorageStatus) {
        let mut unit = self.unit(code).clone();
        unit.status = status;
        self.repos.storage_units().save(unit).await.unwrap();
    }

    pub async fn set_commission_rate(&self, rate: &str) {
        let mut tenant = self.repos.tenants().find_by_id(self.tenant.id).await.unwrap().unwrap();
        tenant.commission_rate = rate.parse().unwrap();
        self.repos.tenants().save(tenant).await.unwrap();
    }

    /// A location of a second tenant in the same repositories
    pub async fn foreign_location(&self) -> Location {
        let other = Tenant::new("Harbour Inn", CommissionRate::zero(), PaymentMode::Cash, "TRY");
        self.repos.tenants().save(other.clone()).await.unwrap();
        let location = Location::new(other.id, "Reception");
        self.repos.locations().save(location.clone()).await.unwrap();
        location
    }
}
