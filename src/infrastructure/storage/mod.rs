//! In-memory storage backend

mod memory;

pub use memory::{
    InMemoryLocationRepository, InMemoryPaymentRepository, InMemoryRepositoryProvider,
    InMemoryReservationRepository, InMemorySettlementRepository, InMemoryStorageUnitRepository,
    InMemoryTenantRepository,
};
