//! Reservation repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{Reservation, ReservationFilter};
use crate::domain::DomainResult;
use crate::shared::types::{PaginatedResult, PaginationParams};

/// Persistence for reservations.
///
/// Both write methods enforce slot exclusivity atomically with the write:
/// when the stored result is `active` with a storage bound, any other
/// `reserved | active` reservation overlapping the same storage and window
/// makes the write fail with `Conflict`.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Save a new reservation
    async fn insert(&self, reservation: Reservation) -> DomainResult<Reservation>;

    /// Find reservation by ID
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>>;

    /// Compare-and-swap update.
    ///
    /// `reservation.version` must equal the stored version, otherwise the
    /// write is rejected with `Conflict`. Returns the stored row with the
    /// bumped version.
    async fn update(&self, reservation: Reservation) -> DomainResult<Reservation>;

    /// Reservations blocking `storage_id` anywhere in `[start_at, end_at)`
    async fn find_overlapping(
        &self,
        storage_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> DomainResult<Vec<Reservation>>;

    /// Filtered listing, newest `start_at` first
    async fn find(
        &self,
        filter: &ReservationFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Reservation>>;
}
