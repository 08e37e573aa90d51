//! SeaORM implementation of ReservationRepository
//!
//! Activation writes run the overlap query and the write inside one
//! transaction, so two concurrent activations of the same storage cannot
//! both commit. A writer that loses the database lock to the other gets
//! `Conflict`, the same as one that loses the version check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use super::common::{db_err, decode, is_unique_violation, write_err};
use crate::domain::reservation::ReservationRepository;
use crate::domain::{
    DomainError, DomainResult, GuestInfo, Reservation, ReservationFilter, ReservationOrigin,
    ReservationStatus,
};
use crate::infrastructure::database::entities::reservation;
use crate::shared::types::{PaginatedResult, PaginationParams};

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    Ok(Reservation {
        id: m.id,
        tenant_id: m.tenant_id,
        location_id: m.location_id,
        status: decode("reservations.status", &m.status, ReservationStatus::parse)?,
        storage_id: m.storage_id,
        start_at: m.start_at,
        end_at: m.end_at,
        guest: GuestInfo {
            name: m.guest_name,
            email: m.guest_email,
            phone: m.guest_phone,
        },
        amount_minor: m.amount_minor,
        currency: m.currency,
        origin: decode("reservations.origin", &m.origin, ReservationOrigin::parse)?,
        payment_required: m.payment_required,
        version: m.version,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn to_active(r: &Reservation) -> reservation::ActiveModel {
    reservation::ActiveModel {
        id: Set(r.id),
        tenant_id: Set(r.tenant_id),
        location_id: Set(r.location_id),
        status: Set(r.status.as_str().to_string()),
        storage_id: Set(r.storage_id),
        start_at: Set(r.start_at),
        end_at: Set(r.end_at),
        guest_name: Set(r.guest.name.clone()),
        guest_email: Set(r.guest.email.clone()),
        guest_phone: Set(r.guest.phone.clone()),
        amount_minor: Set(r.amount_minor),
        currency: Set(r.currency.clone()),
        origin: Set(r.origin.as_str().to_string()),
        payment_required: Set(r.payment_required),
        version: Set(r.version),
        created_at: Set(r.created_at),
        updated_at: Set(r.updated_at),
    }
}

fn blocking_statuses() -> [&'static str; 2] {
    [
        ReservationStatus::Reserved.as_str(),
        ReservationStatus::Active.as_str(),
    ]
}

fn overlapping_query(
    storage_id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Select<reservation::Entity> {
    let mut query = reservation::Entity::find()
        .filter(reservation::Column::StorageId.eq(storage_id))
        .filter(reservation::Column::Status.is_in(blocking_statuses()))
        .filter(reservation::Column::StartAt.lt(end_at))
        .filter(reservation::Column::EndAt.gt(start_at));
    if let Some(id) = exclude {
        query = query.filter(reservation::Column::Id.ne(id));
    }
    query
}

async fn ensure_slot_free<C: ConnectionTrait>(conn: &C, r: &Reservation) -> DomainResult<()> {
    let Some(storage_id) = r.storage_id else {
        return Ok(());
    };
    if r.status != ReservationStatus::Active {
        return Ok(());
    }
    let clash = overlapping_query(storage_id, r.start_at, r.end_at, Some(r.id))
        .one(conn)
        .await
        .map_err(write_err)?;
    match clash {
        Some(other) => Err(DomainError::Conflict(format!(
            "storage {} is already held by reservation {} for an overlapping window",
            storage_id, other.id
        ))),
        None => Ok(()),
    }
}

fn filter_condition(filter: &ReservationFilter) -> Condition {
    let mut cond = Condition::all();
    if let Some(tenant_id) = filter.tenant_id {
        cond = cond.add(reservation::Column::TenantId.eq(tenant_id));
    }
    if let Some(location_id) = filter.location_id {
        cond = cond.add(reservation::Column::LocationId.eq(location_id));
    }
    if let Some(storage_id) = filter.storage_id {
        cond = cond.add(reservation::Column::StorageId.eq(storage_id));
    }
    if let Some(status) = filter.status {
        cond = cond.add(reservation::Column::Status.eq(status.as_str()));
    }
    if let Some(origin) = filter.origin {
        cond = cond.add(reservation::Column::Origin.eq(origin.as_str()));
    }
    if let Some(from) = filter.starts_from {
        cond = cond.add(reservation::Column::StartAt.gte(from));
    }
    if let Some(before) = filter.starts_before {
        cond = cond.add(reservation::Column::StartAt.lt(before));
    }
    cond
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn insert(&self, mut r: Reservation) -> DomainResult<Reservation> {
        debug!(reservation_id = %r.id, status = %r.status, "Inserting reservation");

        let txn = self.db.begin().await.map_err(write_err)?;
        ensure_slot_free(&txn, &r).await?;
        r.version += 1;
        reservation::Entity::insert(to_active(&r))
            .exec_without_returning(&txn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::Conflict(format!("reservation {} already exists", r.id))
                } else {
                    write_err(e)
                }
            })?;
        txn.commit().await.map_err(write_err)?;
        Ok(r)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn update(&self, mut r: Reservation) -> DomainResult<Reservation> {
        debug!(
            reservation_id = %r.id,
            status = %r.status,
            version = r.version,
            "Updating reservation"
        );

        let expected = r.version;
        let txn = self.db.begin().await.map_err(write_err)?;
        ensure_slot_free(&txn, &r).await?;
        r.version += 1;
        let result = reservation::Entity::update_many()
            .set(to_active(&r))
            .filter(reservation::Column::Id.eq(r.id))
            .filter(reservation::Column::Version.eq(expected))
            .exec(&txn)
            .await
            .map_err(write_err)?;

        if result.rows_affected == 0 {
            let exists = reservation::Entity::find_by_id(r.id)
                .one(&txn)
                .await
                .map_err(write_err)?;
            return Err(match exists {
                None => DomainError::not_found("Reservation", r.id),
                Some(stored) => DomainError::Conflict(format!(
                    "reservation {} was modified concurrently (version {} != {})",
                    r.id, expected, stored.version
                )),
            });
        }
        txn.commit().await.map_err(write_err)?;
        Ok(r)
    }

    async fn find_overlapping(
        &self,
        storage_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> DomainResult<Vec<Reservation>> {
        overlapping_query(storage_id, start_at, end_at, exclude)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn find(
        &self,
        filter: &ReservationFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Reservation>> {
        let paginator = reservation::Entity::find()
            .filter(filter_condition(filter))
            .order_by_desc(reservation::Column::StartAt)
            .order_by_asc(reservation::Column::Id)
            .paginate(&self.db, u64::from(page.limit));

        let total = paginator.num_items().await.map_err(db_err)?;
        let items = paginator
            .fetch_page(u64::from(page.page - 1))
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(PaginatedResult::new(items, total, page.page, page.limit))
    }
}
