//! SeaORM implementation of SettlementRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

use super::common::{db_err, decode, is_unique_violation};
use crate::domain::settlement::SettlementRepository;
use crate::domain::{
    CommissionRate, DomainError, DomainResult, Settlement, SettlementFilter, SettlementStatus,
};
use crate::infrastructure::database::entities::settlement;
use crate::shared::types::{PaginatedResult, PaginationParams};

pub struct SeaOrmSettlementRepository {
    db: DatabaseConnection,
}

impl SeaOrmSettlementRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: settlement::Model) -> DomainResult<Settlement> {
    let commission_rate = m
        .commission_rate
        .parse::<CommissionRate>()
        .map_err(|e| DomainError::Repository(format!("settlement {}: {}", m.id, e)))?;
    Ok(Settlement {
        id: m.id,
        payment_id: m.payment_id,
        reservation_id: m.reservation_id,
        tenant_id: m.tenant_id,
        total_amount_minor: m.total_amount_minor,
        tenant_settlement_minor: m.tenant_settlement_minor,
        kyradi_commission_minor: m.kyradi_commission_minor,
        commission_rate,
        currency: m.currency,
        status: decode("settlements.status", &m.status, SettlementStatus::parse)?,
        created_at: m.created_at,
        settled_at: m.settled_at,
        updated_at: m.updated_at,
    })
}

fn filter_condition(filter: &SettlementFilter) -> Condition {
    let mut cond = Condition::all();
    if let Some(tenant_id) = filter.tenant_id {
        cond = cond.add(settlement::Column::TenantId.eq(tenant_id));
    }
    if let Some(reservation_id) = filter.reservation_id {
        cond = cond.add(settlement::Column::ReservationId.eq(reservation_id));
    }
    if let Some(status) = filter.status {
        cond = cond.add(settlement::Column::Status.eq(status.as_str()));
    }
    if let Some(from) = filter.created_from {
        cond = cond.add(settlement::Column::CreatedAt.gte(from));
    }
    if let Some(before) = filter.created_before {
        cond = cond.add(settlement::Column::CreatedAt.lt(before));
    }
    cond
}

#[async_trait]
impl SettlementRepository for SeaOrmSettlementRepository {
    async fn insert(&self, s: Settlement) -> DomainResult<Settlement> {
        debug!(settlement_id = %s.id, payment_id = %s.payment_id, "Inserting settlement");

        let model = settlement::ActiveModel {
            id: Set(s.id),
            payment_id: Set(s.payment_id),
            reservation_id: Set(s.reservation_id),
            tenant_id: Set(s.tenant_id),
            total_amount_minor: Set(s.total_amount_minor),
            tenant_settlement_minor: Set(s.tenant_settlement_minor),
            kyradi_commission_minor: Set(s.kyradi_commission_minor),
            commission_rate: Set(s.commission_rate.to_string()),
            currency: Set(s.currency.clone()),
            status: Set(s.status.as_str().to_string()),
            created_at: Set(s.created_at),
            settled_at: Set(s.settled_at),
            updated_at: Set(s.updated_at),
        };
        settlement::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::AlreadySettled {
                        payment_id: s.payment_id.to_string(),
                    }
                } else {
                    db_err(e)
                }
            })?;
        Ok(s)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Settlement>> {
        settlement::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_payment(&self, payment_id: Uuid) -> DomainResult<Option<Settlement>> {
        settlement::Entity::find()
            .filter(settlement::Column::PaymentId.eq(payment_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find(
        &self,
        filter: &SettlementFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Settlement>> {
        let paginator = settlement::Entity::find()
            .filter(filter_condition(filter))
            .order_by_desc(settlement::Column::CreatedAt)
            .order_by_asc(settlement::Column::Id)
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

    async fn update_status(
        &self,
        id: Uuid,
        from: SettlementStatus,
        to: SettlementStatus,
        settled_at: Option<DateTime<Utc>>,
    ) -> DomainResult<Settlement> {
        debug!(settlement_id = %id, %from, %to, "Updating settlement status");

        let mut update = settlement::Entity::update_many()
            .col_expr(settlement::Column::Status, Expr::value(to.as_str()))
            .col_expr(settlement::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(at) = settled_at {
            update = update.col_expr(settlement::Column::SettledAt, Expr::value(at));
        }
        let result = update
            .filter(settlement::Column::Id.eq(id))
            .filter(settlement::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        let stored = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Settlement", id))?;
        if result.rows_affected == 0 {
            return Err(DomainError::Conflict(format!(
                "settlement {} is {}, expected {}",
                id, stored.status, from
            )));
        }
        Ok(stored)
    }
}
