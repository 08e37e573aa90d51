//! SeaORM implementation of PaymentRepository

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use super::common::{db_err, decode, is_unique_violation, write_err};
use crate::domain::payment::PaymentRepository;
use crate::domain::{
    DomainError, DomainResult, Payment, PaymentAttempt, PaymentMode, PaymentStatus,
};
use crate::infrastructure::database::entities::{payment, payment_attempt};

pub struct SeaOrmPaymentRepository {
    db: DatabaseConnection,
}

impl SeaOrmPaymentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(
    m: payment::Model,
    attempts: Vec<payment_attempt::Model>,
) -> DomainResult<Payment> {
    Ok(Payment {
        id: m.id,
        reservation_id: m.reservation_id,
        tenant_id: m.tenant_id,
        provider: m.provider,
        mode: decode("payments.mode", &m.mode, PaymentMode::parse)?,
        status: decode("payments.status", &m.status, PaymentStatus::parse)?,
        amount_minor: m.amount_minor,
        currency: m.currency,
        provider_intent_id: m.provider_intent_id,
        checkout_session_id: m.checkout_session_id,
        checkout_url: m.checkout_url,
        transaction_id: m.transaction_id,
        failure_reason: m.failure_reason,
        paid_at: m.paid_at,
        refunded_at: m.refunded_at,
        superseded_attempts: attempts
            .into_iter()
            .map(|a| PaymentAttempt {
                provider_intent_id: a.provider_intent_id,
                checkout_session_id: a.checkout_session_id,
                failure_reason: a.failure_reason,
                superseded_at: a.superseded_at,
            })
            .collect(),
        version: m.version,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

/// Attach superseded attempts to loaded rows, one query for all of them
async fn with_attempts<C: ConnectionTrait>(
    conn: &C,
    models: Vec<payment::Model>,
) -> DomainResult<Vec<Payment>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut by_payment: HashMap<Uuid, Vec<payment_attempt::Model>> = HashMap::new();
    for attempt in payment_attempt::Entity::find()
        .filter(payment_attempt::Column::PaymentId.is_in(ids))
        .order_by_asc(payment_attempt::Column::SupersededAt)
        .all(conn)
        .await
        .map_err(db_err)?
    {
        by_payment.entry(attempt.payment_id).or_default().push(attempt);
    }

    models
        .into_iter()
        .map(|m| {
            let attempts = by_payment.remove(&m.id).unwrap_or_default();
            model_to_domain(m, attempts)
        })
        .collect()
}

async fn with_attempts_one<C: ConnectionTrait>(
    conn: &C,
    model: Option<payment::Model>,
) -> DomainResult<Option<Payment>> {
    match model {
        Some(m) => Ok(with_attempts(conn, vec![m]).await?.pop()),
        None => Ok(None),
    }
}

/// Insert attempts not yet stored. Attempts are append-only.
async fn save_new_attempts<C: ConnectionTrait>(conn: &C, p: &Payment) -> DomainResult<()> {
    if p.superseded_attempts.is_empty() {
        return Ok(());
    }
    let stored: HashSet<String> = payment_attempt::Entity::find()
        .filter(payment_attempt::Column::PaymentId.eq(p.id))
        .all(conn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|a| a.provider_intent_id)
        .collect();

    for attempt in p
        .superseded_attempts
        .iter()
        .filter(|a| !stored.contains(&a.provider_intent_id))
    {
        payment_attempt::Entity::insert(payment_attempt::ActiveModel {
            id: Set(Uuid::new_v4()),
            payment_id: Set(p.id),
            provider_intent_id: Set(attempt.provider_intent_id.clone()),
            checkout_session_id: Set(attempt.checkout_session_id.clone()),
            failure_reason: Set(attempt.failure_reason.clone()),
            superseded_at: Set(attempt.superseded_at),
        })
        .exec_without_returning(conn)
        .await
        .map_err(write_err)?;
    }
    Ok(())
}

fn to_active(p: &Payment) -> payment::ActiveModel {
    payment::ActiveModel {
        id: Set(p.id),
        reservation_id: Set(p.reservation_id),
        tenant_id: Set(p.tenant_id),
        provider: Set(p.provider.clone()),
        mode: Set(p.mode.as_str().to_string()),
        status: Set(p.status.as_str().to_string()),
        amount_minor: Set(p.amount_minor),
        currency: Set(p.currency.clone()),
        provider_intent_id: Set(p.provider_intent_id.clone()),
        checkout_session_id: Set(p.checkout_session_id.clone()),
        checkout_url: Set(p.checkout_url.clone()),
        transaction_id: Set(p.transaction_id.clone()),
        failure_reason: Set(p.failure_reason.clone()),
        paid_at: Set(p.paid_at),
        refunded_at: Set(p.refunded_at),
        version: Set(p.version),
        created_at: Set(p.created_at),
        updated_at: Set(p.updated_at),
    }
}

#[async_trait]
impl PaymentRepository for SeaOrmPaymentRepository {
    async fn insert(&self, mut p: Payment) -> DomainResult<Payment> {
        debug!(payment_id = %p.id, reservation_id = %p.reservation_id, "Inserting payment");

        p.version += 1;
        payment::Entity::insert(to_active(&p))
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::Conflict(format!(
                        "reservation {} already has a payment",
                        p.reservation_id
                    ))
                } else {
                    db_err(e)
                }
            })?;
        Ok(p)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Payment>> {
        let model = payment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        with_attempts_one(&self.db, model).await
    }

    async fn find_by_reservation(&self, reservation_id: Uuid) -> DomainResult<Option<Payment>> {
        let model = payment::Entity::find()
            .filter(payment::Column::ReservationId.eq(reservation_id))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        with_attempts_one(&self.db, model).await
    }

    async fn find_by_checkout_session(&self, session_id: &str) -> DomainResult<Option<Payment>> {
        let current = payment::Entity::find()
            .filter(payment::Column::CheckoutSessionId.eq(session_id))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if current.is_some() {
            return with_attempts_one(&self.db, current).await;
        }

        let Some(attempt) = payment_attempt::Entity::find()
            .filter(payment_attempt::Column::CheckoutSessionId.eq(session_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        self.find_by_id(attempt.payment_id).await
    }

    async fn find_by_status(&self, status: PaymentStatus) -> DomainResult<Vec<Payment>> {
        let models = payment::Entity::find()
            .filter(payment::Column::Status.eq(status.as_str()))
            .order_by_asc(payment::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        with_attempts(&self.db, models).await
    }

    async fn update(&self, mut p: Payment) -> DomainResult<Payment> {
        debug!(
            payment_id = %p.id,
            status = %p.status,
            version = p.version,
            "Updating payment"
        );

        let txn = self.db.begin().await.map_err(write_err)?;
        let stored = payment::Entity::find_by_id(p.id)
            .one(&txn)
            .await
            .map_err(write_err)?
            .ok_or_else(|| DomainError::not_found("Payment", p.id))?;

        if stored.status == PaymentStatus::Refunded.as_str() {
            return Err(DomainError::InvalidState(format!(
                "payment {} is refunded and immutable",
                p.id
            )));
        }
        if stored.version != p.version {
            return Err(DomainError::Conflict(format!(
                "payment {} was modified concurrently (version {} != {})",
                p.id, p.version, stored.version
            )));
        }

        let expected = p.version;
        p.version += 1;
        let result = payment::Entity::update_many()
            .set(to_active(&p))
            .filter(payment::Column::Id.eq(p.id))
            .filter(payment::Column::Version.eq(expected))
            .exec(&txn)
            .await
            .map_err(write_err)?;
        if result.rows_affected == 0 {
            return Err(DomainError::Conflict(format!(
                "payment {} was modified concurrently",
                p.id
            )));
        }
        save_new_attempts(&txn, &p).await?;
        txn.commit().await.map_err(write_err)?;
        Ok(p)
    }
}
