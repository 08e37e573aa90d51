//! SeaORM implementation of TenantRepository

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::debug;
use uuid::Uuid;

use super::common::{db_err, decode};
use crate::domain::tenant::{Tenant, TenantRepository};
use crate::domain::{CommissionRate, DomainError, DomainResult, PaymentMode};
use crate::infrastructure::database::entities::tenant;

pub struct SeaOrmTenantRepository {
    db: DatabaseConnection,
}

impl SeaOrmTenantRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: tenant::Model) -> DomainResult<Tenant> {
    let commission_rate = m.commission_rate.parse::<CommissionRate>().map_err(|e| {
        DomainError::Repository(format!("tenant {}: {}", m.id, e))
    })?;
    Ok(Tenant {
        id: m.id,
        name: m.name,
        commission_rate,
        payment_mode: decode("payment_mode", &m.payment_mode, PaymentMode::parse)?,
        currency: m.currency,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn to_active(t: &Tenant) -> tenant::ActiveModel {
    tenant::ActiveModel {
        id: Set(t.id),
        name: Set(t.name.clone()),
        commission_rate: Set(t.commission_rate.to_string()),
        payment_mode: Set(t.payment_mode.as_str().to_string()),
        currency: Set(t.currency.clone()),
        created_at: Set(t.created_at),
        updated_at: Set(t.updated_at),
    }
}

#[async_trait]
impl TenantRepository for SeaOrmTenantRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Tenant>> {
        tenant::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_all(&self) -> DomainResult<Vec<Tenant>> {
        tenant::Entity::find()
            .order_by_asc(tenant::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn save(&self, t: Tenant) -> DomainResult<()> {
        debug!(tenant_id = %t.id, "Saving tenant");

        let existing = tenant::Entity::find_by_id(t.id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        let model = to_active(&t);
        if existing.is_some() {
            model.update(&self.db).await.map_err(db_err)?;
        } else {
            tenant::Entity::insert(model)
                .exec_without_returning(&self.db)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }
}
