//! SeaORM implementations of LocationRepository and StorageUnitRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

use super::common::{db_err, decode, is_unique_violation};
use crate::domain::storage_unit::{LocationRepository, StorageUnitRepository};
use crate::domain::{DomainError, DomainResult, Location, StorageStatus, StorageUnit};
use crate::infrastructure::database::entities::{location, storage_unit};

// ── Locations ───────────────────────────────────────────────────

pub struct SeaOrmLocationRepository {
    db: DatabaseConnection,
}

impl SeaOrmLocationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn location_from_model(m: location::Model) -> Location {
    Location {
        id: m.id,
        tenant_id: m.tenant_id,
        name: m.name,
        created_at: m.created_at,
    }
}

#[async_trait]
impl LocationRepository for SeaOrmLocationRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Location>> {
        let model = location::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(location_from_model))
    }

    async fn find_by_tenant(&self, tenant_id: Uuid) -> DomainResult<Vec<Location>> {
        let models = location::Entity::find()
            .filter(location::Column::TenantId.eq(tenant_id))
            .order_by_asc(location::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(location_from_model).collect())
    }

    async fn save(&self, l: Location) -> DomainResult<()> {
        debug!(location_id = %l.id, "Saving location");

        let existing = location::Entity::find_by_id(l.id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        let model = location::ActiveModel {
            id: Set(l.id),
            tenant_id: Set(l.tenant_id),
            name: Set(l.name),
            created_at: Set(l.created_at),
        };
        if existing.is_some() {
            model.update(&self.db).await.map_err(db_err)?;
        } else {
            location::Entity::insert(model)
                .exec_without_returning(&self.db)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }
}

// ── Storage units ───────────────────────────────────────────────

pub struct SeaOrmStorageUnitRepository {
    db: DatabaseConnection,
}

impl SeaOrmStorageUnitRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn unit_from_model(m: storage_unit::Model) -> DomainResult<StorageUnit> {
    Ok(StorageUnit {
        id: m.id,
        tenant_id: m.tenant_id,
        location_id: m.location_id,
        status: decode("storage_units.status", &m.status, StorageStatus::parse)?,
        code: m.code,
        created_at: m.created_at,
    })
}

#[async_trait]
impl StorageUnitRepository for SeaOrmStorageUnitRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<StorageUnit>> {
        storage_unit::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(unit_from_model)
            .transpose()
    }

    async fn find_by_location(&self, location_id: Uuid) -> DomainResult<Vec<StorageUnit>> {
        storage_unit::Entity::find()
            .filter(storage_unit::Column::LocationId.eq(location_id))
            .order_by_asc(storage_unit::Column::Code)
            .order_by_asc(storage_unit::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(unit_from_model)
            .collect()
    }

    async fn save(&self, u: StorageUnit) -> DomainResult<()> {
        debug!(storage_id = %u.id, code = %u.code, "Saving storage unit");

        let existing = storage_unit::Entity::find_by_id(u.id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        let code = u.code.clone();
        let model = storage_unit::ActiveModel {
            id: Set(u.id),
            tenant_id: Set(u.tenant_id),
            location_id: Set(u.location_id),
            code: Set(u.code),
            status: Set(u.status.as_str().to_string()),
            created_at: Set(u.created_at),
        };
        let written = if existing.is_some() {
            model.update(&self.db).await.map(|_| ())
        } else {
            storage_unit::Entity::insert(model)
                .exec_without_returning(&self.db)
                .await
                .map(|_| ())
        };
        written.map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::Conflict(format!("storage code '{}' already used at this location", code))
            } else {
                db_err(e)
            }
        })
    }
}
