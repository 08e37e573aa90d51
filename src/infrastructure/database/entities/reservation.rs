//! Reservation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,
    pub location_id: Uuid,

    /// reserved, active, completed, cancelled, no_show
    pub status: String,

    #[sea_orm(nullable)]
    pub storage_id: Option<Uuid>,

    pub start_at: DateTimeUtc,
    pub end_at: DateTimeUtc,

    pub guest_name: String,
    #[sea_orm(nullable)]
    pub guest_email: Option<String>,
    #[sea_orm(nullable)]
    pub guest_phone: Option<String>,

    pub amount_minor: i64,
    pub currency: String,

    /// widget, panel, api
    pub origin: String,
    pub payment_required: bool,

    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
