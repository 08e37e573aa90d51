//! Settlement entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub payment_id: Uuid,
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,

    pub total_amount_minor: i64,
    pub tenant_settlement_minor: i64,
    pub kyradi_commission_minor: i64,

    /// Rate snapshot at capture time, decimal text
    pub commission_rate: String,
    pub currency: String,

    /// pending, settled, cancelled
    pub status: String,

    pub created_at: DateTimeUtc,
    #[sea_orm(nullable)]
    pub settled_at: Option<DateTimeUtc>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payment::Entity",
        from = "Column::PaymentId",
        to = "super::payment::Column::Id"
    )]
    Payment,
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
