//! Payment entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,

    pub provider: String,
    pub mode: String,

    /// pending, authorized, paid, failed, refunded, cancelled
    pub status: String,

    pub amount_minor: i64,
    pub currency: String,

    #[sea_orm(unique)]
    pub provider_intent_id: String,

    #[sea_orm(nullable)]
    pub checkout_session_id: Option<String>,
    #[sea_orm(nullable)]
    pub checkout_url: Option<String>,
    #[sea_orm(nullable)]
    pub transaction_id: Option<String>,
    #[sea_orm(nullable)]
    pub failure_reason: Option<String>,
    #[sea_orm(nullable)]
    pub paid_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub refunded_at: Option<DateTimeUtc>,

    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::reservation::Entity",
        from = "Column::ReservationId",
        to = "super::reservation::Column::Id"
    )]
    Reservation,
    #[sea_orm(has_one = "super::settlement::Entity")]
    Settlement,
    #[sea_orm(has_many = "super::payment_attempt::Entity")]
    PaymentAttempt,
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservation.def()
    }
}

impl Related<super::settlement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settlement.def()
    }
}

impl Related<super::payment_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentAttempt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
