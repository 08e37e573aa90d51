//! Create payments table
//!
//! One payment per reservation; the provider intent key is globally unique.

use sea_orm_migration::prelude::*;

use super::m20250101_000004_create_reservations::Reservations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payments::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Payments::ReservationId).uuid().not_null())
                    .col(ColumnDef::new(Payments::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Payments::Provider).string().not_null())
                    .col(ColumnDef::new(Payments::Mode).string().not_null())
                    .col(
                        ColumnDef::new(Payments::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Payments::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Payments::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(Payments::ProviderIntentId).string().not_null())
                    .col(ColumnDef::new(Payments::CheckoutSessionId).string())
                    .col(ColumnDef::new(Payments::CheckoutUrl).string())
                    .col(ColumnDef::new(Payments::TransactionId).string())
                    .col(ColumnDef::new(Payments::FailureReason).string())
                    .col(ColumnDef::new(Payments::PaidAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Payments::RefundedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Payments::Version)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_reservation")
                            .from(Payments::Table, Payments::ReservationId)
                            .to(Reservations::Table, Reservations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_reservation")
                    .table(Payments::Table)
                    .col(Payments::ReservationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_intent")
                    .table(Payments::Table)
                    .col(Payments::ProviderIntentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_checkout_session")
                    .table(Payments::Table)
                    .col(Payments::CheckoutSessionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_status")
                    .table(Payments::Table)
                    .col(Payments::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Payments {
    Table,
    Id,
    ReservationId,
    TenantId,
    Provider,
    Mode,
    Status,
    AmountMinor,
    Currency,
    ProviderIntentId,
    CheckoutSessionId,
    CheckoutUrl,
    TransactionId,
    FailureReason,
    PaidAt,
    RefundedAt,
    Version,
    CreatedAt,
    UpdatedAt,
}
