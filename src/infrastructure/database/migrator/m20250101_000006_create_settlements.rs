//! Create settlements table
//!
//! The unique payment_id index is what makes settlement creation
//! idempotent across processes.

use sea_orm_migration::prelude::*;

use super::m20250101_000005_create_payments::Payments;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Settlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settlements::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settlements::PaymentId).uuid().not_null())
                    .col(ColumnDef::new(Settlements::ReservationId).uuid().not_null())
                    .col(ColumnDef::new(Settlements::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(Settlements::TotalAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Settlements::TenantSettlementMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Settlements::KyradiCommissionMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::CommissionRate).string().not_null())
                    .col(ColumnDef::new(Settlements::Currency).string_len(3).not_null())
                    .col(
                        ColumnDef::new(Settlements::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Settlements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::SettledAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Settlements::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_settlements_payment")
                            .from(Settlements::Table, Settlements::PaymentId)
                            .to(Payments::Table, Payments::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_settlements_payment")
                    .table(Settlements::Table)
                    .col(Settlements::PaymentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_settlements_tenant_created")
                    .table(Settlements::Table)
                    .col(Settlements::TenantId)
                    .col(Settlements::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Settlements::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Settlements {
    Table,
    Id,
    PaymentId,
    ReservationId,
    TenantId,
    TotalAmountMinor,
    TenantSettlementMinor,
    KyradiCommissionMinor,
    CommissionRate,
    Currency,
    Status,
    CreatedAt,
    SettledAt,
    UpdatedAt,
}
