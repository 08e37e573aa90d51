//! Create reservations table
//!
//! The (storage_id, start_at) index backs the overlap query run on every
//! activation.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_tenants::Tenants;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reservations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reservations::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Reservations::LocationId).uuid().not_null())
                    .col(
                        ColumnDef::new(Reservations::Status)
                            .string()
                            .not_null()
                            .default("reserved"),
                    )
                    .col(ColumnDef::new(Reservations::StorageId).uuid())
                    .col(
                        ColumnDef::new(Reservations::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::EndAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reservations::GuestName).string().not_null())
                    .col(ColumnDef::new(Reservations::GuestEmail).string())
                    .col(ColumnDef::new(Reservations::GuestPhone).string())
                    .col(
                        ColumnDef::new(Reservations::AmountMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Reservations::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(Reservations::Origin).string().not_null())
                    .col(
                        ColumnDef::new(Reservations::PaymentRequired)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Reservations::Version)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Reservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservations_tenant")
                            .from(Reservations::Table, Reservations::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_storage_window")
                    .table(Reservations::Table)
                    .col(Reservations::StorageId)
                    .col(Reservations::StartAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_tenant_status")
                    .table(Reservations::Table)
                    .col(Reservations::TenantId)
                    .col(Reservations::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reservations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Reservations {
    Table,
    Id,
    TenantId,
    LocationId,
    Status,
    StorageId,
    StartAt,
    EndAt,
    GuestName,
    GuestEmail,
    GuestPhone,
    AmountMinor,
    Currency,
    Origin,
    PaymentRequired,
    Version,
    CreatedAt,
    UpdatedAt,
}
