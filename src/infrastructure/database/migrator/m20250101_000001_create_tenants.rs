//! Create tenants table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tenants::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tenants::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tenants::Name).string().not_null())
                    .col(
                        ColumnDef::new(Tenants::CommissionRate)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(
                        ColumnDef::new(Tenants::PaymentMode)
                            .string()
                            .not_null()
                            .default("CASH"),
                    )
                    .col(
                        ColumnDef::new(Tenants::Currency)
                            .string_len(3)
                            .not_null()
                            .default("TRY"),
                    )
                    .col(
                        ColumnDef::new(Tenants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tenants::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tenants::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Tenants {
    Table,
    Id,
    Name,
    CommissionRate,
    PaymentMode,
    Currency,
    CreatedAt,
    UpdatedAt,
}
