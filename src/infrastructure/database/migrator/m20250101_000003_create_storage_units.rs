//! Create storage_units table

use sea_orm_migration::prelude::*;

use super::m20250101_000002_create_locations::Locations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StorageUnits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StorageUnits::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StorageUnits::TenantId).uuid().not_null())
                    .col(ColumnDef::new(StorageUnits::LocationId).uuid().not_null())
                    .col(ColumnDef::new(StorageUnits::Code).string().not_null())
                    .col(
                        ColumnDef::new(StorageUnits::Status)
                            .string()
                            .not_null()
                            .default("idle"),
                    )
                    .col(
                        ColumnDef::new(StorageUnits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_storage_units_location")
                            .from(StorageUnits::Table, StorageUnits::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // codes are unique within a location
        manager
            .create_index(
                Index::create()
                    .name("idx_storage_units_location_code")
                    .table(StorageUnits::Table)
                    .col(StorageUnits::LocationId)
                    .col(StorageUnits::Code)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StorageUnits::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum StorageUnits {
    Table,
    Id,
    TenantId,
    LocationId,
    Code,
    Status,
    CreatedAt,
}
