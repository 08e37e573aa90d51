//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_tenants;
mod m20250101_000002_create_locations;
mod m20250101_000003_create_storage_units;
mod m20250101_000004_create_reservations;
mod m20250101_000005_create_payments;
mod m20250101_000006_create_settlements;
mod m20250101_000007_create_payment_attempts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_tenants::Migration),
            Box::new(m20250101_000002_create_locations::Migration),
            Box::new(m20250101_000003_create_storage_units::Migration),
            Box::new(m20250101_000004_create_reservations::Migration),
            Box::new(m20250101_000005_create_payments::Migration),
            Box::new(m20250101_000006_create_settlements::Migration),
            Box::new(m20250101_000007_create_payment_attempts::Migration),
        ]
    }
}
