//! Create payment_attempts table
//!
//! Failed checkout attempts replaced by a retry. Provider callbacks for an
//! old session are resolved through this table.

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
                    .table(PaymentAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentAttempts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentAttempts::PaymentId).uuid().not_null())
                    .col(
                        ColumnDef::new(PaymentAttempts::ProviderIntentId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentAttempts::CheckoutSessionId).string())
                    .col(ColumnDef::new(PaymentAttempts::FailureReason).string())
                    .col(
                        ColumnDef::new(PaymentAttempts::SupersededAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_attempts_payment")
                            .from(PaymentAttempts::Table, PaymentAttempts::PaymentId)
                            .to(Payments::Table, Payments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_attempts_intent")
                    .table(PaymentAttempts::Table)
                    .col(PaymentAttempts::ProviderIntentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_attempts_session")
                    .table(PaymentAttempts::Table)
                    .col(PaymentAttempts::CheckoutSessionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_attempts_payment")
                    .table(PaymentAttempts::Table)
                    .col(PaymentAttempts::PaymentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentAttempts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PaymentAttempts {
    Table,
    Id,
    PaymentId,
    ProviderIntentId,
    CheckoutSessionId,
    FailureReason,
    SupersededAt,
}
