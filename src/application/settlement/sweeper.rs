//! Background task that settles captured payments left without a
//! settlement (e.g. after a crash between capture and settlement insert).

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn};

use super::calculator::SettlementCalculator;
use crate::shared::shutdown::ShutdownSignal;

/// Start the settlement sweep background task.
///
/// Runs `settle_missing` every `interval_secs` until shutdown.
pub fn start_settlement_sweeper(
    calculator: Arc<SettlementCalculator>,
    shutdown: ShutdownSignal,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs, "Settlement sweeper started");

        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = calculator.settle_missing().await {
                        warn!(error = %e, "Settlement sweep error");
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("Settlement sweeper shutting down");
                    break;
                }
            }
        }

        info!("Settlement sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::Fixture;
    use crate::domain::{Payment, PaymentMode, RepositoryProvider};
    use chrono::Utc;

    #[tokio::test]
    async fn sweeper_settles_then_stops_on_shutdown() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let mut payment = fx
            .repos
            .payments()
            .insert(Payment::intent_for(&r, PaymentMode::Cash, "manual"))
            .await
            .unwrap();
        payment.mark_paid(None, Utc::now()).unwrap();
        let payment = fx.repos.payments().update(payment).await.unwrap();

        let shutdown = ShutdownSignal::new();
        let handle = start_settlement_sweeper(fx.settlement.clone(), shutdown.clone(), 3600);

        // the first interval tick fires immediately
        let mut settled = None;
        for _ in 0..50 {
            settled = fx.settlement.find_by_payment(payment.id).await.unwrap();
            if settled.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(settled.is_some());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
