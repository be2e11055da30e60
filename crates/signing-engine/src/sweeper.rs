//! Periodic expiry of overdue signing requests.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::service::SigningService;

/// Runs `expire_sweep` on a fixed interval.
pub struct ExpirySweeper {
    service: Arc<SigningService>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(service: Arc<SigningService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Interval taken from the service configuration.
    pub fn from_config(service: Arc<SigningService>) -> Self {
        let interval = Duration::from_secs(service.config().sweep_interval_secs);
        Self::new(service, interval)
    }

    /// Sweep forever. Failures are logged and the next tick runs as usual.
    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Starting expiry sweeper");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.service.expire_sweep().await {
                error!(error = %e, "Expiry sweep failed");
            }
        }
    }
}

/// Spawn the sweeper as a background task. Abort the handle to stop it.
pub fn spawn_expiry_sweeper(service: Arc<SigningService>) -> JoinHandle<()> {
    spawn(ExpirySweeper::from_config(service))
}

/// Spawn the sweeper with an explicit interval.
pub fn spawn_expiry_sweeper_every(service: Arc<SigningService>, interval: Duration) -> JoinHandle<()> {
    spawn(ExpirySweeper::new(service, interval))
}

fn spawn(sweeper: ExpirySweeper) -> JoinHandle<()> {
    let handle = tokio::spawn(sweeper.run());
    info!("Expiry sweeper spawned as background task");
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::contracts::MemoryContractSource;
    use crate::documents::MemoryDocumentStore;
    use crate::notifier::LogNotifier;
    use crate::repository::MemorySigningRequestRepository;
    use contract_core::config::SigningConfig;
    use contract_core::fixtures::sample_contract;
    use contract_core::types::{Recipient, SigningStatus};
    use identity::CertificateManager;

    #[tokio::test]
    async fn test_sweeper_expires_overdue_requests() {
        let dir = tempfile::tempdir().unwrap();
        let config = SigningConfig::for_dir(dir.path());
        let contracts = Arc::new(MemoryContractSource::new());
        contracts.insert(sample_contract());
        let clock = Arc::new(ManualClock::default());

        let service = Arc::new(SigningService::with_clock(
            config.clone(),
            Arc::new(MemorySigningRequestRepository::new()),
            contracts,
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(CertificateManager::from_config(&config)),
            Arc::new(LogNotifier),
            clock.clone(),
        ));

        let request = service
            .request_signature_with_retention(
                "C1",
                &Recipient::new("tenant-1", "andres@example.com"),
                chrono::Duration::days(1),
            )
            .await
            .unwrap();
        clock.advance(chrono::Duration::days(2));

        let handle = spawn_expiry_sweeper_every(service.clone(), Duration::from_millis(10));
        let mut status = SigningStatus::Pending;
        for _ in 0..100 {
            status = service.get(request.id()).await.unwrap().status();
            if status == SigningStatus::Expired {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(status, SigningStatus::Expired);
    }
}
