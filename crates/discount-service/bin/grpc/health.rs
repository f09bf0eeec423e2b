use crate::server::DiscountGrpcServer;
use discount_core::Repository;
use discount_generator::Generator;
use discount_proto_schema::v1::discount_admin_service_server::DiscountAdminServiceServer;
use discount_proto_schema::v1::discount_service_server::DiscountServiceServer;
use discount_service::{CancellationToken, DiscountCodeService};
use std::time::Duration;
use tonic_health::server::HealthReporter;
use tracing::{info, warn};

type PublicService<R, G> = DiscountServiceServer<DiscountGrpcServer<R, G>>;
type AdminService<R, G> = DiscountAdminServiceServer<DiscountGrpcServer<R, G>>;

async fn set_status<R: Repository, G: Generator>(reporter: &HealthReporter, serving: bool) {
    if serving {
        reporter.set_serving::<PublicService<R, G>>().await;
        reporter.set_serving::<AdminService<R, G>>().await;
    } else {
        reporter.set_not_serving::<PublicService<R, G>>().await;
        reporter.set_not_serving::<AdminService<R, G>>().await;
    }
}

/// Periodically pings storage and flips both services between serving and
/// not serving. Both are reported as not serving once `shutdown` fires.
pub async fn report_health<R: Repository, G: Generator>(
    reporter: HealthReporter,
    service: DiscountCodeService<R, G>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut serving = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let healthy = match service.repository().ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        };

        if serving == Some(healthy) {
            continue;
        }
        serving = Some(healthy);

        info!(serving = healthy, "storage health changed");
        set_status::<R, G>(&reporter, healthy).await;
    }

    set_status::<R, G>(&reporter, false).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use discount_core::repository::{ReadRepository, Result as StorageResult};
    use discount_core::{Code, DiscountCode, PageQuery, StorageError};
    use discount_generator::RandomGenerator;
    use discount_storage::InMemoryRepository;
    use jiff::Timestamp;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tonic::server::NamedService;
    use tonic::Request;
    use tonic_health::pb::health_check_response::ServingStatus;
    use tonic_health::pb::health_server::Health;
    use tonic_health::pb::HealthCheckRequest;
    use tonic_health::server::HealthService;

    /// In-memory repository whose `ping` fails while `outage` is set.
    #[derive(Default)]
    struct FlakyRepository {
        inner: InMemoryRepository,
        outage: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ReadRepository for FlakyRepository {
        async fn get(&self, code: &Code) -> StorageResult<Option<DiscountCode>> {
            self.inner.get(code).await
        }

        async fn list(&self, query: &PageQuery) -> StorageResult<(Vec<DiscountCode>, u64)> {
            self.inner.list(query).await
        }

        async fn ping(&self) -> StorageResult<()> {
            if self.outage.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("connection refused".into()));
            }
            self.inner.ping().await
        }
    }

    #[async_trait]
    impl Repository for FlakyRepository {
        async fn insert_many(&self, codes: &[Code], created_at: Timestamp) -> StorageResult<u64> {
            self.inner.insert_many(codes, created_at).await
        }

        async fn insert(&self, record: &DiscountCode) -> StorageResult<()> {
            self.inner.insert(record).await
        }

        async fn set_used(&self, code: &Code, used: bool, at: Timestamp) -> StorageResult<bool> {
            self.inner.set_used(code, used, at).await
        }

        async fn delete(&self, code: &Code) -> StorageResult<bool> {
            self.inner.delete(code).await
        }

        async fn redeem(&self, code: &Code, at: Timestamp) -> StorageResult<bool> {
            self.inner.redeem(code, at).await
        }
    }

    type Public = PublicService<FlakyRepository, RandomGenerator>;
    type Admin = AdminService<FlakyRepository, RandomGenerator>;

    async fn status_of(health: &HealthService, service: &str) -> Option<ServingStatus> {
        let request = Request::new(HealthCheckRequest {
            service: service.to_string(),
        });
        health
            .check(request)
            .await
            .ok()
            .map(|response| response.into_inner().status())
    }

    async fn wait_for(health: &HealthService, expected: ServingStatus) {
        for _ in 0..400 {
            let public = status_of(health, <Public as NamedService>::NAME).await;
            let admin = status_of(health, <Admin as NamedService>::NAME).await;
            if public == Some(expected) && admin == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("services never reached {expected:?}");
    }

    #[tokio::test]
    async fn follows_storage_health_until_shutdown() {
        let outage = Arc::new(AtomicBool::new(true));
        let repository = FlakyRepository {
            inner: InMemoryRepository::new(),
            outage: Arc::clone(&outage),
        };
        let service = DiscountCodeService::new(repository, RandomGenerator::new());

        let reporter = HealthReporter::new();
        let health = HealthService::from_health_reporter(reporter.clone());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(report_health(
            reporter,
            service,
            Duration::from_millis(10),
            shutdown.clone(),
        ));

        wait_for(&health, ServingStatus::NotServing).await;

        outage.store(false, Ordering::SeqCst);
        wait_for(&health, ServingStatus::Serving).await;

        outage.store(true, Ordering::SeqCst);
        wait_for(&health, ServingStatus::NotServing).await;

        outage.store(false, Ordering::SeqCst);
        wait_for(&health, ServingStatus::Serving).await;

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(
            status_of(&health, <Public as NamedService>::NAME).await,
            Some(ServingStatus::NotServing)
        );
        assert_eq!(
            status_of(&health, <Admin as NamedService>::NAME).await,
            Some(ServingStatus::NotServing)
        );
    }

    #[tokio::test]
    async fn services_are_unknown_before_first_probe() {
        let reporter = HealthReporter::new();
        let health = HealthService::from_health_reporter(reporter);

        assert_eq!(status_of(&health, <Public as NamedService>::NAME).await, None);
        assert_eq!(status_of(&health, "").await, Some(ServingStatus::Serving));
    }
}
