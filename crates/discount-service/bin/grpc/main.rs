mod cli;
mod error;
mod health;
mod server;

use crate::cli::{StorageBackendArg, CLI};
use crate::health::report_health;
use crate::server::DiscountGrpcServer;
use anyhow::Context;
use clap::Parser;
use discount_generator::RandomGenerator;
use discount_proto_schema::v1::discount_admin_service_server::DiscountAdminServiceServer;
use discount_proto_schema::v1::discount_service_server::DiscountServiceServer;
use discount_service::{CancellationToken, DiscountCodeService};
use discount_storage::{InMemoryRepository, PgRepository, Repository};
use discount_telemetry::TelemetryConfig;
use tonic::transport::Server;
use tracing::{info, warn};

const SERVICE_NAME: &str = "discount-grpc";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;

    let telemetry = TelemetryConfig::builder()
        .service_name(SERVICE_NAME)
        .log_format(config.log_format.into())
        .otlp_endpoint(config.otlp_endpoint.clone())
        .build();
    let _telemetry = discount_telemetry::init(&telemetry).context("failed to initialise telemetry")?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        "starting discount gRPC server"
    );

    match config.storage {
        StorageBackendArg::InMemory => run_server(&config, InMemoryRepository::new()).await,
        StorageBackendArg::Postgres => {
            let dsn = config
                .postgres_dsn
                .as_deref()
                .context("postgres dsn is required when storage backend is postgres")?;
            let repository = PgRepository::connect(dsn, config.postgres_max_connections)
                .await
                .context("failed to connect to postgres")?;
            if config.run_migrations {
                repository
                    .migrate()
                    .await
                    .context("failed to run migrations")?;
                info!("database migrations applied");
            }
            run_server(&config, repository).await
        }
    }
}

async fn run_server<R: Repository>(config: &CLI, repository: R) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let service = DiscountCodeService::new(repository, RandomGenerator::new());
    let server = DiscountGrpcServer::new(service.clone(), shutdown.clone());

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    let health_task = tokio::spawn(report_health(
        health_reporter,
        service,
        config.health_interval(),
        shutdown.clone(),
    ));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining in-flight requests");
        signal_token.cancel();
    });

    let serve_token = shutdown.clone();
    Server::builder()
        .timeout(config.request_timeout())
        .add_service(health_service)
        .add_service(DiscountServiceServer::new(server.clone()))
        .add_service(DiscountAdminServiceServer::new(server))
        .serve_with_shutdown(config.listen_addr, async move {
            serve_token.cancelled().await;
        })
        .await
        .context("gRPC server failed")?;

    shutdown.cancel();
    if let Err(err) = health_task.await {
        warn!(error = %err, "health reporter task failed");
    }

    info!("discount gRPC server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
