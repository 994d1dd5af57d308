use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryEnrollmentCatalog, InMemoryRegistrationStore, InMemoryUserDirectory,
    LoggingSurveyListener,
};
use crate::routes::with_registration_routes;
use analytics_registration::config::AppConfig;
use analytics_registration::error::AppError;
use analytics_registration::registration::RegistrationService;
use analytics_registration::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryRegistrationStore::default());
    let directory = Arc::new(InMemoryUserDirectory::default());
    let enrollment = Arc::new(InMemoryEnrollmentCatalog::default());
    let service = Arc::new(
        RegistrationService::new(repository, directory, enrollment)
            .with_listener(Arc::new(LoggingSurveyListener))
            .with_internal_domain(config.export.internal_domain.clone()),
    );

    let app = with_registration_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "registration service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
