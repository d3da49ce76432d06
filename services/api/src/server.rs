use crate::cli::ServeArgs;
use crate::demo::seed_demo_tenant;
use crate::infra::{build_gateway, signer_warning, AppState};
use crate::routes::with_billing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use pos_billing::billing::{AuthorizationPipeline, BillingService, DigestSigner, ReceiptSequencer};
use pos_billing::config::AppConfig;
use pos_billing::error::AppError;
use pos_billing::store::InMemoryStore;
use pos_billing::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let store = Arc::new(InMemoryStore::new());
    let sequencer = Arc::new(ReceiptSequencer::new(store.clone()));
    if args.seed_demo {
        let company = seed_demo_tenant(&store, &sequencer)?;
        info!(company = %company.0, "demo tenant registered");
    }

    if let Some(warning) = signer_warning(config.sri.gateway) {
        warn!(gateway = ?config.sri.gateway, "{warning}");
    }
    let gateway = build_gateway(&config.sri)?;
    let pipeline = AuthorizationPipeline::new(gateway, Arc::new(DigestSigner), config.sri.pipeline());
    let billing_service = Arc::new(BillingService::new(store, sequencer, pipeline));

    let app = with_billing_routes(billing_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        gateway = ?config.sri.gateway,
        %addr,
        "billing service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
