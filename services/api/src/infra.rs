use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use pos_billing::billing::sri::{OfflineSriGateway, SoapSriClient, SriGateway};
use pos_billing::config::{GatewayMode, SriConfig};
use pos_billing::error::AppError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Picks the SRI integration named by the configuration.
pub(crate) fn build_gateway(config: &SriConfig) -> Result<Arc<dyn SriGateway>, AppError> {
    let gateway: Arc<dyn SriGateway> = match config.gateway {
        GatewayMode::Soap => Arc::new(SoapSriClient::new(config.timeout)?),
        GatewayMode::Offline => Arc::new(OfflineSriGateway::new()),
    };
    Ok(gateway)
}

/// The SRI rejects vouchers without a XAdES-BES signature; only the offline gateway accepts
/// the digest stand-in.
pub(crate) fn signer_warning(mode: GatewayMode) -> Option<&'static str> {
    match mode {
        GatewayMode::Soap => Some(
            "SRI web services configured with the digest signer; \
             vouchers will be rejected until a XAdES-BES signer is installed",
        ),
        GatewayMode::Offline => None,
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
