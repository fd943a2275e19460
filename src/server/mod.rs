//! HTTP surface for the funnel engine: definition lookup, stateless
//! navigation, and submission dispatch, plus the usual health/readiness and
//! metrics endpoints.

pub mod infra;
pub mod routes;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use crate::config::{AppConfig, FunnelConfig};
use crate::error::AppError;
use crate::funnel::{
    ChannelMarketingBus, DispatchSettings, FunnelService, HostedBackendClient,
    HostedBackendSettings, HttpWebhookTransport, SubmissionDispatcher,
};
use crate::telemetry;

pub use infra::{
    demo_funnel, AppState, InMemoryConversionStore, InMemoryFunnelDirectory, InMemoryLeadStore,
    LoggingMailer,
};
pub use routes::router;

/// Host/port overrides from the command line.
#[derive(Debug, Default)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Wire the funnel service from configuration: hosted backend when one is
/// configured, in-memory stores seeded with the demo funnel otherwise.
pub fn build_service(config: &FunnelConfig) -> FunnelService {
    let client = reqwest::Client::new();
    let webhook = Arc::new(HttpWebhookTransport::new(client.clone()));
    let marketing = Arc::new(ChannelMarketingBus::default());
    let mailer = Arc::new(LoggingMailer);
    let settings = DispatchSettings {
        webhook_url: config.webhook_url.clone(),
        redirect_url: config.redirect_url.clone(),
        settle: config.settle,
    };

    match &config.backend {
        Some(backend) => {
            let backend = Arc::new(HostedBackendClient::new(
                client,
                HostedBackendSettings {
                    base_url: backend.base_url.clone(),
                    api_key: backend.api_key.clone(),
                },
            ));
            let dispatcher = SubmissionDispatcher::new(
                backend.clone(),
                backend.clone(),
                webhook,
                mailer,
                marketing,
                settings,
            );
            FunnelService::new(backend, dispatcher)
        }
        None => {
            let directory = Arc::new(InMemoryFunnelDirectory::with_funnels([demo_funnel()]));
            let dispatcher = SubmissionDispatcher::new(
                Arc::new(InMemoryLeadStore::default()),
                Arc::new(InMemoryConversionStore::default()),
                webhook,
                mailer,
                marketing,
                settings,
            );
            FunnelService::new(directory, dispatcher)
        }
    }
}

pub async fn run(mut overrides: ServeOverrides) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = overrides.host.take() {
        config.server.host = host;
    }
    if let Some(port) = overrides.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let service = Arc::new(build_service(&config.funnel));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
        service,
    };

    let app = router(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "funnel engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
