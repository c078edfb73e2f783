use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context as _, Result};
use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use console::style;
use multistripe_core::{CallContext, Registry, StripeError};
use multistripe_driver_stripe::adapter_for;
use multistripe_types::{CallbackEvent, FlatCallbackEvent};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{Context, manifest::Manifest};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Longest a queued delivery waits for a free slot before it is refused
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// How verified webhooks reach the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Delivery {
    /// Normalize inside the HTTP request and log the event
    Sync,
    /// Normalize onto each adapter's callback queue, drained by consumer tasks
    Queue,
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct ServeCommand {
    /// Port to run the webhook receiver on
    #[arg(long, default_value = "8489")]
    pub port: u16,

    #[arg(long, value_enum, default_value_t = Delivery::Sync)]
    pub delivery: Delivery,

    /// Consumer tasks per version in queue delivery
    #[arg(long, default_value = "1")]
    pub consumers: usize,
}

#[derive(Clone)]
pub struct AppState {
    registry: Arc<Registry>,
    delivery: Delivery,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, delivery: Delivery) -> Self {
        Self { registry, delivery }
    }
}

/// Register and configure an adapter for every enabled version
pub fn build_registry(manifest: &Manifest) -> Result<Registry> {
    let credentials = manifest
        .credentials()
        .context("webhook verification needs a signing secret")?;
    let options = manifest.binding_options();

    let mut registry = Registry::new();
    for version in manifest.enabled_versions() {
        let adapter = adapter_for(version, &options, Some(manifest.queue_capacity))
            .with_context(|| format!("no binding for version {version}"))?;
        adapter.configure(credentials.clone());
        registry.register(adapter);
    }
    Ok(registry)
}

pub fn create_router(state: AppState) -> Router<()> {
    Router::new()
        .route("/health", get(health_check))
        .route("/webhooks/{version}", post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn receive_webhook(
    State(state): State<AppState>,
    Path(version): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match deliver(&state, &version, &body, signature).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(version = %version, error = %e, "Webhook refused");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn deliver(
    state: &AppState,
    version: &str,
    payload: &[u8],
    signature: &str,
) -> Result<(), StripeError> {
    let adapter = state.registry.lookup(version)?;
    match state.delivery {
        Delivery::Sync => {
            let event = adapter
                .handle_webhook(&CallContext::background(), payload, signature)
                .await?;
            log_event(version, &event);
            Ok(())
        }
        Delivery::Queue => {
            let ctx = CallContext::background().with_timeout(PUBLISH_TIMEOUT);
            adapter.publish_webhook(&ctx, payload, signature).await
        }
    }
}

fn log_event(version: &str, event: &CallbackEvent) {
    info!(
        version,
        event_type = %event.event_type(),
        family = %event.family(),
        "Callback received"
    );
    if let Ok(flat) = serde_json::to_string(&FlatCallbackEvent::from(event)) {
        debug!(version, event = %flat, "Callback payload");
    }
}

/// Spawn `per_version` tasks draining each adapter's callback queue
pub fn spawn_consumers(registry: &Registry, per_version: usize) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    for version in registry.versions() {
        let Ok(adapter) = registry.lookup(version) else {
            continue;
        };
        for worker in 0..per_version.max(1) {
            let stream = adapter.callbacks();
            let version = version.to_string();
            handles.push(tokio::spawn(async move {
                while let Some(event) = stream.recv().await {
                    log_event(&version, &event);
                }
                debug!(version = %version, worker, "Callback consumer stopped");
            }));
        }
    }
    handles
}

impl ServeCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let registry = Arc::new(build_registry(&ctx.manifest)?);

        if self.delivery == Delivery::Queue {
            spawn_consumers(&registry, self.consumers);
        }

        println!();
        println!("{}{}", style("Multi").white(), style("Stripe").green());
        for version in registry.versions() {
            println!(
                " {} http://localhost:{}/webhooks/{}",
                style("POST").yellow(),
                self.port,
                version
            );
        }
        println!(" {} ({:?} delivery)", style("Press Ctrl+C to stop").dim(), self.delivery);
        println!();

        let app = create_router(AppState::new(registry, self.delivery));
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting webhook receiver on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;

        Ok(())
    }
}
