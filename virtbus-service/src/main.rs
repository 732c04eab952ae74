//! Entry point for the `virtbus` service.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use virtbus_driver::Connection;
use virtbus_service::{
    bridge::EventBridge,
    bus::Bus,
    config::ServiceConfig,
    connect::ConnectObject,
    context::ServiceContext,
    interface,
    routes::{create_router, AppState},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ServiceConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = interface::validate_all() {
        tracing::error!(error = %e, "interface table is inconsistent");
        std::process::exit(1);
    }

    let connection = match Connection::open(&config.connect_uri) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(uri = %config.connect_uri, error = %e, "failed to open hypervisor connection");
            std::process::exit(1);
        }
    };
    let ctx = ServiceContext::new(connection, config.signal_backlog);

    let bridge = EventBridge::new(ctx.clone(), ctx.signals.clone());
    if let Err(e) = bridge.register().await {
        tracing::error!(error = %e, "failed to register lifecycle callback");
        std::process::exit(1);
    }

    match ConnectObject::new(ctx.clone()).list_domains(0).await {
        Ok(paths) => info!(count = paths.len(), "domain objects exported"),
        Err(e) => {
            tracing::error!(error = %e, "failed to enumerate domains");
            std::process::exit(1);
        }
    }

    let app = create_router(AppState::new(Arc::new(Bus::new(ctx)), config.max_signal_wait));

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %config.listen_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %config.listen_addr, uri = %config.connect_uri, "virtbus listening");

    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    if let Err(e) = bridge.unregister().await {
        tracing::warn!(error = %e, "failed to deregister lifecycle callback");
    }
    if let Err(e) = served {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
