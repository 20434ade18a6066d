use std::sync::Arc;

use salvo::conn::TcpListener;
use salvo::{Listener, Router};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};
use waypost_app::app::{api, passthrough};
use waypost_app::config::ConfigHandler;
use waypost_app::context::ServiceContextHandler;
use waypost_app::db_handler::DbProviderHandler;
use waypost_core::config::load_config;
use waypost_db::db::connection::create_pool;
use waypost_db::db::migrate::run_pending_migrations;
use waypost_service::content::ContentClient;
use waypost_service::crm::CrmClient;
use waypost_service::extensions::Extensions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting Waypost redirect gateway");

    let config = load_config()?;

    tracing::info!("Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    run_pending_migrations(&config.database.url).await?;

    let pool = create_pool(
        &config.database.url,
        u32::from(config.database.max_connections),
    )
    .await?;

    tracing::info!("Database connection pool created.");

    let crm = CrmClient::new(&config.crm);
    let content = ContentClient::new(&config.content);
    let extensions = Arc::new(Extensions::new());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let acceptor = TcpListener::new(bind_addr.clone()).bind().await;

    let router = Router::new()
        .hoop(DbProviderHandler { provider: pool })
        .hoop(ConfigHandler {
            settings: config.clone(),
        })
        .hoop(ServiceContextHandler {
            crm,
            content,
            extensions,
        })
        .push(api::routes())
        .push(passthrough::routes());

    tracing::info!("Server listening on {bind_addr}");

    salvo::Server::new(acceptor).serve(router).await;

    Ok(())
}
