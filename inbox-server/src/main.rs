//! Tempinbox web server.
//!
//! Receives Mailgun webhooks for disposable aliases and stores every accepted
//! message, on RabbitMQ when `CLOUDAMQP_URL` is set and in memory otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tempinbox::{
    router, AliasDirectory, AliasError, AliasGenerator, AppState, Config, HtmlSanitizer,
    Ingestor, MemoryStore, MessageSink, MimeParser, Publisher,
};

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    info!(
        port = config.port,
        mailgun_signing_configured = config.mailgun_signing_key.is_some(),
        mailgun_require_signature = config.mailgun_require_signature,
        alias_domain = ?config.alias_domain,
        rabbitmq_configured = config.cloudamqp_url.is_some(),
        dev_inbound_enabled = config.dev_inbound_enabled,
        "config_loaded"
    );

    let generator = AliasGenerator::from_config(&config).context("Invalid alias word list")?;
    let directory = Arc::new(AliasDirectory::new());
    seed_aliases(&directory, &generator, &config).await?;

    let publisher = config.cloudamqp_url.clone().map(Publisher::new);
    let sink: Arc<dyn MessageSink> = match &publisher {
        Some(publisher) => {
            info!("rabbitmq_publisher_created");
            Arc::new(publisher.clone())
        }
        None => {
            warn!(
                capacity = config.memory_store_capacity,
                "message_sink_in_memory"
            );
            Arc::new(MemoryStore::with_capacity(config.memory_store_capacity))
        }
    };

    let parser = MimeParser::new(Arc::new(HtmlSanitizer::new()));
    let ingestor = Ingestor::new(&config, parser, directory, sink);
    let state = AppState::new(config.clone(), ingestor);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(publisher) = publisher {
        publisher.close().await;
    }

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Register `ALIASES` and provision `ALIAS_PROVISION_COUNT` generated ones.
async fn seed_aliases(
    directory: &AliasDirectory,
    generator: &AliasGenerator,
    config: &Config,
) -> Result<()> {
    for local_part in &config.aliases {
        match directory.insert(local_part).await {
            Ok(_) => {}
            Err(AliasError::Duplicate(existing)) => {
                warn!(local_part = %existing, "alias_duplicate_skipped");
            }
            Err(e) => {
                error!(local_part = %local_part, error = %e, "alias_register_failed");
            }
        }
    }

    for _ in 0..config.alias_provision_count {
        let alias = directory
            .provision(generator)
            .await
            .context("Failed to provision alias")?;
        match &config.alias_domain {
            Some(domain) => info!(address = %format!("{}@{}", alias.local_part, domain), "alias_ready"),
            None => info!(local_part = %alias.local_part, "alias_ready"),
        }
    }

    info!(aliases = directory.len().await, "alias_directory_ready");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
