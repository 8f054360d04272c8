//! EPUB Library - serve a single book over HTTP.
//!
//! This binary loads the book, optionally discovers the identity provider,
//! and starts the HTTP server.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epub_library::{
    archive::{ArchiveSource, EpubArchive},
    auth::{AuthState, OidcProvider},
    config::Config,
    content::BookService,
    server::{create_router, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let archive = match EpubArchive::load(&config.book_path).await {
        Ok(archive) => archive,
        Err(e) => {
            error!("Failed to load book: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Book: {} ({} entries)", archive.identifier(), archive.entries().len());
    info!("  Content prefix: {:?}", config.content_prefix);
    info!("  Index document: {}", config.index_document);

    let router_config = match build_router_config(&config).await {
        Ok(router_config) => router_config,
        Err(code) => return code,
    };

    let book_service =
        BookService::with_layout(archive, &config.content_prefix, &config.index_document);
    let router = create_router(book_service, router_config);

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "epub_library=debug,tower_http=debug"
    } else {
        "epub_library=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig, discovering the identity provider when sign-in is on.
async fn build_router_config(config: &Config) -> Result<RouterConfig, ExitCode> {
    let router_config = RouterConfig::without_auth().with_tracing(!config.no_tracing);

    let settings = match config.oidc_settings() {
        Ok(Some(settings)) => settings,
        Ok(None) => {
            warn!("  Auth: DISABLED - the book is publicly readable");
            return Ok(router_config);
        }
        Err(e) => {
            error!("Configuration error: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let provider = match OidcProvider::discover(&settings).await {
        Ok(provider) => provider,
        Err(e) => {
            error!("{}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    info!("  Auth: OpenID Connect via {}", settings.issuer);
    info!("  Callback path: {}", settings.callback_path());
    for set in settings.policy.claim_sets() {
        info!("  Allowed claims: {}", set);
    }

    let auth = AuthState::new(
        Arc::new(provider),
        settings.policy.clone(),
        settings.callback_path(),
        settings.timeout,
    );

    Ok(router_config.with_auth(auth))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
