use std::{process, sync::Arc};

use snipbin::{
    application::{clock::SystemClock, repos::SnippetRepo, snippets::SnippetService},
    cache::{CacheConfig, CachedSnippetRepo, RedisStore},
    config,
    infra::{db::PostgresRepositories, error::InfraError, http, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database.url is required"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(format!("failed to connect: {err}")))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(format!("failed to run migrations: {err}")))?;
    let postgres = PostgresRepositories::new(pool);
    postgres
        .health_check()
        .await
        .map_err(|err| InfraError::database(format!("health check failed: {err}")))?;

    let clock = Arc::new(SystemClock);
    let repo = compose_repo(postgres, &settings, clock.clone()).await;
    let service = Arc::new(SnippetService::new(repo, clock, settings.pagination));

    let router = http::router(http::HttpState { snippets: service });
    let listener = tokio::net::TcpListener::bind(settings.server.addr).await?;
    info!(addr = %settings.server.addr, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}

/// Wrap the durable store in the cache layer when a cache URL is configured
/// and reachable; otherwise serve every request from Postgres alone.
async fn compose_repo(
    postgres: PostgresRepositories,
    settings: &config::Settings,
    clock: Arc<dyn snipbin::application::clock::Clock>,
) -> Arc<dyn SnippetRepo> {
    let Some(url) = settings.cache.url.as_deref() else {
        info!("no cache configured; serving from the database only");
        return Arc::new(postgres);
    };

    match RedisStore::connect(url).await {
        Ok(store) => {
            info!("cache connected");
            Arc::new(CachedSnippetRepo::new(
                postgres,
                Arc::new(store),
                clock,
                CacheConfig {
                    default_ttl: settings.cache.default_ttl,
                    scan_batch: settings.cache.scan_batch.get(),
                },
            ))
        }
        Err(err) => {
            warn!(error = %err, "cache unreachable; serving from the database only");
            Arc::new(postgres)
        }
    }
}
