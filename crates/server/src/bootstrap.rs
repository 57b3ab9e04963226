use std::sync::Arc;

use axum::Router;
use clientele_core::config::{AppConfig, ConfigError, LoadOptions};
use clientele_core::errors::ApplicationError;
use clientele_db::{connect_with_config, migrations, DbPool, SqlCustomerRepository};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, ApiState};
use crate::gateway::OutboundGateway;
use crate::health::{self, HealthState};
use crate::lifecycle::CustomerLifecycle;
use crate::summary::SummaryOrchestrator;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub lifecycle: CustomerLifecycle,
    pub gateway: Arc<OutboundGateway>,
    pub summaries: SummaryOrchestrator,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("outbound gateway setup failed: {0}")]
    Gateway(#[source] ApplicationError),
}

impl Application {
    /// Customer API, `/health`, and request tracing on one router.
    pub fn router(&self) -> Router {
        let api = api::router(ApiState {
            lifecycle: self.lifecycle.clone(),
            summaries: self.summaries.clone(),
        });
        let health = health::router(HealthState {
            db_pool: self.db_pool.clone(),
            breakers: self.gateway.breakers(),
        });

        api.merge(health).layer(TraceLayer::new_for_http())
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let lifecycle = CustomerLifecycle::new(Arc::new(SqlCustomerRepository::new(db_pool.clone())));
    let gateway = Arc::new(OutboundGateway::from_config(&config).map_err(BootstrapError::Gateway)?);
    let summaries =
        SummaryOrchestrator::new(lifecycle.clone(), Arc::clone(&gateway), config.downstream.clone());
    info!(
        event_name = "system.bootstrap.gateway_ready",
        correlation_id = "bootstrap",
        accounts_url = %config.downstream.accounts_url,
        cards_url = %config.downstream.cards_url,
        credits_url = %config.downstream.credits_url,
        call_timeout_ms = config.downstream.call_timeout_ms,
        "outbound gateway configured"
    );

    Ok(Application { config, db_pool, lifecycle, gateway, summaries })
}
