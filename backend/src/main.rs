use axum::{
    http::Method,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod database;
mod error;
mod handlers;
mod jobs;
mod repositories;
mod scoring;
mod services;
mod workflows;

pub use error::{ApiError, ApiResult, AppError};

#[cfg(test)]
mod tests;

use repositories::{PgRepository, WorkflowStore};
use scoring::{LeadScoringService, ScoreTierRouter, ScoringConfig};
use services::{
    BulkSender, EmailService, GatewayMessenger, HttpWebhookClient, Messenger, QueuedDocumentGenerator,
    RateLimitedMessenger, RateLimiter,
};
use workflows::{ActionDispatcher, Collaborators, WorkflowEngine};

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub engine: Arc<WorkflowEngine>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub scoring: Arc<LeadScoringService>,
    pub bulk_sender: Arc<BulkSender>,
    pub scheduler: Arc<jobs::JobScheduler>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    let db_pool = database::create_pool(&config.database_url).await?;

    database::migrate(&db_pool).await?;

    let repo = Arc::new(PgRepository::new(db_pool.clone()));
    let seeded = database::seed_default_workflows(repo.as_ref()).await?;
    if seeded > 0 {
        tracing::info!("Installed {} default workflows", seeded);
    }

    // Outbound messaging: every send draws from one shared token bucket
    let email = if config.smtp.is_configured() {
        Some(EmailService::new(&config.smtp)?)
    } else {
        tracing::warn!("SMTP not configured, email actions will report delivery failures");
        None
    };
    let limiter = Arc::new(RateLimiter::new(
        config.messaging.rate_per_second,
        config.messaging.burst,
    ));
    let gateway: Arc<dyn Messenger> = Arc::new(GatewayMessenger::new(email, &config.messaging)?);
    let messenger: Arc<dyn Messenger> = Arc::new(RateLimitedMessenger::new(gateway, limiter));

    let webhooks = HttpWebhookClient::new(Duration::from_secs(config.messaging.request_timeout_secs))?;

    let collaborators = Collaborators {
        entities: repo.clone(),
        messenger: messenger.clone(),
        tasks: repo.clone(),
        notifications: repo.clone(),
        campaigns: repo.clone(),
        documents: Arc::new(QueuedDocumentGenerator::new(db_pool.clone())),
        webhooks: Arc::new(webhooks),
    };
    let dispatcher = Arc::new(ActionDispatcher::new(
        collaborators,
        config.workflow.action_timeout(),
    ));
    let engine = Arc::new(WorkflowEngine::new(
        repo.clone(),
        dispatcher.clone(),
        config.workflow.max_chain_depth,
    ));

    let scoring_config = Arc::new(ScoringConfig::load(config.scoring_config_path.as_deref())?);
    let router = Arc::new(ScoreTierRouter::new(
        dispatcher,
        repo.clone(),
        repo.clone(),
        scoring_config.routing.clone(),
    ));
    let scoring = Arc::new(
        LeadScoringService::new(repo.clone(), scoring_config)
            .with_router(router)
            .with_bulk_concurrency(config.schedule.bulk_score_concurrency),
    );

    let bulk_sender = Arc::new(BulkSender::new(
        repo.clone(),
        messenger,
        config.messaging.bulk_concurrency,
    ));

    let scheduler = Arc::new(
        jobs::JobScheduler::new(
            scoring.clone(),
            engine.clone(),
            repo.clone(),
            config.schedule.clone(),
        )
        .await?,
    );
    scheduler.start().await?;

    let app_state = Arc::new(AppState {
        db_pool,
        engine,
        workflows: repo,
        scoring,
        bulk_sender,
        scheduler: scheduler.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Realty Automation API v0.1.0" }))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/automation", handlers::automation_routes())
        .nest("/api/v1/workflows", handlers::workflow_routes())
        .nest("/api/v1/leads", handlers::lead_score_routes())
        .nest("/api/v1/campaigns", handlers::campaign_routes())
        .nest("/api/v1/jobs", handlers::job_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    scheduler.shutdown().await?;

    Ok(())
}
