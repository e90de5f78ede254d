use push_relay::{
    db::{create_pool, run_migrations},
    push::{HttpPushTransport, PushTransport},
    routes::create_router,
    schedule::{start_scheduler, MemoryScheduleStore, ScheduleRepository, ScheduleStore, SystemClock},
    subscription::{MemorySubscriptionStore, SubscriptionRepository, SubscriptionStore},
    AppState, Config,
};
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,push_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Pick stores
    let (subscription_store, schedule_store): (Arc<dyn SubscriptionStore>, Arc<dyn ScheduleStore>) =
        match &config.database_url {
            Some(database_url) => {
                tracing::info!("Connecting to database...");
                let db = create_pool(database_url).await?;

                tracing::info!("Running migrations...");
                run_migrations(&db).await?;

                (
                    Arc::new(SubscriptionRepository::new(db.clone())),
                    Arc::new(ScheduleRepository::new(db)),
                )
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL not set, using in-memory stores; scheduled notifications will not survive a restart"
                );
                (
                    Arc::new(MemorySubscriptionStore::new()),
                    Arc::new(MemoryScheduleStore::new()),
                )
            }
        };

    let transport: Arc<dyn PushTransport> = Arc::new(HttpPushTransport::new(Duration::from_secs(
        config.push_request_timeout_secs,
    ))?);

    // Create application state
    let state = AppState::new(
        config.clone(),
        subscription_store,
        schedule_store,
        transport,
        Arc::new(SystemClock),
    );

    // Start scheduled notification poller
    let _scheduler = start_scheduler(
        state.schedule_service.clone(),
        &config.scheduler_cron,
        config.scheduler_batch_size,
    )
    .await?;

    // Create router
    let app = create_router(state);

    // Start server
    let addr = config.addr();

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
