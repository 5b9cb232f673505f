use std::sync::Arc;

use mailflow::config::Config;
use mailflow::dispatch::Dispatcher;
use mailflow::engagement::MemoryEngagementStore;
use mailflow::http::{AppState, build_router};
use mailflow::provider::select_provider;
use mailflow::queue::{MemoryScheduleStore, QueueRunner, ScheduleStore};
use mailflow::suppression::SuppressionList;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env();
    tracing::info!(
        port = config.port,
        tick_secs = config.tick_interval.as_secs(),
        tracking = config.base_url.is_some(),
        "Starting mailflow"
    );

    let provider = select_provider(&config);
    let suppression = Arc::new(SuppressionList::new());
    let engagement = Arc::new(MemoryEngagementStore::new());
    let schedule: Arc<dyn ScheduleStore> = Arc::new(MemoryScheduleStore::new());

    let dispatcher = Arc::new(Dispatcher::new(
        provider,
        suppression.clone(),
        config.default_sender.clone(),
        config.base_url.clone(),
    ));

    let runner = Arc::new(QueueRunner::new(schedule.clone(), dispatcher.clone()));
    tokio::spawn(runner.clone().run(config.tick_interval));

    let app = build_router(AppState {
        dispatcher,
        engagement,
        suppression,
        schedule,
        runner,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
