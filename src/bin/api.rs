use activity_recommender::{
    api::start_server,
    build_store,
    memory::ConversationLog,
    ActivityRepository, CompletionClient, ConfigSource, Recommender,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (.env, environment, config.ini)
    let config = match ConfigSource::from_environment().and_then(|source| source.load()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Activity Recommender - bot server");
    info!("Port: {}", config.port);
    info!("Completion deployment: {}", config.completion.model_name);

    // Create components
    let store = build_store(config.store_url.as_deref());
    let repository = ActivityRepository::new(store.clone());
    let conversations = ConversationLog::new(store);

    let completion = match CompletionClient::new(config.completion.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build completion client: {}", e);
            return Err(e.into());
        }
    };

    let recommender = Arc::new(
        Recommender::new(completion)
            .with_repository(repository)
            .with_conversation_log(conversations),
    );

    info!("Recommender initialized");

    start_server(recommender, config.port).await?;

    Ok(())
}
