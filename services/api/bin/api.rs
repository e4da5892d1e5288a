//! Main Entrypoint for the Study Planning API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Loading the curriculum, prompts and completion client.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use sqlx::PgPool;
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc};
use studyplan_api::{
    config::{Config, Provider},
    db::{DocumentStore, PgDocumentStore},
    planning::PlanningService,
    router::create_router,
    state::AppState,
};
use studyplan_core::{
    curriculum::Curriculum,
    llm_client::{CompletionClient, OpenAICompatibleClient},
    prompts::PromptSet,
    tracks::TrackCatalog,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompt overrides from a directory. A missing
/// directory means the built-in prompts are used.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    if !prompts_path.is_dir() {
        return Ok(prompts);
    }
    for entry in fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = PgDocumentStore::new(pool);
    db.run_migrations().await?;
    let store: Arc<dyn DocumentStore> = Arc::new(db);
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Load Curriculum and Prompts ---
    let parsed = Curriculum::load(&config.curriculum_path).with_context(|| {
        format!(
            "Failed to load curriculum from {}",
            config.curriculum_path.display()
        )
    })?;
    for diagnostic in &parsed.diagnostics {
        warn!(path = %diagnostic.path, "Curriculum entry skipped: {}", diagnostic.message);
    }
    info!(
        grades = parsed.value.classes().len(),
        skipped = parsed.diagnostics.len(),
        "Curriculum loaded."
    );
    let curriculum = Arc::new(parsed.value);

    let prompts = Arc::new(PromptSet::with_overrides(load_prompts(
        &config.prompts_path,
    )?));

    // --- 5. Initialize the Completion Client ---
    let api_base = match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            OPENAI_API_BASE
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            GEMINI_API_BASE
        }
    };
    let api_key = config
        .api_key()
        .context("No API key configured for the selected provider")?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base);
    let client: Arc<dyn CompletionClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let app_state = Arc::new(AppState {
        planning: Arc::new(PlanningService::new(
            store,
            curriculum,
            TrackCatalog::default(),
            client,
            prompts,
        )),
    });

    // --- 6. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 7. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
