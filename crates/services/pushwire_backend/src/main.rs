// File: services/pushwire_backend/src/main.rs
use std::sync::Arc;

use axum::{routing::get, Router};
use pushwire_common::{logging, PushBroker, PushwireError};
use pushwire_config::{load_config, AppConfig};
use pushwire_db::{
    DbClient, DeviceRepository, MemoryDeviceRepository, MemoryPushMessageRepository,
    PushMessageRepository, RepositoryFactory, SqlDeviceRepository, SqlPushMessageRepository,
    SqlRepositoryFactory,
};
use pushwire_sns::SnsClient;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod app_state;

use app_state::AppState;

#[tokio::main]
async fn main() -> Result<(), PushwireError> {
    logging::init();

    let config = Arc::new(
        load_config().map_err(|e| PushwireError::ConfigError(format!("Failed to load config: {}", e)))?,
    );
    let broker: Arc<dyn PushBroker> = Arc::new(SnsClient::new(&config.sns).await);

    match &config.database {
        Some(db_config) => {
            let client = DbClient::from_config(db_config).await?;
            let factory = SqlRepositoryFactory::from_config(db_config)?;
            let devices: SqlDeviceRepository = factory.create_repository(client.clone());
            let messages: SqlPushMessageRepository = factory.create_repository(client);
            info!("Using database {}", db_config.url);
            run(config.clone(), broker, devices, messages).await
        }
        None => {
            warn!("No database configured, devices and push messages are kept in memory");
            run(
                config.clone(),
                broker,
                MemoryDeviceRepository::new(),
                MemoryPushMessageRepository::new(),
            )
            .await
        }
    }
}

async fn run<D, M>(
    config: Arc<AppConfig>,
    broker: Arc<dyn PushBroker>,
    devices: D,
    messages: M,
) -> Result<(), PushwireError>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    devices.init_schema().await?;
    messages.init_schema().await?;

    let state = AppState::new(config.clone(), broker, devices, messages);

    let api_router = Router::new()
        .route("/", get(|| async { "Welcome to Pushwire API!" }))
        .merge(state.router());

    #[allow(unused_mut)] // mutable with the openapi feature
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api_router);

    // Conditionally add Swagger UI and JSON endpoint if openapi feature enabled
    #[cfg(feature = "openapi")]
    {
        use pushwire_sns::openapi::PushApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "Pushwire API",
                version = "0.1.0",
                description = "Mobile push dispatch through Amazon SNS",
                license(name = "MIT", url = "https://opensource.org/licenses/MIT")
            ),
            servers( (url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(PushApiDoc::openapi());
        info!("Adding Swagger UI at /api/docs");

        let swagger_ui = SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc);
        app = app.merge(swagger_ui);
    }

    let app = app.layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| PushwireError::ConfigError(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PushwireError::InternalError(format!("Server error: {}", e)))?;

    state.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
