mod config;
mod db;
mod dispatch;
mod error;
mod notify;
mod rides;
mod store;
mod validation;
mod wallet;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::AppConfig;
use dispatch::{DispatchEngine, DispatchPolicy, PassSummary};
use notify::LogNotifier;
use rides::{
    CancelRideRequest, CancelRideResponse, CancelledBy, DiscountType, GeoPointRequest,
    PaymentMethod, PaymentResponse, PaymentStatus, RideResponse, RideService, RideStatus,
    ScheduleRideRequest, ScheduleRideResponse,
};
use store::PgRideStore;
use wallet::{WalletEntryType, WalletHistory, WalletResponse};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        rides::handlers::schedule_ride_handler,
        rides::handlers::list_upcoming_handler,
        rides::handlers::cancel_ride_handler,
        wallet::handlers::get_wallet_handler,
        dispatch::handlers::run_activation_pass_handler,
    ),
    components(
        schemas(
            ScheduleRideRequest,
            GeoPointRequest,
            CancelRideRequest,
            ScheduleRideResponse,
            CancelRideResponse,
            RideResponse,
            PaymentResponse,
            RideStatus,
            PaymentStatus,
            PaymentMethod,
            DiscountType,
            CancelledBy,
            WalletResponse,
            WalletHistory,
            WalletEntryType,
            PassSummary,
        )
    ),
    tags(
        (name = "rides", description = "Scheduled ride booking and cancellation"),
        (name = "dispatch", description = "Activation pass control"),
        (name = "wallets", description = "Wallet balance and ledger reads")
    ),
    info(
        title = "Scheduled Ride API",
        version = "1.0.0",
        description = "Booking, activation and driver assignment for prepaid scheduled rides"
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PgRideStore>,
    pub ride_service: RideService<PgRideStore>,
    pub engine: Arc<DispatchEngine<PgRideStore>>,
}

/// Handler for GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // API routes
        .route("/health", get(health))
        .route("/api/rides/schedule", post(rides::schedule_ride_handler))
        .route("/api/rides/upcoming", get(rides::list_upcoming_handler))
        .route("/api/rides/:ride_id/cancel", post(rides::cancel_ride_handler))
        .route("/api/wallets/:user_id", get(wallet::get_wallet_handler))
        .route(
            "/api/dispatch/run",
            post(dispatch::run_activation_pass_handler),
        )
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Scheduled Ride API - Starting...");

    let config = AppConfig::from_env();

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    let store = Arc::new(PgRideStore::new(db_pool));
    let notifier = Arc::new(LogNotifier);

    let engine = Arc::new(DispatchEngine::new(
        store.clone(),
        notifier.clone(),
        notifier.clone(),
        DispatchPolicy {
            batch_size: config.batch_size,
            grace_minutes: config.grace_minutes,
        },
    ));

    let ride_service = RideService::new(store.clone(), notifier, config.min_lead_minutes);

    // Background poller that activates due rides
    let scheduler = dispatch::ActivationScheduler::new(engine.clone(), config.poll_interval);
    let scheduler_handle = scheduler.spawn();

    let app = create_router(AppState {
        store,
        ride_service,
        engine,
    });

    // Start the Axum server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Scheduled Ride API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for shutdown signal");
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");

    // Stop the poller cleanly before the process exits
    scheduler.stop();
    let _ = scheduler_handle.await;
}

#[cfg(test)]
mod tests;
