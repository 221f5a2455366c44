// Crop Predictor API v0.1
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::predict::AppState;
use services::imagery::ImageryClient;
use services::inference::{CropClassifier, FeatureScaler};

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// Crop Predictor API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Crop Predictor API",
        version = "0.1.0",
        description = "Crop/non-crop prediction from multi-sensor satellite time series. \
            Assembles a twelve-month optical + radar series for a ground point, runs a \
            pretrained classifier over it and layers an index-based sub-classification \
            on top; also stores user profiles for the frontend.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service liveness"),
        (name = "Prediction", description = "Live crop prediction"),
        (name = "Users", description = "User profile storage"),
    ),
    paths(
        routes::health::liveness,
        routes::predict::predict_live,
        routes::users::save_user,
    ),
    components(
        schemas(
            routes::predict::PredictRequest,
            routes::predict::PredictResponse,
            routes::predict::ReportDetails,
            routes::predict::Coordinates,
            routes::predict::ChartData,
            routes::predict::SubclassMetrics,
            routes::users::SaveUserRequest,
            routes::users::SaveUserResponse,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

/// Connect to the profile store and run migrations.
///
/// `None` (with error logs) on any failure: the service keeps serving and
/// /save_user answers 500 until the store comes back.
async fn init_profile_store(config: &AppConfig) -> Option<PgPool> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; user profile store disabled");
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            return None;
        }
    };

    if let Err(e) = sqlx::migrate!().run(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        return None;
    }

    tracing::info!("Database migrations completed");
    Some(pool)
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crop_predictor_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let profiles = init_profile_store(&config).await;

    // Load inference artifacts. A failed load degrades /predict_live to 500
    // instead of aborting startup.
    let model = match CropClassifier::from_file(Path::new(&config.model_path)) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            tracing::error!("Failed to load model: {}", e);
            None
        }
    };
    let scaler = match FeatureScaler::from_file(Path::new(&config.scaler_path)) {
        Ok(scaler) => Some(Arc::new(scaler)),
        Err(e) => {
            tracing::error!("Failed to load feature scaler: {}", e);
            None
        }
    };

    let imagery = ImageryClient::new(&config.imagery_api_url, &config.imagery_project);

    let app_state = AppState {
        imagery,
        model,
        scaler,
        profiles,
        predict_gate: Arc::new(tokio::sync::Mutex::new(())),
        model_version: config.model_version.clone(),
    };

    // CORS — the browser frontend posts from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/", get(routes::health::liveness))
        .route("/predict_live", post(routes::predict::predict_live))
        .route("/save_user", post(routes::users::save_user))
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
