/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Optional: the profile store is disabled (and /save_user answers 500)
    /// when unset.
    pub database_url: Option<String>,
    /// Base URL of the imagery aggregation platform.
    pub imagery_api_url: String,
    /// Project slug under which the platform accounts our sampling requests.
    pub imagery_project: String,
    pub model_path: String,
    pub scaler_path: String,
    /// Version string echoed in prediction reports.
    pub model_version: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            imagery_api_url: std::env::var("IMAGERY_API_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            imagery_project: std::env::var("IMAGERY_PROJECT")
                .unwrap_or_else(|_| "agrovision".to_string()),
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "./models/crop_model_v2.1.onnx".to_string()),
            scaler_path: std::env::var("SCALER_PATH")
                .unwrap_or_else(|_| "./models/data_scaler_v2.1.json".to_string()),
            model_version: std::env::var("MODEL_VERSION").unwrap_or_else(|_| "v2.1".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
        }
    }
}
