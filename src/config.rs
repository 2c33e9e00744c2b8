use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub jwt_secret: String,

    pub google_api_key: String,
    pub google_api_base: String,
    pub gemini_model: String,
    pub imagen_model: String,
    pub upstream_timeout_secs: u64,

    // Object storage; None means images are returned inline and never persisted
    pub gcs_bucket: Option<String>,
    pub gcs_access_token: String,
    pub gcs_public_base: String,

    pub mock_generation: bool,
    pub generation_rate_limit: u32,
    pub history_limit: usize,
    pub negative_candidates: u8,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            jwt_secret: env::var("AUTH_JWT_SECRET").expect("AUTH_JWT_SECRET must be set"),

            google_api_key: env::var("GOOGLE_API_KEY").unwrap_or_default(),
            google_api_base: env::var("GOOGLE_API_BASE")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into()),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into()),
            imagen_model: env::var("IMAGEN_MODEL")
                .unwrap_or_else(|_| "imagen-4.0-generate-001".into()),
            upstream_timeout_secs: env::var("UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .expect("UPSTREAM_TIMEOUT_SECS must be a number"),

            gcs_bucket: env::var("GCS_BUCKET").ok().filter(|s| !s.is_empty()),
            gcs_access_token: env::var("GCS_ACCESS_TOKEN").unwrap_or_default(),
            gcs_public_base: env::var("GCS_PUBLIC_BASE")
                .unwrap_or_else(|_| "https://storage.googleapis.com".into()),

            mock_generation: env::var("MOCK_GENERATION")
                .map(|v| v == "true")
                .unwrap_or(false),
            generation_rate_limit: env::var("GENERATION_RATE_LIMIT")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),
            history_limit: env::var("HISTORY_LIMIT")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .unwrap_or(20),
            negative_candidates: env::var("NEGATIVE_CANDIDATES")
                .unwrap_or_else(|_| "3".into())
                .parse()
                .unwrap_or(3),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
