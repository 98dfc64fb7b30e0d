mod error;
mod oauth_client;
mod routes;
mod storage;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use chatfront_api::oauth;
use chatfront_backend_client::BackendClient;
use oauth_client::OAuthClient;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub backend: BackendClient,
    pub oauth: Option<OAuthClient>,
}

/// Server configuration loaded once from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub jwt_secret: String,
    pub backend_api_url: String,
    pub oauth_redirect_url: Option<String>,
}

impl AppConfig {
    /// The redirect URI registered with the provider. Defaults to
    /// `<base_url>/auth/callback`; deployments behind another hostname set
    /// `OAUTH_REDIRECT_URL` instead of patching code.
    pub fn oauth_redirect_uri(&self) -> String {
        self.oauth_redirect_url
            .clone()
            .unwrap_or_else(|| format!("{}/auth/callback", self.base_url))
    }
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// Load the Google OAuth provider from environment variables.
fn try_load_google() -> Option<oauth::OAuthProviderConfig> {
    let id = std::env::var("GOOGLE_CLIENT_ID")
        .ok()
        .filter(|s| !s.is_empty())?;
    let secret = std::env::var("GOOGLE_CLIENT_SECRET")
        .ok()
        .filter(|s| !s.is_empty())?;
    tracing::info!("OAuth provider enabled: Google");
    Some(oauth::google_preset(id, secret))
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatfront_server=info,tower_http=info".into()),
        )
        .init();

    // Data directory
    let data_dir = env_nonempty("CHATFRONT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));

    tracing::info!("data directory: {}", data_dir.display());

    // Initialize the mirror database
    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    let base_url = env_nonempty("BASE_URL").unwrap_or_else(|| "http://127.0.0.1:8000".into());

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET not set — login and authenticated endpoints will be disabled");
    }

    let backend_api_url =
        env_nonempty("BACKEND_API_URL").unwrap_or_else(|| "http://localhost:9000".into());
    tracing::info!("chat backend: {backend_api_url}");

    let config = AppConfig {
        base_url: base_url.clone(),
        jwt_secret,
        backend_api_url: backend_api_url.clone(),
        oauth_redirect_url: env_nonempty("OAUTH_REDIRECT_URL"),
    };

    let state = AppState {
        db,
        backend: BackendClient::new(&backend_api_url),
        oauth: try_load_google().map(OAuthClient::new),
        config,
    };

    // Build API routes
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Current user
        .route("/v1/user", get(routes::auth::user_info))
        // Chat proxy
        .route("/v1/chat", post(routes::chat::chat))
        // Session management
        .route("/v1/sessions", post(routes::sessions::list_sessions))
        .route(
            "/v1/conversation-history",
            post(routes::sessions::conversation_history),
        )
        .route(
            "/v1/clear-conversation",
            post(routes::sessions::clear_conversation),
        );

    // Build main router
    let mut app = Router::new()
        .nest("/api", api)
        // Login flow
        .route("/login/google", get(routes::oauth::login_redirect))
        .route("/auth/callback", get(routes::oauth::callback))
        .route("/logout", get(routes::auth::logout));

    // Serve the chat page and assets if a web build is present
    let web_dir = env_nonempty("CHATFRONT_WEB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("web/build"));
    if web_dir.exists() {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(&web_dir).fallback(ServeFile::new(index_html)));
    }

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    tracing::info!("starting server at {base_url}");

    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
