use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::HeaderValue,
    routing::{get, patch, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::calendar::GoogleClient;
use crate::config::Config;
use crate::db;
use crate::handlers::{admin, auth, calendar, planner, recipes, system};
use crate::llm::{GroqProvider, LlmProvider};

/// Shared by every request.
pub(crate) struct State {
    pub(crate) config: Config,
    pub(crate) db: DatabaseConnection,
    pub(crate) redis_client: redis::Client,
    /// Pooled client for scraping and the outbound APIs.
    pub(crate) http: reqwest::Client,
    pub(crate) llm: Option<Arc<dyn LlmProvider>>,
    pub(crate) google: Option<GoogleClient>,
}

impl State {
    /// Attempt to create a new State instance
    pub(crate) async fn try_new(config: Config) -> Result<State> {
        let db = db::connect(&config.database_url)
            .await
            .context("Failed to connect to the database")?;
        db::sync_schema(&db)
            .await
            .context("Failed to create the database schema")?;
        Self::with_db(config, db)
    }

    /// Build the state around an already prepared database. Redis is connected lazily.
    pub(crate) fn with_db(config: Config, db: DatabaseConnection) -> Result<State> {
        let redis_client =
            redis::Client::open(config.redis_url.as_str()).context("Invalid REDIS_URL")?;
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build the HTTP client")?;

        let llm = config.groq.clone().map(|groq| {
            Arc::new(GroqProvider::new(groq, http.clone())) as Arc<dyn LlmProvider>
        });
        let google = config
            .google
            .clone()
            .map(|google| GoogleClient::new(google, http.clone()));
        if google.is_none() {
            tracing::warn!("Google OAuth is not configured, calendar sync will be unavailable");
        }

        Ok(State {
            config,
            db,
            redis_client,
            http,
            llm,
            google,
        })
    }
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid origin {:?}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_credentials(true)
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
        }
    }
}

/// Every route of the API, with the shared state and middleware attached.
pub(crate) fn router(state: Arc<State>) -> Router {
    let cors = cors_layer(state.config.allowed_origins.as_deref());

    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        // auth
        .route("/api/auth/bootstrap", post(auth::bootstrap))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/change-password", post(auth::change_password))
        .route("/api/auth/delete-account", post(auth::delete_account))
        // admin
        .route(
            "/api/admin/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route(
            "/api/admin/users/:id",
            patch(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/api/admin/users/:id/reset-password",
            post(admin::reset_password),
        )
        .route("/api/admin/parse-logs", get(admin::parse_logs))
        .route("/api/admin/stats", get(admin::admin_stats))
        // recipes
        .route("/api/parse-recipe", post(recipes::parse_recipe))
        .route("/api/recipes/custom", post(recipes::create_custom))
        .route("/api/recipes/available", get(recipes::available))
        .route(
            "/api/recipes/:id",
            get(recipes::get_recipe)
                .put(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/api/recipes/:id/rating", put(recipes::rate_recipe))
        // planner
        .route("/api/planner/generate", post(planner::generate_shopping_list))
        .route("/api/plan/load", get(planner::load_plan))
        .route("/api/plan/save", post(planner::save_plan))
        .route("/api/plan/export-ics", post(planner::export_ics))
        .route("/api/stats", get(planner::user_stats))
        // google calendar
        .route("/api/google/status", get(calendar::status))
        .route("/api/google/oauth/start", get(calendar::oauth_start))
        .route("/api/google/oauth/callback", get(calendar::oauth_callback))
        .route("/api/google/calendars", get(calendar::calendars))
        .route("/api/google/calendar/select", post(calendar::select_calendar))
        .route("/api/google/plan/sync", post(calendar::sync))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the server.
pub(crate) async fn run() -> Result<()> {
    let config = Config::from_env()?;
    let addr = config.addr.clone();
    let state = Arc::new(State::try_new(config).await?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("KitchenOS listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
