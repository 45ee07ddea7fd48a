use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use cookbook_core::StoreError;
use cookbook_core::generate::{GenerationRequest, generate_recipe};
use cookbook_core::models::{
    ExportData, HistoryEntry, ImportSummary, Recipe, RecipeInput, RecipePatch, RecipeStats,
    Settings, SettingsPatch, SortOrder, UserProfile, coerce_int, validate_rating,
};

use crate::commands::Store;
use crate::generation::GenerationClient;

const BODY_LIMIT: usize = 50 * 1024 * 1024; // 50 MB, images travel inline

const NO_KEY_MESSAGE: &str = "No server API key configured. Set GEMINI_API_KEY or OPENAI_API_KEY.";

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
    generator: Option<Arc<GenerationClient>>,
}

impl AppState {
    fn store(&self) -> MutexGuard<'_, Store> {
        self.store
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn generator(&self) -> Result<Arc<GenerationClient>, ApiError> {
        self.generator
            .clone()
            .ok_or_else(|| ApiError::NotConfigured(NO_KEY_MESSAGE.to_string()))
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct RecipeQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    meal: String,
    sort: Option<String>,
}

#[derive(Deserialize)]
struct RatingRequest {
    #[serde(default)]
    rating: serde_json::Value,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: Option<String>,
    email: Option<String>,
    bio: Option<String>,
}

#[derive(Deserialize)]
struct PromptRequest {
    #[serde(default)]
    prompt: String,
}

#[derive(Serialize)]
struct PromptReply {
    reply: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRecipeRequest {
    #[serde(default)]
    prompt: String,
    meal_type: Option<String>,
    difficulty: Option<String>,
    #[serde(default)]
    save: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    BadGateway(String),
    NotConfigured(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::NotConfigured(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(_) | StoreError::ImportFormat(_) => {
                Self::BadRequest(err.to_string())
            }
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::Generation(msg) => Self::BadGateway(msg),
            StoreError::Storage(e) => Self::Internal(e),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Recipe handlers ---

async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    let order = query
        .sort
        .as_deref()
        .map(str::parse::<SortOrder>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let store = state.store();
    let recipes = match order {
        Some(order) => store.search_sorted(&query.q, &query.meal, order),
        None => store.search(&query.q, &query.meal),
    };
    Ok(Json(recipes))
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(input): Json<RecipeInput>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let recipe = state.store().create(input)?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(state.store().get(&id)?))
}

async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<RecipeInput>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(state.store().update(&id, input)?))
}

async fn patch_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<RecipePatch>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(state.store().patch(&id, patch)?))
}

/// Deleting an id that is already gone still answers 204.
async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store().delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(state.store().toggle_favorite(&id)?))
}

async fn set_rating(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RatingRequest>,
) -> Result<Json<Recipe>, ApiError> {
    let value = coerce_int(&req.rating).ok_or_else(|| {
        ApiError::BadRequest("rating must be a whole number between 0 and 5".to_string())
    })?;
    validate_rating(value)?;
    Ok(Json(state.store().set_rating(&id, value)?))
}

async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(state.store().record_view(&id)?))
}

// --- Query handlers ---

async fn list_favorites(State(state): State<AppState>) -> Json<Vec<Recipe>> {
    Json(state.store().favorites())
}

async fn get_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.store().history().to_vec())
}

async fn get_stats(State(state): State<AppState>) -> Json<RecipeStats> {
    Json(state.store().stats())
}

// --- Profile / settings handlers ---

async fn get_profile(State(state): State<AppState>) -> Result<Json<UserProfile>, ApiError> {
    state
        .store()
        .profile()
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Not logged in".to_string()))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.store().login(&req.name, &req.email)?))
}

async fn update_profile(
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.store().update_profile(
        req.name.as_deref(),
        req.email.as_deref(),
        req.bio.as_deref(),
    )?;
    Ok(Json(profile))
}

async fn logout(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store().logout()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.store().settings())
}

async fn put_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<Settings>, ApiError> {
    let mut store = state.store();
    let merged = store.settings().merged(patch);
    Ok(Json(store.save_settings(merged)?))
}

// --- Export / Import handlers ---

async fn export_data(State(state): State<AppState>) -> Json<ExportData> {
    Json(state.store().export())
}

async fn import_data(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportSummary>, ApiError> {
    Ok(Json(state.store().import_json(&body)?))
}

// --- Generation handlers ---

/// Forward a raw prompt to the configured provider.
async fn generate_reply(
    State(state): State<AppState>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<PromptReply>, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing prompt".to_string()));
    }
    let generator = state.generator()?;
    let reply = generator.complete(&req.prompt).await.map_err(|e| {
        tracing::warn!(error = %e, "generation proxy failed");
        ApiError::BadGateway(format!("{e:#}"))
    })?;
    Ok(Json(PromptReply { reply }))
}

async fn generate_recipe_handler(
    State(state): State<AppState>,
    Json(req): Json<GenerateRecipeRequest>,
) -> Result<Response, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please enter a recipe description".to_string(),
        ));
    }
    let generator = state.generator()?;
    let request = GenerationRequest {
        prompt: req.prompt,
        meal_type: req.meal_type,
        difficulty: req.difficulty,
    };

    let generated = generate_recipe(generator.as_ref(), &request).await?;

    if req.save {
        let recipe = state.store().save_generated(generated)?;
        return Ok((StatusCode::CREATED, Json(recipe)).into_response());
    }
    Ok(Json(generated).into_response())
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route("/api/recipes/generate", post(generate_recipe_handler))
        .route(
            "/api/recipes/{id}",
            get(get_recipe)
                .put(update_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
        .route("/api/recipes/{id}/favorite", post(toggle_favorite))
        .route("/api/recipes/{id}/rating", put(set_rating))
        .route("/api/recipes/{id}/view", post(record_view))
        .route("/api/favorites", get(list_favorites))
        .route("/api/history", get(get_history))
        .route("/api/stats", get(get_stats))
        .route(
            "/api/profile",
            get(get_profile).put(update_profile).delete(logout),
        )
        .route("/api/profile/login", post(login))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/export", get(export_data))
        .route("/api/import", post(import_data))
        .route("/api/generate", post(generate_reply))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    store: Store,
    generator: Option<GenerationClient>,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    match &generator {
        Some(client) => tracing::info!(provider = client.provider().name(), "generation enabled"),
        None => eprintln!(
            "Note: recipe generation is disabled. Set GEMINI_API_KEY or OPENAI_API_KEY to enable it."
        ),
    }

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        generator: generator.map(Arc::new),
    };
    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        eprintln!(
            "Warning: Listening on {bind}. Any device on your network can read and change your recipes."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
