use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use entity::recipe;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::actions::parse_log;
use crate::actions::recipe::{self as recipes, RateRecipe, RecipeContent, UpdateRecipe};
use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::handlers::{JsonBody, QueryParams, RecipeResponse, ValidatedJson};
use crate::planner::{self, CustomRecipeText};
use crate::scraping::{self, ScrapedRecipe};
use crate::server::State;

const DEFAULT_PAGE_LIMIT: u64 = 100;
const MAX_PAGE_LIMIT: u64 = 1000;

/// The body of a `POST /api/parse-recipe` request.
#[derive(Debug, Validate, Deserialize)]
pub(crate) struct ParseRecipeInput {
    #[validate(length(min = 1, max = 2048, message = "Must be between 1 and 2048 characters"))]
    pub(crate) url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RatingResponse {
    pub(crate) recipe_id: i32,
    pub(crate) rating: i32,
}

/// Title and ingredients are mandatory; the yield text becomes the base portion count.
fn content_from_scrape(scraped: ScrapedRecipe) -> Result<RecipeContent, ServerError> {
    let title = scraped
        .title
        .ok_or_else(|| ServerError::bad_request("Could not extract the recipe title from this page"))?;
    if scraped.ingredients.is_empty() {
        return Err(ServerError::bad_request(
            "Could not extract ingredients from this page",
        ));
    }

    Ok(RecipeContent {
        title,
        ingredients: scraped.ingredients,
        instructions: scraped.instructions,
        image_url: scraped.image,
        base_portions: scraping::extract_portion_count(scraped.yields.as_deref().unwrap_or_default()),
    })
}

async fn scrape_and_store(
    db: &DatabaseConnection,
    http: &reqwest::Client,
    owner_id: i32,
    url: &str,
) -> Result<recipe::Model, ServerError> {
    let html = scraping::fetch_html(http, url).await?;
    let content = content_from_scrape(scraping::extract_recipe(&html))?;
    recipes::upsert_scraped(db, owner_id, url, content).await
}

/// Scrape and store a recipe, writing the outcome of the attempt to the parse log.
async fn parse_and_log(
    db: &DatabaseConnection,
    http: &reqwest::Client,
    owner_id: i32,
    url: &str,
) -> Result<recipe::Model, ServerError> {
    tracing::info!("Parsing recipe from: {}", url);
    let result = scrape_and_store(db, http, owner_id, url).await;
    match &result {
        Ok(_) => parse_log::record(db, owner_id, url, None).await,
        Err(e) => {
            tracing::warn!("Parsing {} failed: {}", url, e);
            parse_log::record(db, owner_id, url, Some(e.to_string())).await
        }
    }
    result
}

/// Handler for `POST /api/parse-recipe`
pub(crate) async fn parse_recipe(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    ValidatedJson(input): ValidatedJson<ParseRecipeInput>,
) -> Result<(StatusCode, Json<RecipeResponse>), ServerError> {
    let owner_id = current.user.id;
    let recipe = parse_and_log(&state.db, &state.http, owner_id, input.url.trim()).await?;
    let rating = recipes::rating_for(&state.db, owner_id, recipe.id).await?;
    Ok((StatusCode::CREATED, Json(RecipeResponse::new(recipe, rating))))
}

/// Handler for `POST /api/recipes/custom`
pub(crate) async fn create_custom(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    JsonBody(input): JsonBody<CustomRecipeText>,
) -> Result<(StatusCode, Json<RecipeResponse>), ServerError> {
    let content = planner::parse_recipe_text(state.llm.as_deref(), &input).await?;
    let recipe = recipes::create_custom(&state.db, current.user.id, content).await?;
    tracing::info!("Created custom recipe {} for user {}", recipe.id, current.user.id);
    Ok((StatusCode::CREATED, Json(RecipeResponse::new(recipe, None))))
}

/// Handler for `GET /api/recipes/available`
pub(crate) async fn available(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    QueryParams(page): QueryParams<PageQuery>,
) -> Result<Json<Vec<RecipeResponse>>, ServerError> {
    let owner_id = current.user.id;
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let found = recipes::list_owned(&state.db, owner_id, page.skip.unwrap_or(0), limit).await?;

    let ids = found.iter().map(|recipe| recipe.id).collect();
    let ratings = recipes::ratings_for(&state.db, owner_id, ids).await?;
    tracing::debug!("Retrieved {} recipes", found.len());

    Ok(Json(
        found
            .into_iter()
            .map(|recipe| {
                let rating = ratings.get(&recipe.id).copied();
                RecipeResponse::new(recipe, rating)
            })
            .collect(),
    ))
}

/// Handler for `GET /api/recipes/:id`
pub(crate) async fn get_recipe(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    Path(id): Path<i32>,
) -> Result<Json<RecipeResponse>, ServerError> {
    let recipe = recipes::get_owned(&state.db, current.user.id, id).await?;
    let rating = recipes::rating_for(&state.db, current.user.id, id).await?;
    Ok(Json(RecipeResponse::new(recipe, rating)))
}

/// Handler for `PUT /api/recipes/:id`
pub(crate) async fn update_recipe(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    Path(id): Path<i32>,
    ValidatedJson(changes): ValidatedJson<UpdateRecipe>,
) -> Result<Json<RecipeResponse>, ServerError> {
    let recipe = recipes::update(&state.db, current.user.id, id, changes).await?;
    let rating = recipes::rating_for(&state.db, current.user.id, id).await?;
    Ok(Json(RecipeResponse::new(recipe, rating)))
}

/// Handler for `PUT /api/recipes/:id/rating`
pub(crate) async fn rate_recipe(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    Path(id): Path<i32>,
    ValidatedJson(input): ValidatedJson<RateRecipe>,
) -> Result<Json<RatingResponse>, ServerError> {
    let rating = recipes::set_rating(&state.db, current.user.id, id, input).await?;
    Ok(Json(RatingResponse {
        recipe_id: id,
        rating,
    }))
}

/// Handler for `DELETE /api/recipes/:id`
pub(crate) async fn delete_recipe(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServerError> {
    recipes::delete(&state.db, current.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
