use chrono::Utc;
use entity::prelude::*;
use entity::recipe::Ingredients;
use entity::{recipe, recipe_rating};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashMap;
use ulid::Ulid;
use uuid::Uuid;
use validator::Validate;

use crate::constants::CUSTOM_URL_PREFIX;
use crate::error::ServerError;

/// Recipe contents coming from a scrape or from the AI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecipeContent {
    pub(crate) title: String,
    pub(crate) ingredients: Vec<String>,
    pub(crate) instructions: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) base_portions: i32,
}

/// The body of `PUT /api/recipes/:id`. Absent fields are left alone.
#[derive(Debug, Clone, Default, Validate, Deserialize)]
pub(crate) struct UpdateRecipe {
    #[validate(length(min = 1, max = 300, message = "Must be between 1 and 300 characters"))]
    pub(crate) title: Option<String>,
    #[validate(length(min = 1, message = "A recipe needs at least one ingredient"))]
    pub(crate) ingredients: Option<Vec<String>>,
    pub(crate) instructions: Option<String>,
    #[validate(url(message = "Must be a valid URL"))]
    pub(crate) image_url: Option<String>,
    #[validate(range(min = 1, max = 100, message = "Must be between 1 and 100"))]
    pub(crate) base_portions: Option<i32>,
}

/// The body of `PUT /api/recipes/:id/rating`.
#[derive(Debug, Clone, Copy, Validate, Deserialize)]
pub(crate) struct RateRecipe {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub(crate) rating: i32,
}

fn recipe_not_found(id: i32) -> ServerError {
    ServerError::not_found(format!("Recipe with ID {} was not found", id))
}

pub(crate) async fn find_owned(
    db: &DatabaseConnection,
    owner_id: i32,
    id: i32,
) -> Result<Option<recipe::Model>, ServerError> {
    Ok(Recipe::find_by_id(id)
        .filter(recipe::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?)
}

pub(crate) async fn get_owned(
    db: &DatabaseConnection,
    owner_id: i32,
    id: i32,
) -> Result<recipe::Model, ServerError> {
    find_owned(db, owner_id, id)
        .await?
        .ok_or_else(|| recipe_not_found(id))
}

pub(crate) async fn list_owned(
    db: &DatabaseConnection,
    owner_id: i32,
    skip: u64,
    limit: u64,
) -> Result<Vec<recipe::Model>, ServerError> {
    Ok(Recipe::find()
        .filter(recipe::Column::OwnerId.eq(owner_id))
        .order_by_asc(recipe::Column::Id)
        .offset(skip)
        .limit(limit)
        .all(db)
        .await?)
}

/// Insert a scraped recipe, or refresh the existing one with the same url.
pub(crate) async fn upsert_scraped(
    db: &DatabaseConnection,
    owner_id: i32,
    url: &str,
    content: RecipeContent,
) -> Result<recipe::Model, ServerError> {
    let existing = Recipe::find()
        .filter(recipe::Column::OwnerId.eq(owner_id))
        .filter(recipe::Column::Url.eq(url))
        .one(db)
        .await?;

    let recipe = match existing {
        Some(existing) => {
            tracing::info!("Recipe already exists, updating: {}", content.title);
            let mut active: recipe::ActiveModel = existing.into();
            active.title = Set(content.title);
            active.ingredients = Set(Ingredients(content.ingredients));
            active.instructions = Set(content.instructions);
            active.base_portions = Set(content.base_portions);
            active.image_url = Set(content.image_url);
            active.updated_at = Set(Some(Utc::now()));
            active.update(db).await?
        }
        None => {
            tracing::info!("Creating new recipe: {}", content.title);
            insert(db, owner_id, url.to_string(), content).await?
        }
    };
    Ok(recipe)
}

/// Store a recipe that has no source page, under a synthetic unique url.
pub(crate) async fn create_custom(
    db: &DatabaseConnection,
    owner_id: i32,
    content: RecipeContent,
) -> Result<recipe::Model, ServerError> {
    let url = format!("{}{}", CUSTOM_URL_PREFIX, Uuid::from(Ulid::new()));
    insert(db, owner_id, url, content).await
}

async fn insert(
    db: &DatabaseConnection,
    owner_id: i32,
    url: String,
    content: RecipeContent,
) -> Result<recipe::Model, ServerError> {
    let now = Utc::now();
    let recipe = recipe::ActiveModel {
        owner_id: Set(owner_id),
        title: Set(content.title),
        url: Set(url),
        image_url: Set(content.image_url),
        ingredients: Set(Ingredients(content.ingredients)),
        instructions: Set(content.instructions),
        created_at: Set(now),
        updated_at: Set(Some(now)),
        base_portions: Set(content.base_portions.max(1)),
        ..Default::default()
    };
    Ok(recipe.insert(db).await?)
}

pub(crate) async fn update(
    db: &DatabaseConnection,
    owner_id: i32,
    id: i32,
    changes: UpdateRecipe,
) -> Result<recipe::Model, ServerError> {
    let recipe = get_owned(db, owner_id, id).await?;
    let mut active: recipe::ActiveModel = recipe.into();
    if let Some(title) = changes.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(ingredients) = changes.ingredients {
        active.ingredients = Set(Ingredients(ingredients));
    }
    if let Some(instructions) = changes.instructions {
        active.instructions = Set(Some(instructions));
    }
    if let Some(image_url) = changes.image_url {
        active.image_url = Set(Some(image_url));
    }
    if let Some(base_portions) = changes.base_portions {
        active.base_portions = Set(base_portions);
    }
    active.updated_at = Set(Some(Utc::now()));
    Ok(active.update(db).await?)
}

pub(crate) async fn delete(
    db: &DatabaseConnection,
    owner_id: i32,
    id: i32,
) -> Result<recipe::Model, ServerError> {
    let recipe = get_owned(db, owner_id, id).await?;
    let txn = db.begin().await?;
    RecipeRating::delete_many()
        .filter(recipe_rating::Column::RecipeId.eq(id))
        .exec(&txn)
        .await?;
    Recipe::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;
    tracing::info!("Deleted recipe: {} (ID: {})", recipe.title, id);
    Ok(recipe)
}

/// The owner's ratings for the given recipes, keyed by recipe id.
pub(crate) async fn ratings_for(
    db: &DatabaseConnection,
    owner_id: i32,
    recipe_ids: Vec<i32>,
) -> Result<HashMap<i32, i32>, ServerError> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let ratings = RecipeRating::find()
        .filter(recipe_rating::Column::OwnerId.eq(owner_id))
        .filter(recipe_rating::Column::RecipeId.is_in(recipe_ids))
        .all(db)
        .await?;
    Ok(ratings
        .into_iter()
        .map(|rating| (rating.recipe_id, rating.rating))
        .collect())
}

pub(crate) async fn rating_for(
    db: &DatabaseConnection,
    owner_id: i32,
    recipe_id: i32,
) -> Result<Option<i32>, ServerError> {
    Ok(ratings_for(db, owner_id, vec![recipe_id])
        .await?
        .get(&recipe_id)
        .copied())
}

/// Create or overwrite the owner's rating of a recipe.
pub(crate) async fn set_rating(
    db: &DatabaseConnection,
    owner_id: i32,
    recipe_id: i32,
    input: RateRecipe,
) -> Result<i32, ServerError> {
    get_owned(db, owner_id, recipe_id).await?;

    let existing = RecipeRating::find()
        .filter(recipe_rating::Column::OwnerId.eq(owner_id))
        .filter(recipe_rating::Column::RecipeId.eq(recipe_id))
        .one(db)
        .await?;

    let now = Utc::now();
    let saved = match existing {
        Some(existing) => {
            let mut active: recipe_rating::ActiveModel = existing.into();
            active.rating = Set(input.rating);
            active.updated_at = Set(Some(now));
            active.update(db).await?
        }
        None => {
            recipe_rating::ActiveModel {
                owner_id: Set(owner_id),
                recipe_id: Set(recipe_id),
                rating: Set(input.rating),
                created_at: Set(now),
                updated_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };
    Ok(saved.rating)
}
