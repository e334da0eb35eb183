use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use chrono::{DateTime, Utc};
use entity::{recipe, user_account};
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

use crate::error::ServerError;

pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod calendar;
pub(crate) mod planner;
pub(crate) mod recipes;
pub(crate) mod system;

/// A JSON body that passed its `validator` rules.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ValidatedJson<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// A JSON body whose rejection is reported like every other [`ServerError`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct JsonBody<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// Query parameters, rejected the same way as [`JsonBody`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct QueryParams<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(QueryParams(value))
    }
}

/// An account as shown to clients.
#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: i32,
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) email: String,
    pub(crate) is_admin: bool,
    pub(crate) is_active: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) last_login_at: Option<DateTime<Utc>>,
}

impl From<user_account::Model> for UserResponse {
    fn from(user: user_account::Model) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            is_admin: user.is_admin,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// A recipe together with the caller's rating of it.
#[derive(Debug, Serialize)]
pub(crate) struct RecipeResponse {
    pub(crate) id: i32,
    pub(crate) title: String,
    pub(crate) url: String,
    pub(crate) image_url: Option<String>,
    pub(crate) ingredients: Vec<String>,
    pub(crate) instructions: Option<String>,
    pub(crate) base_portions: i32,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) rating: Option<i32>,
}

impl RecipeResponse {
    pub(crate) fn new(recipe: recipe::Model, rating: Option<i32>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            url: recipe.url,
            image_url: recipe.image_url,
            ingredients: recipe.ingredients.0,
            instructions: recipe.instructions,
            base_portions: recipe.base_portions,
            created_at: recipe.created_at,
            updated_at: recipe.updated_at,
            rating,
        }
    }
}

/// `{"status": ...}` acknowledgements.
#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: &'static str,
}

impl StatusResponse {
    pub(crate) fn new(status: &'static str) -> Json<Self> {
        Json(Self { status })
    }
}
