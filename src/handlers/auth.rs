use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::actions::user::{self, BootstrapAdmin, ChangePassword, RegisterUser};
use crate::auth::{create_session, revoke_session, CurrentUser};
use crate::constants::TOKEN_TYPE;
use crate::error::ServerError;
use crate::handlers::{StatusResponse, UserResponse, ValidatedJson};
use crate::server::State;

/// The body of a `POST /api/auth/login` request.
#[derive(Debug, Validate, Deserialize)]
pub(crate) struct LoginInput {
    #[validate(email(message = "Must be a valid email address."))]
    pub(crate) email: String,
    #[validate(length(min = 1, message = "Must not be empty"))]
    pub(crate) password: String,
}

/// The response of a `POST /api/auth/login` request.
///
/// `access_token` is meant to be sent back as `Authorization: Bearer <token>`.
#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
    pub(crate) expires_in_days: u64,
}

#[derive(Debug, Validate, Deserialize)]
pub(crate) struct DeleteAccountInput {
    #[validate(length(min = 1, message = "Must not be empty"))]
    pub(crate) password: String,
}

/// Handler for `POST /api/auth/bootstrap`
pub(crate) async fn bootstrap(
    state: Extension<Arc<State>>,
    ValidatedJson(input): ValidatedJson<BootstrapAdmin>,
) -> Result<Json<UserResponse>, ServerError> {
    let admin = user::bootstrap_admin(
        &state.db,
        input,
        state.config.admin_bootstrap_token.as_deref(),
    )
    .await?;
    tracing::info!("Bootstrapped administrator {}", admin.id);
    Ok(Json(admin.into()))
}

/// Handler for `POST /api/auth/register`
pub(crate) async fn register(
    state: Extension<Arc<State>>,
    ValidatedJson(input): ValidatedJson<RegisterUser>,
) -> Result<(StatusCode, Json<UserResponse>), ServerError> {
    let user = user::register(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Handler for `POST /api/auth/login`
pub(crate) async fn login(
    state: Extension<Arc<State>>,
    ValidatedJson(input): ValidatedJson<LoginInput>,
) -> Result<Json<TokenResponse>, ServerError> {
    let user = user::authenticate(&state.db, &input.email, &input.password).await?;
    let access_token = create_session(&state, user.id).await?;
    tracing::debug!("User {} logged in", user.id);

    Ok(Json(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE,
        expires_in_days: state.config.session_expire_days,
    }))
}

/// Handler for `POST /api/auth/logout`
pub(crate) async fn logout(
    current: CurrentUser,
    state: Extension<Arc<State>>,
) -> Result<Json<StatusResponse>, ServerError> {
    revoke_session(&state, &current.token).await?;
    Ok(StatusResponse::new("ok"))
}

/// Handler for `GET /api/auth/me`
pub(crate) async fn me(current: CurrentUser) -> Json<UserResponse> {
    Json(current.user.into())
}

/// Handler for `POST /api/auth/change-password`
pub(crate) async fn change_password(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    ValidatedJson(input): ValidatedJson<ChangePassword>,
) -> Result<Json<StatusResponse>, ServerError> {
    user::change_password(&state.db, current.user, input).await?;
    Ok(StatusResponse::new("ok"))
}

/// Handler for `POST /api/auth/delete-account`
pub(crate) async fn delete_account(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    ValidatedJson(input): ValidatedJson<DeleteAccountInput>,
) -> Result<Json<StatusResponse>, ServerError> {
    user::delete_account(&state.db, &current.user, &input.password).await?;
    revoke_session(&state, &current.token).await?;
    Ok(StatusResponse::new("deleted"))
}
