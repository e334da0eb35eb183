use axum::{
    extract::{Extension, Path},
    Json,
};
use entity::parse_log;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::actions::stats::{self, AdminStats};
use crate::actions::user::{self, CreateUser, UpdateUser};
use crate::actions::parse_log as parse_logs;
use crate::auth::AdminUser;
use crate::error::ServerError;
use crate::handlers::{QueryParams, StatusResponse, UserResponse, ValidatedJson};
use crate::server::State;

const DEFAULT_LOG_LIMIT: u64 = 100;
const MAX_LOG_LIMIT: u64 = 1000;

#[derive(Debug, Serialize)]
pub(crate) struct CreatedUserResponse {
    pub(crate) user: UserResponse,
    pub(crate) temporary_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetResponse {
    pub(crate) user_id: i32,
    pub(crate) temporary_password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogsQuery {
    pub(crate) limit: Option<u64>,
}

/// Handler for `GET /api/admin/users`
pub(crate) async fn list_users(
    _: AdminUser,
    state: Extension<Arc<State>>,
) -> Result<Json<Vec<UserResponse>>, ServerError> {
    let users = user::list_newest_first(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Handler for `POST /api/admin/users`
pub(crate) async fn create_user(
    AdminUser(admin): AdminUser,
    state: Extension<Arc<State>>,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> Result<Json<CreatedUserResponse>, ServerError> {
    let (created, temporary_password) = user::create_by_admin(&state.db, input).await?;
    tracing::info!("Admin {} created user {}", admin.user.id, created.id);
    Ok(Json(CreatedUserResponse {
        user: created.into(),
        temporary_password,
    }))
}

/// Handler for `PATCH /api/admin/users/:id`
pub(crate) async fn update_user(
    _: AdminUser,
    state: Extension<Arc<State>>,
    Path(id): Path<i32>,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> Result<Json<UserResponse>, ServerError> {
    let updated = user::update(&state.db, id, input).await?;
    Ok(Json(updated.into()))
}

/// Handler for `POST /api/admin/users/:id/reset-password`
pub(crate) async fn reset_password(
    _: AdminUser,
    state: Extension<Arc<State>>,
    Path(id): Path<i32>,
) -> Result<Json<PasswordResetResponse>, ServerError> {
    let temporary_password = user::reset_password(&state.db, id).await?;
    Ok(Json(PasswordResetResponse {
        user_id: id,
        temporary_password,
    }))
}

/// Handler for `DELETE /api/admin/users/:id`
pub(crate) async fn delete_user(
    _: AdminUser,
    state: Extension<Arc<State>>,
    Path(id): Path<i32>,
) -> Result<Json<StatusResponse>, ServerError> {
    user::delete_with_data(&state.db, id).await?;
    Ok(StatusResponse::new("deleted"))
}

/// Handler for `GET /api/admin/parse-logs`
pub(crate) async fn parse_logs(
    _: AdminUser,
    state: Extension<Arc<State>>,
    QueryParams(query): QueryParams<LogsQuery>,
) -> Result<Json<Vec<parse_log::Model>>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
    Ok(Json(parse_logs::list_newest_first(&state.db, limit).await?))
}

/// Handler for `GET /api/admin/stats`
pub(crate) async fn admin_stats(
    _: AdminUser,
    state: Extension<Arc<State>>,
) -> Result<Json<AdminStats>, ServerError> {
    Ok(Json(stats::for_admin(&state.db).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::user::tests::active_user;
    use crate::auth::CurrentUser;
    use crate::config::Config;
    use crate::db::test_db;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use serde_json::Value;

    #[tokio::test]
    async fn created_user_is_answered_with_ok() {
        let db = test_db().await;
        let admin = active_user(&db, "admin@example.com").await;
        let state = Arc::new(State::with_db(Config::for_tests(), db).unwrap());

        let response = create_user(
            AdminUser(CurrentUser {
                user: admin,
                token: "token".to_string(),
            }),
            Extension(state),
            ValidatedJson(CreateUser {
                email: "Cook@Example.com".to_string(),
                password: None,
                is_admin: false,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["user"]["email"], "cook@example.com");
        assert_eq!(body["user"]["is_active"], true);
        assert!(body["temporary_password"].is_string());
    }
}
