use axum::{
    extract::Extension,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::actions::plan;
use crate::actions::stats::{self, UserStats};
use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::handlers::{JsonBody, ValidatedJson};
use crate::planner::{self, ExportRequest, PlannerRequest, ShoppingListResponse, ICS_FILENAME};
use crate::server::State;

#[derive(Debug, Deserialize)]
pub(crate) struct SavePlanInput {
    #[serde(default)]
    pub(crate) selections: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlanResponse {
    pub(crate) plan: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct SavedPlanResponse {
    pub(crate) status: &'static str,
    pub(crate) items: usize,
}

/// Handler for `POST /api/planner/generate`
pub(crate) async fn generate_shopping_list(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    ValidatedJson(request): ValidatedJson<PlannerRequest>,
) -> Result<Json<ShoppingListResponse>, ServerError> {
    let response =
        planner::generate(&state.db, state.llm.as_deref(), current.user.id, &request).await?;
    Ok(Json(response))
}

/// Handler for `GET /api/plan/load`
pub(crate) async fn load_plan(
    current: CurrentUser,
    state: Extension<Arc<State>>,
) -> Result<Json<PlanResponse>, ServerError> {
    let plan = plan::load(&state.db, current.user.id).await?;
    Ok(Json(PlanResponse { plan }))
}

/// Handler for `POST /api/plan/save`
pub(crate) async fn save_plan(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    JsonBody(input): JsonBody<SavePlanInput>,
) -> Result<Json<SavedPlanResponse>, ServerError> {
    let items = plan::save(&state.db, current.user.id, input.selections).await?;
    Ok(Json(SavedPlanResponse {
        status: "success",
        items,
    }))
}

/// Handler for `POST /api/plan/export-ics`
pub(crate) async fn export_ics(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    JsonBody(request): JsonBody<ExportRequest>,
) -> Result<Response, ServerError> {
    let calendar = planner::export_current_week(&state.db, current.user.id, &request).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ICS_FILENAME),
            ),
        ],
        calendar,
    )
        .into_response())
}

/// Handler for `GET /api/stats`
pub(crate) async fn user_stats(
    current: CurrentUser,
    state: Extension<Arc<State>>,
) -> Result<Json<UserStats>, ServerError> {
    Ok(Json(stats::for_user(&state.db, current.user.id).await?))
}
