use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use entity::calendar_token;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::actions;
use crate::auth::CurrentUser;
use crate::calendar::{
    sync_plan, CalendarItem, CalendarSession, GoogleClient, GoogleError, SyncRequest, SyncResponse,
};
use crate::constants::{OAUTH_STATE_EXPIRY_SECS, OAUTH_STATE_KEY_PREFIX};
use crate::error::ServerError;
use crate::handlers::{QueryParams, ValidatedJson};
use crate::server::State;
use crate::utils::RKeys;

const CONNECTED_PAGE: &str = "<!doctype html><meta charset='utf-8'/><title>KitchenOS</title>\
<p>Connected to Google Calendar. You can return to the app.</p>";

#[derive(Debug, Serialize)]
pub(crate) struct ConnectionStatus {
    pub(crate) connected: bool,
    pub(crate) calendar_id: Option<String>,
    pub(crate) calendar_summary: Option<String>,
}

impl From<Option<calendar_token::Model>> for ConnectionStatus {
    fn from(record: Option<calendar_token::Model>) -> Self {
        match record {
            Some(record) => Self {
                connected: true,
                calendar_id: record.calendar_id,
                calendar_summary: record.calendar_summary,
            },
            None => Self {
                connected: false,
                calendar_id: None,
                calendar_summary: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthUrlResponse {
    pub(crate) url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackQuery {
    pub(crate) code: String,
    pub(crate) state: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CalendarListResponse {
    pub(crate) calendars: Vec<CalendarItem>,
}

#[derive(Debug, Validate, Deserialize)]
pub(crate) struct SelectCalendarInput {
    #[validate(length(min = 1, message = "Must not be empty"))]
    pub(crate) calendar_id: String,
}

fn google_client(state: &State) -> Result<&GoogleClient, GoogleError> {
    state.google.as_ref().ok_or(GoogleError::NotConfigured)
}

/// Resolve an OAuth `state` to the user who started the flow. The key is read and removed
/// in one command, so a second callback with the same state fails.
async fn consume_oauth_state<C: AsyncCommands>(
    conn: &mut C,
    oauth_state: &str,
) -> Result<i32, ServerError> {
    let user_id: Option<i32> = conn
        .get_del(RKeys::prefixed(OAUTH_STATE_KEY_PREFIX, oauth_state))
        .await?;
    user_id.ok_or_else(|| ServerError::bad_request("Invalid or expired OAuth state"))
}

/// Handler for `GET /api/google/status`
pub(crate) async fn status(
    current: CurrentUser,
    state: Extension<Arc<State>>,
) -> Result<Json<ConnectionStatus>, ServerError> {
    let record = actions::calendar_token::find(&state.db, current.user.id).await?;
    Ok(Json(record.into()))
}

/// Handler for `GET /api/google/oauth/start`
pub(crate) async fn oauth_start(
    current: CurrentUser,
    state: Extension<Arc<State>>,
) -> Result<Json<AuthUrlResponse>, ServerError> {
    let client = google_client(&state)?;
    let RKeys {
        base_key,
        prefixed_key,
    } = RKeys::generate(OAUTH_STATE_KEY_PREFIX);

    let mut conn = state.redis_client.get_multiplexed_async_connection().await?;
    conn.set_ex::<_, _, ()>(&prefixed_key, current.user.id, OAUTH_STATE_EXPIRY_SECS)
        .await?;

    Ok(Json(AuthUrlResponse {
        url: client.authorize_url(&base_key)?,
    }))
}

/// Handler for `GET /api/google/oauth/callback`
///
/// Google redirects the browser here, so there is no bearer token; the `state` key
/// identifies the user instead. Each key works once.
pub(crate) async fn oauth_callback(
    state: Extension<Arc<State>>,
    QueryParams(query): QueryParams<CallbackQuery>,
) -> Result<Response, ServerError> {
    let client = google_client(&state)?;

    let mut conn = state.redis_client.get_multiplexed_async_connection().await?;
    let user_id = consume_oauth_state(&mut conn, &query.state).await?;

    let user = actions::user::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ServerError::not_found("User not found"))?;

    let grant = client.exchange_code(&query.code).await?;
    actions::calendar_token::save_grant(&state.db, user.id, grant).await?;
    tracing::info!("Connected Google Calendar for user {}", user.id);

    Ok(match &state.config.frontend_url {
        Some(frontend) => (
            StatusCode::FOUND,
            [(header::LOCATION, format!("{}?google=connected", frontend))],
        )
            .into_response(),
        None => Html(CONNECTED_PAGE).into_response(),
    })
}

/// Handler for `GET /api/google/calendars`
pub(crate) async fn calendars(
    current: CurrentUser,
    state: Extension<Arc<State>>,
) -> Result<Json<CalendarListResponse>, ServerError> {
    let record = actions::calendar_token::get_connected(&state.db, current.user.id).await?;
    let mut session = CalendarSession::new(&state.db, google_client(&state)?, record);
    Ok(Json(CalendarListResponse {
        calendars: session.list_calendars().await?,
    }))
}

/// Handler for `POST /api/google/calendar/select`
pub(crate) async fn select_calendar(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    ValidatedJson(input): ValidatedJson<SelectCalendarInput>,
) -> Result<Json<ConnectionStatus>, ServerError> {
    let record = actions::calendar_token::get_connected(&state.db, current.user.id).await?;
    let mut session = CalendarSession::new(&state.db, google_client(&state)?, record);
    let summary = session.calendar_summary(&input.calendar_id).await?;

    let record = actions::calendar_token::select_calendar(
        &state.db,
        session.into_record(),
        input.calendar_id,
        summary,
    )
    .await?;
    Ok(Json(Some(record).into()))
}

/// Handler for `POST /api/google/plan/sync`
pub(crate) async fn sync(
    current: CurrentUser,
    state: Extension<Arc<State>>,
    ValidatedJson(request): ValidatedJson<SyncRequest>,
) -> Result<Json<SyncResponse>, ServerError> {
    if request.events.is_empty() {
        return Err(ServerError::bad_request("No events to sync"));
    }
    let record = actions::calendar_token::get_connected(&state.db, current.user.id).await?;
    let mut session = CalendarSession::new(&state.db, google_client(&state)?, record);
    let response = sync_plan(&state.db, &mut session, current.user.id, request).await?;
    Ok(Json(response))
}
