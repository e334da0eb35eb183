use chrono::{Duration, Utc};
use entity::calendar_token;
use reqwest::{Method, Response, StatusCode, Url};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{GoogleClient, GoogleError};
use crate::actions;
use crate::error::ServerError;

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;
const EVENTS_PAGE_SIZE: &str = "2500";
const UNNAMED_CALENDAR: &str = "Untitled";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct CalendarItem {
    pub(crate) id: String,
    pub(crate) summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ListBody<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCalendar {
    id: String,
    summary: Option<String>,
    primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: Option<String>,
}

/// Calendar API access on behalf of one user. Keeps the stored token fresh and
/// persists every refresh.
pub(crate) struct CalendarSession<'a> {
    db: &'a DatabaseConnection,
    client: &'a GoogleClient,
    record: calendar_token::Model,
}

impl<'a> CalendarSession<'a> {
    pub(crate) fn new(
        db: &'a DatabaseConnection,
        client: &'a GoogleClient,
        record: calendar_token::Model,
    ) -> Self {
        Self { db, client, record }
    }

    pub(crate) fn record(&self) -> &calendar_token::Model {
        &self.record
    }

    pub(crate) fn into_record(self) -> calendar_token::Model {
        self.record
    }

    pub(crate) fn replace_record(&mut self, record: calendar_token::Model) {
        self.record = record;
    }

    fn is_fresh(&self) -> bool {
        match self.record.expires_at {
            Some(expires_at) => expires_at > Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS),
            None => false,
        }
    }

    async fn access_token(&mut self, force_refresh: bool) -> Result<String, ServerError> {
        if !force_refresh && self.is_fresh() {
            return Ok(self.record.access_token.clone());
        }
        let refresh_token = self
            .record
            .refresh_token
            .clone()
            .ok_or(GoogleError::MissingRefreshToken)?;

        tracing::debug!("Refreshing Google token for user {}", self.record.owner_id);
        let grant = self.client.refresh(&refresh_token).await?;
        self.record = actions::calendar_token::apply_refresh(self.db, self.record.clone(), grant).await?;
        Ok(self.record.access_token.clone())
    }

    /// Send an authorized request. A 401 answer forces one token refresh and a single retry.
    async fn request(
        &mut self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, ServerError> {
        let token = self.access_token(false).await?;
        let response = self
            .client
            .send(method.clone(), url.clone(), &token, query, body)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!("Google rejected the access token, retrying after a refresh");
        let token = self.access_token(true).await?;
        Ok(self.client.send(method, url, &token, query, body).await?)
    }

    pub(crate) async fn list_calendars(&mut self) -> Result<Vec<CalendarItem>, ServerError> {
        let url = self.client.api_url(&["users", "me", "calendarList"])?;
        let response = self.request(Method::GET, url, &[], None).await?;
        if !response.status().is_success() {
            return Err(GoogleError::Upstream("Failed to fetch calendars").into());
        }
        let body: ListBody<RawCalendar> = response.json().await.map_err(GoogleError::from)?;

        Ok(body
            .items
            .into_iter()
            .map(|calendar| CalendarItem {
                id: calendar.id,
                summary: calendar
                    .summary
                    .unwrap_or_else(|| UNNAMED_CALENDAR.to_string()),
                primary: calendar.primary,
            })
            .collect())
    }

    /// The calendar's display name, if the user can access it.
    pub(crate) async fn calendar_summary(
        &mut self,
        calendar_id: &str,
    ) -> Result<Option<String>, ServerError> {
        let url = self
            .client
            .api_url(&["users", "me", "calendarList", calendar_id])?;
        let response = self.request(Method::GET, url, &[], None).await?;
        if !response.status().is_success() {
            return Err(GoogleError::CalendarNotFound.into());
        }
        let calendar: RawCalendar = response.json().await.map_err(GoogleError::from)?;
        Ok(calendar.summary)
    }

    /// Ids of the events carrying `property=value` as a private extended property.
    pub(crate) async fn tagged_event_ids(
        &mut self,
        calendar_id: &str,
        time_min: String,
        time_max: String,
        property: String,
    ) -> Result<Vec<String>, ServerError> {
        let url = self.client.api_url(&["calendars", calendar_id, "events"])?;
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", time_min.clone()),
                ("timeMax", time_max.clone()),
                ("singleEvents", "true".to_string()),
                ("maxResults", EVENTS_PAGE_SIZE.to_string()),
                ("privateExtendedProperty", property.clone()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let response = self.request(Method::GET, url.clone(), &query, None).await?;
            if !response.status().is_success() {
                return Err(GoogleError::Upstream("Failed to fetch events from Google").into());
            }
            let page: ListBody<RawEvent> = response.json().await.map_err(GoogleError::from)?;
            ids.extend(page.items.into_iter().filter_map(|event| event.id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(ids)
    }

    /// Returns whether Google accepted the deletion.
    pub(crate) async fn delete_event(
        &mut self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<bool, ServerError> {
        let url = self
            .client
            .api_url(&["calendars", calendar_id, "events", event_id])?;
        let response = self.request(Method::DELETE, url, &[], None).await?;
        if !response.status().is_success() {
            tracing::warn!("Deleting event {} failed with {}", event_id, response.status());
        }
        Ok(response.status().is_success())
    }

    /// Returns whether the event was created.
    pub(crate) async fn insert_event(
        &mut self,
        calendar_id: &str,
        event: &Value,
    ) -> Result<bool, ServerError> {
        let url = self.client.api_url(&["calendars", calendar_id, "events"])?;
        let response = self.request(Method::POST, url, &[], Some(event)).await?;
        if !response.status().is_success() {
            tracing::warn!("Creating an event failed with {}", response.status());
        }
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::user::tests::active_user;
    use crate::calendar::client::test_client;
    use crate::calendar::TokenGrant;
    use crate::db::test_db;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    async fn stored_token(
        db: &DatabaseConnection,
        owner_id: i32,
        expires_in: i64,
        refresh_token: Option<&str>,
    ) -> calendar_token::Model {
        actions::calendar_token::save_grant(
            db,
            owner_id,
            TokenGrant {
                access_token: Some("old-token".to_string()),
                refresh_token: refresh_token.map(str::to_string),
                expires_in: Some(expires_in),
                ..TokenGrant::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn fresh_token_is_used_as_is() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let server = MockServer::start_async().await;
        let client = test_client(&server);
        let list = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendar/v3/users/me/calendarList")
                    .header("authorization", "Bearer old-token");
                then.status(200).json_body(json!({
                    "items": [
                        {"id": "primary@example.com", "summary": "Ada", "primary": true},
                        {"id": "meals"}
                    ]
                }));
            })
            .await;

        let record = stored_token(&db, user.id, 3600, Some("refresh-1")).await;
        let mut session = CalendarSession::new(&db, &client, record);
        let calendars = session.list_calendars().await.unwrap();

        assert_eq!(calendars.len(), 2);
        assert_eq!(calendars[0].primary, Some(true));
        assert_eq!(calendars[1].summary, UNNAMED_CALENDAR);
        list.assert_async().await;
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_first() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let server = MockServer::start_async().await;
        let client = test_client(&server);
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .body_contains("grant_type=refresh_token")
                    .body_contains("refresh_token=refresh-1");
                then.status(200)
                    .json_body(json!({"access_token": "new-token", "expires_in": 3600}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendar/v3/users/me/calendarList")
                    .header("authorization", "Bearer new-token");
                then.status(200).json_body(json!({"items": []}));
            })
            .await;

        let record = stored_token(&db, user.id, 30, Some("refresh-1")).await;
        let mut session = CalendarSession::new(&db, &client, record);
        assert!(session.list_calendars().await.unwrap().is_empty());
        refresh.assert_async().await;

        let stored = actions::calendar_token::get_connected(&db, user.id)
            .await
            .unwrap();
        assert_eq!(stored.access_token, "new-token");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn unauthorized_answer_forces_one_refresh_and_retry() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let server = MockServer::start_async().await;
        let client = test_client(&server);
        let rejected = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendar/v3/users/me/calendarList/meals")
                    .header("authorization", "Bearer old-token");
                then.status(401);
            })
            .await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .json_body(json!({"access_token": "new-token", "expires_in": 3600}));
            })
            .await;
        let accepted = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendar/v3/users/me/calendarList/meals")
                    .header("authorization", "Bearer new-token");
                then.status(200)
                    .json_body(json!({"id": "meals", "summary": "Meals"}));
            })
            .await;

        let record = stored_token(&db, user.id, 3600, Some("refresh-1")).await;
        let mut session = CalendarSession::new(&db, &client, record);
        let summary = session.calendar_summary("meals").await.unwrap();

        assert_eq!(summary.as_deref(), Some("Meals"));
        rejected.assert_hits_async(1).await;
        refresh.assert_hits_async(1).await;
        accepted.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn missing_refresh_token_is_unauthorized() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let server = MockServer::start_async().await;
        let client = test_client(&server);

        let record = stored_token(&db, user.id, 10, None).await;
        let mut session = CalendarSession::new(&db, &client, record);
        let err = session.list_calendars().await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_calendar_is_a_client_error() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let server = MockServer::start_async().await;
        let client = test_client(&server);
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendar/v3/users/me/calendarList/nope");
                then.status(404);
            })
            .await;

        let record = stored_token(&db, user.id, 3600, Some("refresh-1")).await;
        let mut session = CalendarSession::new(&db, &client, record);
        let err = session.calendar_summary("nope").await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
