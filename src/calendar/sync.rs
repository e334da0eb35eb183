use chrono::{Duration, NaiveDate};
use entity::recipe;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use validator::Validate;

use super::CalendarSession;
use crate::actions;
use crate::error::ServerError;

const USER_PROPERTY: &str = "kitchenos_user_id";
const SOURCE_PROPERTY: &str = "kitchenos_source";
const SOURCE_PLANNER: &str = "planner";
const MAX_DESCRIBED_INGREDIENTS: usize = 12;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SyncEvent {
    pub(crate) recipe_id: i32,
    /// `YYYY-MM-DD`
    pub(crate) date: String,
    #[serde(default = "one")]
    pub(crate) portions: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SyncRequest {
    pub(crate) calendar_id: Option<String>,
    pub(crate) events: Vec<SyncEvent>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct SyncResponse {
    pub(crate) created: usize,
    pub(crate) deleted: usize,
    pub(crate) calendar_id: String,
}

/// Collapse events sharing `(recipe_id, date)` to the last one, keeping first-seen order,
/// and parse their dates.
fn unique_events(events: Vec<SyncEvent>) -> Result<Vec<(SyncEvent, NaiveDate)>, ServerError> {
    let mut positions: HashMap<(i32, String), usize> = HashMap::new();
    let mut unique: Vec<SyncEvent> = Vec::new();
    for event in events {
        let key = (event.recipe_id, event.date.clone());
        match positions.get(&key) {
            Some(&position) => unique[position] = event,
            None => {
                positions.insert(key, unique.len());
                unique.push(event);
            }
        }
    }

    unique
        .into_iter()
        .map(|event| {
            let date = NaiveDate::parse_from_str(&event.date, "%Y-%m-%d")
                .map_err(|_| ServerError::bad_request(format!("Invalid date: {}", event.date)))?;
            Ok((event, date))
        })
        .collect()
}

fn event_body(owner_id: i32, recipe: &recipe::Model, date: NaiveDate, portions: i32) -> Value {
    let mut description = vec![format!("Portions: {}", portions)];

    let ingredients = recipe.ingredients.lines();
    if !ingredients.is_empty() {
        let shown = &ingredients[..ingredients.len().min(MAX_DESCRIBED_INGREDIENTS)];
        let suffix = if ingredients.len() > MAX_DESCRIBED_INGREDIENTS {
            "..."
        } else {
            ""
        };
        description.push(format!("Ingredients: {}{}", shown.join(", "), suffix));
    }
    if !recipe.is_custom() {
        description.push(format!("Link: {}", recipe.url));
    }

    json!({
        "summary": recipe.title,
        "description": description.join("\n"),
        "start": {"date": date.to_string()},
        "end": {"date": (date + Duration::days(1)).to_string()},
        "extendedProperties": {
            "private": {
                USER_PROPERTY: owner_id.to_string(),
                SOURCE_PROPERTY: SOURCE_PLANNER,
            }
        }
    })
}

/// Replace the user's previously synced events in the covered date range with one
/// all-day event per planned recipe.
pub(crate) async fn sync_plan(
    db: &DatabaseConnection,
    session: &mut CalendarSession<'_>,
    owner_id: i32,
    request: SyncRequest,
) -> Result<SyncResponse, ServerError> {
    if request.events.is_empty() {
        return Err(ServerError::bad_request("No events to sync"));
    }

    let stored_calendar = session.record().calendar_id.clone();
    let requested_calendar = request
        .calendar_id
        .filter(|calendar_id| !calendar_id.trim().is_empty());
    let calendar_id = match (requested_calendar, stored_calendar) {
        (Some(requested), stored) => {
            if stored.as_deref() != Some(requested.as_str()) {
                let record = actions::calendar_token::set_calendar_id(
                    db,
                    session.record().clone(),
                    requested.clone(),
                )
                .await?;
                session.replace_record(record);
            }
            requested
        }
        (None, Some(stored)) => stored,
        (None, None) => return Err(ServerError::bad_request("Select a calendar first")),
    };

    let events = unique_events(request.events)?;
    let (first, last) = events
        .iter()
        .fold((NaiveDate::MAX, NaiveDate::MIN), |(first, last), (_, date)| {
            (first.min(*date), last.max(*date))
        });
    let time_min = format!("{}T00:00:00Z", first);
    let time_max = format!("{}T00:00:00Z", last + Duration::days(1));

    let mut deleted = 0;
    let stale = session
        .tagged_event_ids(
            &calendar_id,
            time_min,
            time_max,
            format!("{}={}", USER_PROPERTY, owner_id),
        )
        .await?;
    for event_id in stale {
        if session.delete_event(&calendar_id, &event_id).await? {
            deleted += 1;
        }
    }

    let mut created = 0;
    for (event, date) in events {
        let Some(recipe) = actions::recipe::find_owned(db, owner_id, event.recipe_id).await? else {
            tracing::debug!("Skipping recipe {} not owned by user {}", event.recipe_id, owner_id);
            continue;
        };
        let body = event_body(owner_id, &recipe, date, event.portions);
        if session.insert_event(&calendar_id, &body).await? {
            created += 1;
        }
    }

    tracing::info!(
        "Synced plan for user {}: {} created, {} deleted",
        owner_id,
        created,
        deleted
    );
    Ok(SyncResponse {
        created,
        deleted,
        calendar_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::recipe::tests::content;
    use crate::actions::user::tests::active_user;
    use crate::calendar::client::test_client;
    use crate::calendar::TokenGrant;
    use crate::db::test_db;
    use httpmock::Method::{DELETE, GET, POST};
    use httpmock::MockServer;

    fn event(recipe_id: i32, date: &str, portions: i32) -> SyncEvent {
        SyncEvent {
            recipe_id,
            date: date.to_string(),
            portions,
        }
    }

    #[test]
    fn duplicates_collapse_to_the_last_entry() {
        let events = unique_events(vec![
            event(1, "2026-03-02", 2),
            event(2, "2026-03-02", 1),
            event(1, "2026-03-02", 4),
        ])
        .unwrap();

        let kept: Vec<(i32, i32)> = events
            .iter()
            .map(|(event, _)| (event.recipe_id, event.portions))
            .collect();
        assert_eq!(kept, vec![(1, 4), (2, 1)]);
    }

    #[test]
    fn invalid_dates_are_rejected() {
        let err = unique_events(vec![event(1, "02.03.2026", 2)]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid date: 02.03.2026");
    }

    #[test]
    fn portions_pass_through_unchecked() {
        let request: SyncRequest = serde_json::from_value(json!({
            "events": [
                {"recipe_id": 1, "date": "2026-03-02", "portions": 0},
                {"recipe_id": 2, "date": "2026-03-02", "portions": 500},
                {"recipe_id": 3, "date": "2026-03-02"}
            ]
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        let portions: Vec<i32> = request.events.iter().map(|event| event.portions).collect();
        assert_eq!(portions, vec![0, 500, 1]);
    }

    #[test]
    fn description_truncates_ingredients_and_hides_custom_links() {
        let ingredients: Vec<String> = (1..=13).map(|n| format!("item {}", n)).collect();
        let mut recipe = recipe::Model {
            id: 7,
            owner_id: 1,
            title: "Bigos".to_string(),
            url: "https://example.com/bigos".to_string(),
            image_url: None,
            ingredients: ingredients.into(),
            instructions: None,
            created_at: chrono::Utc::now(),
            updated_at: None,
            base_portions: 4,
        };
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let body = event_body(1, &recipe, date, 3);
        let description = body["description"].as_str().unwrap();
        assert!(description.starts_with("Portions: 3\nIngredients: item 1, "));
        assert!(description.contains("item 12...\n"));
        assert!(description.ends_with("Link: https://example.com/bigos"));
        assert_eq!(body["end"]["date"], "2026-03-03");
        assert_eq!(body["extendedProperties"]["private"][USER_PROPERTY], "1");

        recipe.url = "custom:abc".to_string();
        let body = event_body(1, &recipe, date, 3);
        assert!(!body["description"].as_str().unwrap().contains("Link:"));
    }

    #[tokio::test]
    async fn sync_replaces_tagged_events() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let soup = actions::recipe::create_custom(&db, user.id, content("Soup", 2, &["water"]))
            .await
            .unwrap();
        let record = actions::calendar_token::save_grant(
            &db,
            user.id,
            TokenGrant {
                access_token: Some("token".to_string()),
                refresh_token: Some("refresh".to_string()),
                expires_in: Some(3600),
                ..TokenGrant::default()
            },
        )
        .await
        .unwrap();

        let server = MockServer::start_async().await;
        let client = test_client(&server);
        let property = format!("{}={}", USER_PROPERTY, user.id);
        let listed = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendar/v3/calendars/meals/events")
                    .query_param("timeMin", "2026-03-02T00:00:00Z")
                    .query_param("timeMax", "2026-03-05T00:00:00Z")
                    .query_param("privateExtendedProperty", property.as_str());
                then.status(200)
                    .json_body(json!({"items": [{"id": "old-1"}, {"id": "old-2"}, {}]}));
            })
            .await;
        let removed = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path_contains("/calendar/v3/calendars/meals/events/old-");
                then.status(204);
            })
            .await;
        let inserted = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/calendar/v3/calendars/meals/events")
                    .body_contains("\"summary\":\"Soup\"");
                then.status(200).json_body(json!({"id": "new"}));
            })
            .await;

        let mut session = CalendarSession::new(&db, &client, record);
        let response = sync_plan(
            &db,
            &mut session,
            user.id,
            SyncRequest {
                calendar_id: Some("meals".to_string()),
                events: vec![
                    event(soup.id, "2026-03-04", 2),
                    event(soup.id, "2026-03-02", 2),
                    event(999, "2026-03-03", 1),
                ],
            },
        )
        .await
        .unwrap();

        assert_eq!(
            response,
            SyncResponse {
                created: 2,
                deleted: 2,
                calendar_id: "meals".to_string()
            }
        );
        listed.assert_hits_async(1).await;
        removed.assert_hits_async(2).await;
        inserted.assert_hits_async(2).await;

        let stored = actions::calendar_token::get_connected(&db, user.id)
            .await
            .unwrap();
        assert_eq!(stored.calendar_id.as_deref(), Some("meals"));
    }

    #[tokio::test]
    async fn sync_needs_a_calendar() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let record = actions::calendar_token::save_grant(
            &db,
            user.id,
            TokenGrant {
                access_token: Some("token".to_string()),
                ..TokenGrant::default()
            },
        )
        .await
        .unwrap();
        let server = MockServer::start_async().await;
        let client = test_client(&server);
        let mut session = CalendarSession::new(&db, &client, record);

        let err = sync_plan(
            &db,
            &mut session,
            user.id,
            SyncRequest {
                calendar_id: None,
                events: vec![event(1, "2026-03-02", 1)],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Select a calendar first");
    }

    #[tokio::test]
    async fn blank_calendar_id_keeps_the_stored_selection() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let record = actions::calendar_token::save_grant(
            &db,
            user.id,
            TokenGrant {
                access_token: Some("token".to_string()),
                refresh_token: Some("refresh".to_string()),
                expires_in: Some(3600),
                ..TokenGrant::default()
            },
        )
        .await
        .unwrap();
        let record = actions::calendar_token::set_calendar_id(&db, record, "meals".to_string())
            .await
            .unwrap();

        let server = MockServer::start_async().await;
        let client = test_client(&server);
        let listed = server
            .mock_async(|when, then| {
                when.method(GET).path("/calendar/v3/calendars/meals/events");
                then.status(200).json_body(json!({"items": []}));
            })
            .await;

        let mut session = CalendarSession::new(&db, &client, record);
        let response = sync_plan(
            &db,
            &mut session,
            user.id,
            SyncRequest {
                calendar_id: Some("  ".to_string()),
                events: vec![event(999, "2026-03-02", 1)],
            },
        )
        .await
        .unwrap();

        assert_eq!(response.calendar_id, "meals");
        assert_eq!(response.created, 0);
        listed.assert_hits_async(1).await;
        let stored = actions::calendar_token::get_connected(&db, user.id)
            .await
            .unwrap();
        assert_eq!(stored.calendar_id.as_deref(), Some("meals"));
    }
}
