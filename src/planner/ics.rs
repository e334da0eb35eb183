//! iCalendar export of a weekly plan.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use entity::recipe;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::collections::HashMap;

use crate::actions;
use crate::error::ServerError;
use crate::utils::lenient_int;

const MAX_LINE_OCTETS: usize = 75;
const DESCRIBED_INGREDIENTS: usize = 5;
pub(crate) const ICS_FILENAME: &str = "kitchenos_plan.ics";

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PlannedMeal {
    #[serde(default, deserialize_with = "lenient_int")]
    pub(crate) id: Option<i32>,
    #[serde(default)]
    pub(crate) day: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub(crate) portions: Option<i32>,
}

/// The body of `POST /api/plan/export-ics`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportRequest {
    #[serde(default)]
    pub(crate) selections: Vec<PlannedMeal>,
}

/// Days from Monday for an English or Polish day name. Unknown names mean Monday.
fn weekday_offset(day: &str) -> i64 {
    match day.trim().to_lowercase().as_str() {
        "tuesday" | "wtorek" => 1,
        "wednesday" | "środa" | "sroda" => 2,
        "thursday" | "czwartek" => 3,
        "friday" | "piątek" | "piatek" => 4,
        "saturday" | "sobota" => 5,
        "sunday" | "niedziela" => 6,
        _ => 0,
    }
}

/// The date of `day` in the current week, or next week's if it already passed.
fn planned_date(today: NaiveDate, day: &str) -> NaiveDate {
    let offset = weekday_offset(day) - i64::from(today.weekday().num_days_from_monday());
    let date = today + Duration::days(offset);
    if date < today {
        date + Duration::days(7)
    } else {
        date
    }
}

/// RFC 5545 TEXT escaping.
fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\n")
        .replace('\n', "\\n")
}

/// Fold a content line so no physical line exceeds 75 octets, never splitting a character.
fn fold_line(line: &str) -> String {
    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for ch in line.chars() {
        if width + ch.len_utf8() > MAX_LINE_OCTETS {
            folded.push_str("\r\n ");
            width = 1;
        }
        folded.push(ch);
        width += ch.len_utf8();
    }
    folded
}

pub(crate) struct CalendarEntry<'a> {
    pub(crate) recipe: &'a recipe::Model,
    pub(crate) date: NaiveDate,
    pub(crate) portions: i32,
}

/// Render a complete VCALENDAR with one all-day VEVENT per entry.
pub(crate) fn render_calendar(entries: &[CalendarEntry<'_>], now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//KitchenOS//PL//PL".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        "X-WR-CALNAME:KitchenOS Meal Plan".to_string(),
    ];

    // the same recipe may be planned more than once on a day
    let mut occurrences: HashMap<(i32, NaiveDate), u32> = HashMap::new();

    for entry in entries {
        let recipe = entry.recipe;
        let start = entry.date.format("%Y%m%d").to_string();
        let end = (entry.date + Duration::days(1)).format("%Y%m%d").to_string();

        let occurrence = occurrences.entry((recipe.id, entry.date)).or_insert(0);
        *occurrence += 1;

        let ingredients = recipe.ingredients.lines();
        let mut shown = ingredients
            .iter()
            .take(DESCRIBED_INGREDIENTS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" | ");
        if ingredients.len() > DESCRIBED_INGREDIENTS {
            shown.push_str("...");
        }

        lines.extend([
            "BEGIN:VEVENT".to_string(),
            format!("DTSTART;VALUE=DATE:{}", start),
            format!("DTEND;VALUE=DATE:{}", end),
            format!("DTSTAMP:{}", stamp),
            format!("UID:{}-{}-{}@kitchenos.local", recipe.id, start, occurrence),
            format!(
                "SUMMARY:{}",
                escape_text(&format!("🍳 {} ({} portions)", recipe.title, entry.portions))
            ),
            format!(
                "DESCRIPTION:{}",
                escape_text(&format!(
                    "Ingredients: {}\n\nRecipe ID: {}",
                    shown, recipe.id
                ))
            ),
            "END:VEVENT".to_string(),
        ]);
    }
    lines.push("END:VCALENDAR".to_string());

    let mut calendar = String::new();
    for line in lines {
        calendar.push_str(&fold_line(&line));
        calendar.push_str("\r\n");
    }
    calendar
}

/// Export the owner's planned meals. Selections without an id or pointing at a recipe
/// the owner does not have are skipped.
pub(crate) async fn export_plan(
    db: &DatabaseConnection,
    owner_id: i32,
    request: &ExportRequest,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<String, ServerError> {
    if request.selections.is_empty() {
        return Err(ServerError::bad_request("Plan is empty"));
    }

    let mut planned = Vec::with_capacity(request.selections.len());
    for meal in &request.selections {
        let Some(id) = meal.id.filter(|id| *id > 0) else {
            continue;
        };
        let Some(recipe) = actions::recipe::find_owned(db, owner_id, id).await? else {
            continue;
        };
        let date = planned_date(today, meal.day.as_deref().unwrap_or_default());
        let portions = meal.portions.filter(|portions| *portions > 0).unwrap_or(1);
        planned.push((recipe, date, portions));
    }

    let entries: Vec<CalendarEntry<'_>> = planned
        .iter()
        .map(|(recipe, date, portions)| CalendarEntry {
            recipe,
            date: *date,
            portions: *portions,
        })
        .collect();
    tracing::debug!("Exporting {} planned meals for user {}", entries.len(), owner_id);
    Ok(render_calendar(&entries, now))
}

/// [`export_plan`] for the week around the server's local date.
pub(crate) async fn export_current_week(
    db: &DatabaseConnection,
    owner_id: i32,
    request: &ExportRequest,
) -> Result<String, ServerError> {
    export_plan(db, owner_id, request, Local::now().date_naive(), Utc::now()).await
}
