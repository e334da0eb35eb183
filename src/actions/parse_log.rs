use chrono::Utc;
use entity::parse_log::{self, STATUS_ERROR, STATUS_SUCCESS};
use entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set};

use crate::error::ServerError;
use crate::scraping::domain_of;

/// Record a scrape attempt. Failing to write the log never fails the request.
pub(crate) async fn record(db: &DatabaseConnection, owner_id: i32, url: &str, error: Option<String>) {
    let status = if error.is_some() {
        STATUS_ERROR
    } else {
        STATUS_SUCCESS
    };
    let entry = parse_log::ActiveModel {
        owner_id: Set(owner_id),
        url: Set(url.to_string()),
        domain: Set(domain_of(url)),
        status: Set(status.to_string()),
        error_message: Set(error),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    if let Err(e) = entry.insert(db).await {
        tracing::error!("Failed to write parse log for {}: {:?}", url, e);
    }
}

pub(crate) async fn list_newest_first(
    db: &DatabaseConnection,
    limit: u64,
) -> Result<Vec<parse_log::Model>, ServerError> {
    Ok(ParseLog::find()
        .order_by_desc(parse_log::Column::CreatedAt)
        .order_by_desc(parse_log::Column::Id)
        .limit(limit)
        .all(db)
        .await?)
}
