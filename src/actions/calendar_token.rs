use chrono::{Duration, Utc};
use entity::calendar_token;
use entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::calendar::TokenGrant;
use crate::error::ServerError;

pub(crate) async fn find(
    db: &DatabaseConnection,
    owner_id: i32,
) -> Result<Option<calendar_token::Model>, ServerError> {
    Ok(CalendarToken::find()
        .filter(calendar_token::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?)
}

/// The owner's token record; a missing connection is a client error.
pub(crate) async fn get_connected(
    db: &DatabaseConnection,
    owner_id: i32,
) -> Result<calendar_token::Model, ServerError> {
    find(db, owner_id)
        .await?
        .ok_or_else(|| ServerError::bad_request("Google Calendar is not connected"))
}

fn expiry_of(grant: &TokenGrant) -> Option<chrono::DateTime<Utc>> {
    grant
        .expires_in
        .map(|seconds| Utc::now() + Duration::seconds(seconds))
}

/// Store the result of an authorization-code exchange. A grant without a refresh
/// token keeps the one already on file.
pub(crate) async fn save_grant(
    db: &DatabaseConnection,
    owner_id: i32,
    grant: TokenGrant,
) -> Result<calendar_token::Model, ServerError> {
    let now = Utc::now();
    let expires_at = expiry_of(&grant);

    let record = match find(db, owner_id).await? {
        Some(existing) => {
            let mut active: calendar_token::ActiveModel = existing.clone().into();
            active.access_token = Set(grant.access_token.unwrap_or(existing.access_token));
            active.refresh_token = Set(grant.refresh_token.or(existing.refresh_token));
            active.token_type = Set(grant.token_type.or(existing.token_type));
            active.scope = Set(grant.scope.or(existing.scope));
            active.expires_at = Set(expires_at);
            active.updated_at = Set(Some(now));
            active.update(db).await?
        }
        None => {
            let access_token = grant.access_token.ok_or_else(|| {
                ServerError::Internal("Google did not return an access token".to_string())
            })?;
            calendar_token::ActiveModel {
                owner_id: Set(owner_id),
                access_token: Set(access_token),
                refresh_token: Set(grant.refresh_token),
                token_type: Set(grant.token_type),
                scope: Set(grant.scope),
                expires_at: Set(expires_at),
                calendar_id: Set(None),
                calendar_summary: Set(None),
                created_at: Set(now),
                updated_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };
    Ok(record)
}

/// Apply a refresh-token grant to an existing record.
pub(crate) async fn apply_refresh(
    db: &DatabaseConnection,
    record: calendar_token::Model,
    grant: TokenGrant,
) -> Result<calendar_token::Model, ServerError> {
    let expires_at = expiry_of(&grant).or(record.expires_at);
    let mut active: calendar_token::ActiveModel = record.clone().into();
    active.access_token = Set(grant.access_token.unwrap_or(record.access_token));
    active.token_type = Set(grant.token_type.or(record.token_type));
    active.scope = Set(grant.scope.or(record.scope));
    active.expires_at = Set(expires_at);
    active.updated_at = Set(Some(Utc::now()));
    Ok(active.update(db).await?)
}

pub(crate) async fn select_calendar(
    db: &DatabaseConnection,
    record: calendar_token::Model,
    calendar_id: String,
    calendar_summary: Option<String>,
) -> Result<calendar_token::Model, ServerError> {
    let mut active: calendar_token::ActiveModel = record.into();
    active.calendar_id = Set(Some(calendar_id));
    active.calendar_summary = Set(calendar_summary);
    active.updated_at = Set(Some(Utc::now()));
    Ok(active.update(db).await?)
}

pub(crate) async fn set_calendar_id(
    db: &DatabaseConnection,
    record: calendar_token::Model,
    calendar_id: String,
) -> Result<calendar_token::Model, ServerError> {
    let mut active: calendar_token::ActiveModel = record.into();
    active.calendar_id = Set(Some(calendar_id));
    active.updated_at = Set(Some(Utc::now()));
    Ok(active.update(db).await?)
}
