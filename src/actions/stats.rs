use chrono::{Duration, Utc};
use entity::parse_log::{self, STATUS_SUCCESS};
use entity::prelude::*;
use entity::{recipe, user_account};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;

use crate::actions::plan;
use crate::error::ServerError;

const TOP_DOMAINS: u64 = 5;

/// The response of `GET /api/stats`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct UserStats {
    pub(crate) total_recipes: u64,
    pub(crate) planned_meals: usize,
    /// Shopping lists are not persisted, so this is always zero.
    pub(crate) shopping_items: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct DomainStat {
    pub(crate) domain: String,
    pub(crate) count: i64,
}

/// The response of `GET /api/admin/stats`.
#[derive(Debug, Serialize)]
pub(crate) struct AdminStats {
    pub(crate) total_users: u64,
    pub(crate) active_users_dau: u64,
    pub(crate) active_users_mau: u64,
    pub(crate) total_recipes: u64,
    pub(crate) recipes_with_images: u64,
    pub(crate) top_domains: Vec<DomainStat>,
}

pub(crate) async fn for_user(db: &DatabaseConnection, owner_id: i32) -> Result<UserStats, ServerError> {
    let total_recipes = Recipe::find()
        .filter(recipe::Column::OwnerId.eq(owner_id))
        .count(db)
        .await?;
    let planned_meals = plan::find(db, owner_id)
        .await?
        .map(|plan| plan.len())
        .unwrap_or(0);

    Ok(UserStats {
        total_recipes,
        planned_meals,
        shopping_items: 0,
    })
}

async fn users_seen_since(
    db: &DatabaseConnection,
    since: chrono::DateTime<Utc>,
) -> Result<u64, ServerError> {
    Ok(UserAccount::find()
        .filter(user_account::Column::LastLoginAt.is_not_null())
        .filter(user_account::Column::LastLoginAt.gte(since))
        .count(db)
        .await?)
}

pub(crate) async fn for_admin(db: &DatabaseConnection) -> Result<AdminStats, ServerError> {
    let now = Utc::now();

    let top_domains = ParseLog::find()
        .select_only()
        .column(parse_log::Column::Domain)
        .column_as(parse_log::Column::Id.count(), "count")
        .filter(parse_log::Column::Status.eq(STATUS_SUCCESS))
        .filter(parse_log::Column::Domain.is_not_null())
        .group_by(parse_log::Column::Domain)
        .order_by_desc(parse_log::Column::Id.count())
        .limit(TOP_DOMAINS)
        .into_tuple::<(String, i64)>()
        .all(db)
        .await?
        .into_iter()
        .map(|(domain, count)| DomainStat { domain, count })
        .collect();

    Ok(AdminStats {
        total_users: UserAccount::find().count(db).await?,
        active_users_dau: users_seen_since(db, now - Duration::days(1)).await?,
        active_users_mau: users_seen_since(db, now - Duration::days(30)).await?,
        total_recipes: Recipe::find().count(db).await?,
        recipes_with_images: Recipe::find()
            .filter(recipe::Column::ImageUrl.is_not_null())
            .count(db)
            .await?,
        top_domains,
    })
}
