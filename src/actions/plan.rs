use chrono::Utc;
use entity::plan;
use entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::error::ServerError;

pub(crate) async fn find(
    db: &DatabaseConnection,
    owner_id: i32,
) -> Result<Option<plan::Model>, ServerError> {
    Ok(Plan::find()
        .filter(plan::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?)
}

/// The saved selections, or an empty list when nothing was saved yet.
pub(crate) async fn load(
    db: &DatabaseConnection,
    owner_id: i32,
) -> Result<serde_json::Value, ServerError> {
    Ok(find(db, owner_id)
        .await?
        .map(|plan| plan.value)
        .filter(|value| !value.is_null())
        .unwrap_or_else(|| serde_json::Value::Array(Vec::new())))
}

/// Replace the owner's plan with `selections`, which must be a JSON list.
pub(crate) async fn save(
    db: &DatabaseConnection,
    owner_id: i32,
    selections: serde_json::Value,
) -> Result<usize, ServerError> {
    let items = match selections.as_array() {
        Some(items) => items.len(),
        None => return Err(ServerError::bad_request("Plan must be a list")),
    };

    match find(db, owner_id).await? {
        Some(existing) => {
            let mut active: plan::ActiveModel = existing.into();
            active.value = Set(selections);
            active.updated_at = Set(Some(Utc::now()));
            active.update(db).await?;
        }
        None => {
            plan::ActiveModel {
                owner_id: Set(owner_id),
                value: Set(selections),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    tracing::info!("Plan saved with {} items", items);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::user::tests::active_user;
    use crate::db::test_db;
    use serde_json::json;

    #[tokio::test]
    async fn empty_until_saved_then_overwritten() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        assert_eq!(load(&db, user.id).await.unwrap(), json!([]));

        let first = json!([{"id": 1, "day": "Monday", "portions": 2}]);
        assert_eq!(save(&db, user.id, first.clone()).await.unwrap(), 1);
        assert_eq!(load(&db, user.id).await.unwrap(), first);

        let second = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(save(&db, user.id, second.clone()).await.unwrap(), 2);
        assert_eq!(load(&db, user.id).await.unwrap(), second);
        assert_eq!(find(&db, user.id).await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_list_plans_are_rejected() {
        let db = test_db().await;
        let user = active_user(&db, "ada@example.com").await;
        let err = save(&db, user.id, json!({"id": 1})).await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }
}
