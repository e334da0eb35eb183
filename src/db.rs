//! Database connection and schema setup.

use entity::prelude::*;
use entity::{calendar_token, plan, recipe, recipe_rating};
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;

/// Open the connection pool.
pub(crate) async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}

/// Create any missing tables and unique indexes from the entity definitions.
pub(crate) async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    // parents before children, so foreign keys resolve
    create_table(db, UserAccount).await?;
    create_table(db, Recipe).await?;
    create_table(db, RecipeRating).await?;
    create_table(db, Plan).await?;
    create_table(db, ParseLog).await?;
    create_table(db, CalendarToken).await?;

    for index in unique_indexes() {
        db.execute(db.get_database_backend().build(&index)).await?;
    }
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut statement = Schema::new(backend).create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("uq_recipes_owner_url")
            .table(Recipe)
            .col(recipe::Column::OwnerId)
            .col(recipe::Column::Url)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("uq_recipe_ratings_owner_recipe")
            .table(RecipeRating)
            .col(recipe_rating::Column::OwnerId)
            .col(recipe_rating::Column::RecipeId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("uq_plans_owner")
            .table(Plan)
            .col(plan::Column::OwnerId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("uq_google_calendar_owner")
            .table(CalendarToken)
            .col(calendar_token::Column::OwnerId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// A fresh in-memory database with the full schema, for tests.
#[cfg(test)]
pub(crate) async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    // every pooled connection would otherwise get its own empty database
    options
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(3600))
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    sync_schema(&db).await.unwrap();
    db
}
