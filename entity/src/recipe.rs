use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Free-text ingredient lines, stored as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Ingredients(pub Vec<String>);

impl Ingredients {
    pub fn lines(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for Ingredients {
    fn from(lines: Vec<String>) -> Self {
        Ingredients(lines)
    }
}

/// A stored dish, either scraped from a page or parsed from pasted text.
///
/// Pasted recipes get a synthetic `custom:<uuid>` url so the `(owner_id, url)` pair stays unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recipes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub owner_id: i32,
    pub title: String,
    pub url: String,
    pub image_url: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub ingredients: Ingredients,
    #[sea_orm(column_type = "Text", nullable)]
    pub instructions: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
    pub base_portions: i32,
}

impl Model {
    pub fn is_custom(&self) -> bool {
        self.url.starts_with("custom:")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user_account::Entity",
        from = "Column::OwnerId",
        to = "super::user_account::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::recipe_rating::Entity")]
    RecipeRating,
}

impl Related<super::user_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::recipe_rating::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeRating.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
