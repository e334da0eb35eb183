use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A registered account.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[sea_orm(unique)]
    pub email: String,
    /// The password in hashed PHC form
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub last_login_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recipe::Entity")]
    Recipe,
    #[sea_orm(has_many = "super::recipe_rating::Entity")]
    RecipeRating,
    #[sea_orm(has_one = "super::plan::Entity")]
    Plan,
    #[sea_orm(has_many = "super::parse_log::Entity")]
    ParseLog,
    #[sea_orm(has_one = "super::calendar_token::Entity")]
    CalendarToken,
}

impl Related<super::recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipe.def()
    }
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::calendar_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CalendarToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
