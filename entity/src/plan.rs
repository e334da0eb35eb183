use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The saved weekly selection of a user, kept verbatim as the client sent it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique, indexed)]
    pub owner_id: i32,
    pub value: Json,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    /// Number of entries in the plan, zero if the blob is not a list.
    pub fn len(&self) -> usize {
        self.value.as_array().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
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
}

impl Related<super::user_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
