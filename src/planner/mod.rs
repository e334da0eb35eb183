//! Meal planning: shopping lists, pasted-recipe parsing and calendar export.

mod custom;
mod ics;
mod scale;
mod shopping;

pub(crate) use custom::{parse_recipe_text, CustomRecipeText};
pub(crate) use ics::{export_current_week, ExportRequest, ICS_FILENAME};
pub(crate) use shopping::{generate, PlannerRequest, ShoppingListResponse};
