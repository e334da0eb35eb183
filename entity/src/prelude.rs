pub use super::calendar_token::Entity as CalendarToken;
pub use super::parse_log::Entity as ParseLog;
pub use super::plan::Entity as Plan;
pub use super::recipe::Entity as Recipe;
pub use super::recipe_rating::Entity as RecipeRating;
pub use super::user_account::Entity as UserAccount;
