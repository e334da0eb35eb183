//! Database entities, shared between the server and anything else that needs to read the schema.

pub mod prelude;

pub mod calendar_token;
pub mod parse_log;
pub mod plan;
pub mod recipe;
pub mod recipe_rating;
pub mod user_account;
