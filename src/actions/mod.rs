//! CRUD action-like resources
//!
//! Each submodule owns the queries for one entity. Input structs double as request bodies
//! (validated in the handlers) and as changesets applied to the ORM models.

pub(crate) mod calendar_token;
pub(crate) mod parse_log;
pub(crate) mod plan;
pub(crate) mod recipe;
pub(crate) mod stats;
pub(crate) mod user;
