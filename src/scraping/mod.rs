//! Fetching recipe pages and pulling structured recipe data out of them.

mod extract;
mod fetch;
mod portions;

pub(crate) use extract::{extract_recipe, ScrapedRecipe};
pub(crate) use fetch::{domain_of, fetch_html, FetchError};
pub(crate) use portions::extract_portion_count;
