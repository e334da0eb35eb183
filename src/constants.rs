//! Constants

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A number next to a word that means "portions", in either order.
    pub(crate) static ref RE_PORTIONS: Regex = Regex::new(
        r"(?i)(?:porcj|osób|osob|serving|portion|people|person)\D*?(\d+)|(\d+)\D*?(?:porcj|osób|osob|serving|portion|people|person)"
    )
    .unwrap();
    pub(crate) static ref RE_FIRST_NUMBER: Regex = Regex::new(r"\d+").unwrap();
    /// The quantity an ingredient line starts with: a range, a mixed number, a vulgar
    /// fraction (optionally after a whole number), a plain fraction or a decimal.
    pub(crate) static ref RE_LEADING_QUANTITY: Regex = Regex::new(
        r"^\s*(?:(?P<from>\d+(?:[.,]\d+)?)\s*[-–]\s*(?P<to>\d+(?:[.,]\d+)?)|(?P<whole>\d+)\s+(?P<num>\d+)/(?P<den>\d+)|(?P<vwhole>\d+)?\s*(?P<vulgar>[½⅓⅔¼¾⅕⅖⅗⅘⅙⅚⅛⅜⅝⅞])|(?P<fnum>\d+)/(?P<fden>\d+)|(?P<number>\d+(?:[.,]\d+)?))"
    )
    .unwrap();
}

// for authorized sessions
pub(crate) const SESSION_KEY_PREFIX: &str = "session:";
pub(crate) const TOKEN_TYPE: &str = "bearer";

// for google oauth round trips
pub(crate) const OAUTH_STATE_KEY_PREFIX: &str = "oauth_state:";
pub(crate) const OAUTH_STATE_EXPIRY_SECS: u64 = 600;

// a yield above this is almost certainly a weight, not a head count
pub(crate) const MAX_SANE_PORTIONS: i32 = 50;

pub(crate) const CUSTOM_RECIPE_ICON: &str = "https://cdn-icons-png.flaticon.com/512/3081/3081557.png";
pub(crate) const CUSTOM_URL_PREFIX: &str = "custom:";

pub(crate) const SYSTEM_NAME: &str = "KitchenOS";
pub(crate) const SYSTEM_VERSION: &str = env!("CARGO_PKG_VERSION");
