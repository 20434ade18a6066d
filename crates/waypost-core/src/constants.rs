/// Route component constants shared across crates
pub const API_ROUTE_COMPONENT: &str = "api/v2";

pub const REDIRECT_ROUTE_COMPONENT: &str = "r";
pub const CRM_ROUTE_COMPONENT: &str = "crm";
pub const HOOKS_ROUTE_COMPONENT: &str = "hooks";

/// Path tokens that mark a CRM event registration page. A request
/// qualifies when all three appear among its path segments, in any order.
pub const EVENT_URI_TOKENS: [&str; 3] = ["civicrm", "event", "register"];

/// Path tokens that mark a CRM contribution/donation page.
pub const CONTRIBUTION_URI_TOKENS: [&str; 3] = ["civicrm", "contribute", "transact"];

/// Query keys stripped from the original query string before it is
/// appended to a redirect destination. These drive CRM-side routing and
/// would confuse the destination page's own routing.
pub const STRIPPED_QUERY_KEYS: [&str; 5] = ["page", "q", "reset", "noheader", "civiwp"];

/// Default capability required for write operations when the config does
/// not override it per operation.
pub const DEFAULT_CAPABILITY: &str = "manage_redirects";
