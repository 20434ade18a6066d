//! Token authentication and capability checks.
//!
//! The host hands out bearer tokens carrying capability lists (see
//! `[[auth.tokens]]` in the configuration). The auth middleware resolves
//! the token into an [`Actor`] stored in the depot; handlers gate write
//! operations with [`require_capability`].

use salvo::Request;
use salvo::http::header::AUTHORIZATION;

use crate::error::{ServiceError, ServiceResult};
use waypost_core::config::Settings;

pub mod depot_keys {
    pub const ACTOR: &str = "__actor";
}

/// The authenticated identity of a request. Read endpoints are public;
/// write endpoints resolve an `Actor` and check capabilities against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User {
        name: String,
        capabilities: Vec<String>,
    },
}

impl Actor {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        match self {
            Self::Anonymous => false,
            Self::User { capabilities, .. } => capabilities.iter().any(|c| c == capability),
        }
    }
}

/// ## Summary
/// Resolves the request's bearer token against the configured token list.
/// Requests without a recognizable token are `Anonymous`, not an error.
#[must_use]
pub fn authenticate(req: &Request, config: &Settings) -> Actor {
    let Some(token) = bearer_token(req) else {
        return Actor::Anonymous;
    };

    for configured in &config.auth.tokens {
        if configured.token == token {
            tracing::debug!(actor = %configured.name, "Token authenticated");
            return Actor::User {
                name: configured.name.clone(),
                capabilities: configured.capabilities.clone(),
            };
        }
    }

    tracing::debug!("Unrecognized bearer token, treating as anonymous");
    Actor::Anonymous
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// ## Summary
/// Gets the actor placed in the depot by the auth middleware. A missing
/// actor is treated as anonymous.
#[must_use]
pub fn actor_from_depot(depot: &salvo::Depot) -> Actor {
    depot
        .get::<Actor>(depot_keys::ACTOR)
        .cloned()
        .unwrap_or(Actor::Anonymous)
}

/// ## Summary
/// Requires the given capability from the depot actor.
///
/// ## Errors
/// Returns `NotAuthenticated` for anonymous callers and
/// `AuthorizationError` for authenticated callers lacking the
/// capability, so the HTTP layer can answer 401 vs 403.
pub fn require_capability(depot: &salvo::Depot, capability: &str) -> ServiceResult<()> {
    let actor = actor_from_depot(depot);

    match actor {
        Actor::Anonymous => Err(ServiceError::NotAuthenticated),
        Actor::User { ref name, .. } if !actor.has_capability(capability) => {
            tracing::warn!(actor = %name, capability, "Capability check failed");
            Err(ServiceError::AuthorizationError(format!(
                "You don't have enough permissions ({capability})"
            )))
        }
        Actor::User { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(capabilities: &[&str]) -> Actor {
        Actor::User {
            name: "admin".to_string(),
            capabilities: capabilities.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn anonymous_has_no_capabilities() {
        assert!(!Actor::Anonymous.has_capability("manage_redirects"));
        assert!(!Actor::Anonymous.is_authenticated());
    }

    #[test]
    fn user_capability_is_exact_match() {
        let actor = user(&["manage_redirects"]);

        assert!(actor.has_capability("manage_redirects"));
        assert!(!actor.has_capability("manage_options"));
    }
}
