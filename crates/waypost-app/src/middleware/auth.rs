use salvo::Depot;
use tracing::error;

use crate::config::get_config_from_depot;
use waypost_service::auth::{Actor, authenticate, depot_keys};

/// ## Summary
/// Authentication middleware that resolves the request's bearer token
/// and stores the resulting actor in the depot. Requests without a
/// recognized token proceed as anonymous; the per-handler capability
/// checks decide whether that is acceptable.
///
/// ## Side Effects
/// Inserts the actor into the depot for downstream handlers to access.
#[salvo::async_trait]
impl salvo::Handler for AuthMiddleware {
    #[tracing::instrument(skip(self, req, depot, res, ctrl), fields(
        method = %req.method(),
        path = %req.uri().path()
    ))]
    async fn handle(
        &self,
        req: &mut salvo::Request,
        depot: &mut Depot,
        res: &mut salvo::Response,
        ctrl: &mut salvo::FlowCtrl,
    ) {
        tracing::trace!("Authenticating request");

        if req.method() == salvo::http::Method::OPTIONS {
            depot.insert(depot_keys::ACTOR, Actor::Anonymous);
            return;
        }

        let config = match get_config_from_depot(depot) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(error = ?e, "Failed to get config from depot");
                res.status_code(salvo::http::StatusCode::INTERNAL_SERVER_ERROR);
                ctrl.skip_rest();
                return;
            }
        };

        let actor = authenticate(req, &config);

        if let Actor::User { ref name, .. } = actor {
            tracing::debug!(actor = %name, "Request authenticated");
        }

        depot.insert(depot_keys::ACTOR, actor);
    }
}

/// ## Summary
/// Middleware handler for authentication.
/// Use this as a handler in routes to attach an actor to each request.
pub struct AuthMiddleware;
