use salvo::Depot;
use salvo::writing::Redirect;

use crate::context::{get_content_from_depot, get_extensions_from_depot};
use crate::db_handler::get_db_from_depot;
use waypost_service::dispatch::{Disposition, RequestContext, resolve};

/// ## Summary
/// The Resolution Dispatcher as middleware on the passthrough routes.
/// Builds an explicit [`RequestContext`] from the request, runs the
/// resolution state machine, and either issues a 302 and terminates the
/// request or lets flow continue to the upstream passthrough handler.
///
/// Every internal failure is a pass-through; visitors never see an
/// error from this middleware.
#[salvo::async_trait]
impl salvo::Handler for DispatchMiddleware {
    #[tracing::instrument(skip(self, req, depot, res, ctrl), fields(path = %req.uri().path()))]
    async fn handle(
        &self,
        req: &mut salvo::Request,
        depot: &mut Depot,
        res: &mut salvo::Response,
        ctrl: &mut salvo::FlowCtrl,
    ) {
        let ctx = request_context(req);

        let (Ok(provider), Ok(content), Ok(extensions)) = (
            get_db_from_depot(depot),
            get_content_from_depot(depot),
            get_extensions_from_depot(depot),
        ) else {
            tracing::error!("Dispatch context incomplete, passing through");
            return;
        };

        let mut conn = match provider.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = ?e, "No database connection, passing through");
                return;
            }
        };

        match resolve(&mut conn, &content, &extensions, &ctx).await {
            Disposition::PassThrough => {}
            Disposition::Redirect(url) => {
                res.render(Redirect::found(url.as_str()));
                ctrl.skip_rest();
            }
        }
    }
}

/// Captures the request's path and ordered query pairs.
fn request_context(req: &salvo::Request) -> RequestContext {
    let query = req
        .uri()
        .query()
        .map(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    RequestContext {
        path: req.uri().path().to_string(),
        query,
    }
}

/// ## Summary
/// Middleware handler for redirect resolution.
pub struct DispatchMiddleware;
