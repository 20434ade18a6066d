//! Upstream passthrough.
//!
//! The catch-all route behind the dispatch middleware: any request the
//! dispatcher does not claim is forwarded to the configured upstream
//! host untouched, so the gateway can sit in front of an existing site.

use std::sync::OnceLock;

use salvo::http::StatusCode;
use salvo::{Depot, Request, Response, Router, handler};
use tracing::error;

use crate::config::get_config_from_depot;
use crate::middleware::dispatch::DispatchMiddleware;

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP.get_or_init(reqwest::Client::new)
}

/// Joins the upstream base with the request's path and query.
fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    match query {
        Some(q) => format!("{base}{path}?{q}"),
        None => format!("{base}{path}"),
    }
}

/// ## Summary
/// Forwards the request to the upstream host and relays the status,
/// content type, and body of the response.
#[handler]
async fn forward(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Ok(config) = get_config_from_depot(depot) else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    let target = upstream_url(
        &config.upstream.url,
        req.uri().path(),
        req.uri().query(),
    );

    let Ok(method) = reqwest::Method::from_bytes(req.method().as_str().as_bytes()) else {
        res.status_code(StatusCode::BAD_REQUEST);
        return;
    };

    let mut upstream = http_client().request(method, &target);

    if let Some(content_type) = req.content_type() {
        upstream = upstream.header(reqwest::header::CONTENT_TYPE, content_type.to_string());
    }
    if let Ok(body) = req.payload().await {
        if !body.is_empty() {
            upstream = upstream.body(body.to_vec());
        }
    }

    let response = match upstream.send().await {
        Ok(response) => response,
        Err(e) => {
            error!(target = %target, error = ?e, "Upstream request failed");
            res.status_code(StatusCode::BAD_GATEWAY);
            return;
        }
    };

    res.status_code(
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
    );

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    match response.bytes().await {
        Ok(body) => {
            if let Some(content_type) = content_type {
                res.add_header("content-type", content_type, true).ok();
            }
            res.write_body(body).ok();
        }
        Err(e) => {
            error!(target = %target, error = ?e, "Failed to read upstream body");
            res.status_code(StatusCode::BAD_GATEWAY);
        }
    }
}

#[must_use]
pub fn routes() -> Router {
    Router::with_path("<**rest>").hoop(DispatchMiddleware).goal(forward)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_url_joins_path_and_query() {
        assert_eq!(
            upstream_url("https://example.org/", "/about", None),
            "https://example.org/about"
        );
        assert_eq!(
            upstream_url("https://example.org", "/civicrm", Some("page=CiviCRM&q=civicrm")),
            "https://example.org/civicrm?page=CiviCRM&q=civicrm"
        );
    }
}
