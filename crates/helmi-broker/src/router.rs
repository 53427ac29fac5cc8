//! API router construction

use axum::{
    Router, middleware,
    routing::{get, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{BasicAuth, require_basic_auth};
use crate::handlers::{self, AppState};

/// Build the broker router
///
/// Broker routes require `auth` when it is set; `/liveness` never does.
pub fn build_router(state: AppState, auth: Option<BasicAuth>) -> Router {
    let mut broker_routes = Router::new()
        .route("/v2/catalog", get(handlers::catalog))
        .route(
            "/v2/service_instances/:instance_id",
            put(handlers::provision).delete(handlers::deprovision),
        )
        .route(
            "/v2/service_instances/:instance_id/last_operation",
            get(handlers::last_operation),
        )
        .route(
            "/v2/service_instances/:instance_id/service_bindings/:binding_id",
            put(handlers::bind).delete(handlers::unbind),
        );

    if let Some(auth) = auth {
        broker_routes = broker_routes.layer(middleware::from_fn_with_state(
            Arc::new(auth),
            require_basic_auth,
        ));
    }

    Router::new()
        .merge(broker_routes)
        .route("/liveness", get(handlers::liveness))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .with_state(state)
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
