use axum::routing::get;
use axum::Router;
use cas_service::ContentService;
use tower_http::trace::TraceLayer;

use crate::handler;

/// Build the axum router with all content endpoints.
pub fn build_router(service: ContentService) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/blobs", get(handler::list_blobs))
        .route(
            "/v1/blobs/:digest",
            get(handler::get_blob)
                .patch(handler::update_blob)
                .delete(handler::delete_blob),
        )
        .route("/v1/blobs/:digest/content", get(handler::read_content))
        .route("/v1/sessions", get(handler::list_sessions))
        .route(
            "/v1/sessions/:reference",
            get(handler::get_session)
                .post(handler::write_session)
                .delete(handler::abort_session),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
