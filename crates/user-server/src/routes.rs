//! HTTP routing

use crate::handlers::{self, users};
use crate::{cors, AppState};
use axum::{middleware, routing::get, Router};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(handlers::health)
                .options(cors::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/user",
            get(users::list)
                .post(users::create)
                .options(cors::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/user/:id",
            get(users::get)
                .post(users::update)
                .delete(users::delete)
                .options(cors::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        // Layers
        .layer(middleware::from_fn(cors::cors_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
