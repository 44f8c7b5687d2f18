use crate::handlers::{health, render};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let render_routes = Router::new()
        .route("/nodes/{node_id}", get(render::render_node))
        .route("/{render_id}", get(render::render_id));

    Router::new()
        .nest("/renders", render_routes)
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
