//! Backend for sharing polls and collecting one vote per person.
//!
//! Voters are identified by their Supabase session when they have one and by
//! network address otherwise. Results are tallied from the raw votes on every
//! read, and viewers of a poll get a server-sent event whenever someone votes
//! so they know to refetch.

pub mod admission;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod notifier;
pub mod routes;
pub mod state;
pub mod store;
pub mod tally;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::Config;
pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/polls", get(routes::list_polls).post(routes::create_poll))
        .route("/polls/:id", get(routes::get_poll).delete(routes::delete_poll))
        .route("/polls/:id/results", get(routes::poll_results))
        .route("/polls/:id/events", get(routes::poll_events))
        .route("/polls/:id/share", get(routes::share_link))
        .route("/me/polls", get(routes::my_polls))
        .route("/vote", post(routes::submit_vote))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
