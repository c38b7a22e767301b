use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without credentials. Listings and the detail view resolve the
/// viewer optionally, so an author still sees their own unpublished and scheduled posts here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Signs up with the identity provider and creates the local profile.
        .route("/register", post(handlers::register_user))
        // GET /pages/about, GET /pages/rules
        .route("/pages/about", get(handlers::about_page))
        .route("/pages/rules", get(handlers::rules_page))
        // GET /categories, GET /locations
        // Published reference data for post forms.
        .route("/categories", get(handlers::get_categories))
        .route("/locations", get(handlers::get_locations))
        // GET /?page=N and GET /posts?page=N
        // The global feed.
        .route("/", get(handlers::get_index))
        .route("/posts", get(handlers::get_index))
        // GET /category/{slug}?page=N
        // 404 for unknown or unpublished categories.
        .route("/category/{slug}", get(handlers::get_category_posts))
        // GET /profile/{username}?page=N, PUT /profile/{username}
        // Anyone but the owner is redirected back to the profile on PUT.
        .route(
            "/profile/{username}",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        // GET /posts/{post_id}, PUT /posts/{post_id}
        // Anyone but the author is redirected back to the post on PUT.
        .route(
            "/posts/{post_id}",
            get(handlers::get_post_detail).put(handlers::update_post),
        )
}
