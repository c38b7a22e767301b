use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the authentication layer, so handlers always see an
/// authenticated `Viewer`. Ownership of the target post or comment is still checked by
/// the handler through the `guard` module.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /upload/presigned
        // Short-lived upload URL for a post image.
        .route("/upload/presigned", post(handlers::get_presigned_url))
        // GET /me
        .route("/me", get(handlers::get_me))
        // --- Posts ---
        // POST /posts
        // The author is always the caller.
        .route("/posts", post(handlers::create_post))
        // DELETE /posts/{post_id}
        // 403 unless the caller is the author. Comments go with the post.
        .route("/posts/{post_id}", delete(handlers::delete_post))
        // --- Comments ---
        // POST /posts/{post_id}/comments
        .route("/posts/{post_id}/comments", post(handlers::add_comment))
        // PUT/DELETE /posts/{post_id}/comments/{comment_id}
        // 403 unless the caller wrote the comment.
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            axum::routing::put(handlers::update_comment).delete(handlers::delete_comment),
        )
}
