use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    listing::PostQuery,
    models::{
        Category, Comment, CreatePostRequest, Location, Post, PostView, UpdatePostRequest,
        UpdateProfileRequest, User,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Failures of the Entity Store.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A unique constraint rejected the write (e.g. a taken username).
    #[error("Duplicate value: {0}")]
    Conflict(String),

    /// A foreign key rejected the write (e.g. an unknown category id).
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => return RepoError::Conflict(constraint),
                // foreign_key_violation
                Some("23503") => return RepoError::Constraint(constraint),
                _ => {}
            }
        }
        RepoError::Database(err)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The Entity Store contract. Handlers and the listing builder only talk to this trait;
/// `PostgresRepository` backs production and `InMemoryRepository` backs tests.
///
/// Mutations here are unconditional. Ownership is decided by the `guard` module before any
/// of them is called.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn create_user(&self, user: User) -> RepoResult<User>;
    // Only name and contact fields; username is never touched.
    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest)
    -> RepoResult<Option<User>>;

    // --- Categories & Locations ---
    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>>;
    // Published categories, by title.
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    // Published locations, by name.
    async fn list_locations(&self) -> RepoResult<Vec<Location>>;

    // --- Posts ---
    // Joined, visibility-filtered, comment-counted, ordered by pub_date DESC, id DESC.
    async fn query_posts(&self, query: &PostQuery) -> RepoResult<Vec<PostView>>;
    // Number of rows `query_posts` would return without its window.
    async fn count_posts(&self, query: &PostQuery) -> RepoResult<i64>;
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> RepoResult<Post>;
    // Partial update: absent fields keep their value.
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>>;
    // Cascades to the post's comments.
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;

    // --- Comments ---
    // Oldest first.
    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, post_id: i64, comment_id: i64) -> RepoResult<Option<Comment>>;
    async fn add_comment(&self, post_id: i64, author_id: Uuid, text: String)
    -> RepoResult<Comment>;
    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The shared handle to the Entity Store held by the application state.
pub type RepositoryState = Arc<dyn Repository>;
