//! Listing Query Builder.
//!
//! Maps each listing `Scope` to one `PostQuery` (joins, visibility, ordering, window), resolves
//! the scope's own preconditions (published category, existing author) and assembles a page.

use chrono::{DateTime, Utc};

use crate::{
    auth::Viewer,
    error::{AppError, AppResult},
    models::{Category, PostPage, PostView, User},
    repository::Repository,
    visibility::VisibilityFilter,
};

/// Number of posts on a full page of a multi-post listing.
pub const POSTS_PER_PAGE: i64 = 10;

/// Scope
///
/// Selection criterion of a post listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The global index.
    All,
    /// Posts filed under the category with this slug.
    ByCategory(String),
    /// Posts written by the user with this username.
    ByAuthor(String),
    /// A single post, for the detail view.
    ById(i64),
}

/// LIMIT/OFFSET pair of a paginated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

/// PostQuery
///
/// Everything the Entity Store needs to run one listing: which posts, who is looking and
/// when, and which slice. Results are always ordered by `pub_date DESC, id DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub scope: Scope,
    pub visibility: VisibilityFilter,
    /// `None` means unpaginated.
    pub window: Option<Window>,
}

/// The record a scope was resolved against.
#[derive(Debug, Clone)]
pub enum ScopeContext {
    Index,
    Category(Category),
    Author(User),
    Detail,
}

/// A resolved listing.
#[derive(Debug, Clone)]
pub struct Listing {
    pub context: ScopeContext,
    pub page: PostPage,
}

/// build_listing
///
/// Produces page `page` (1-based) of `scope` as seen by `viewer` now.
///
/// # Errors
/// `NotFound` when the category is absent or unpublished, the author does not exist, the
/// post is absent or invisible (`ById`), or the page number is out of range.
pub async fn build_listing(
    repo: &dyn Repository,
    scope: Scope,
    viewer: &Viewer,
    page: i64,
) -> AppResult<Listing> {
    build_listing_at(repo, scope, viewer, page, Utc::now()).await
}

/// Same as `build_listing`, with visibility evaluated at `now`.
pub async fn build_listing_at(
    repo: &dyn Repository,
    scope: Scope,
    viewer: &Viewer,
    page: i64,
    now: DateTime<Utc>,
) -> AppResult<Listing> {
    let visibility = VisibilityFilter::new(viewer, now);

    let context = match &scope {
        Scope::All => ScopeContext::Index,
        Scope::ByCategory(slug) => ScopeContext::Category(published_category(repo, slug).await?),
        Scope::ByAuthor(username) => ScopeContext::Author(existing_author(repo, username).await?),
        Scope::ById(id) => {
            let post = visible_post(repo, *id, visibility).await?;
            return Ok(Listing {
                context: ScopeContext::Detail,
                page: PostPage {
                    posts: vec![post],
                    page: 1,
                    page_size: 1,
                    total_items: 1,
                    total_pages: 1,
                },
            });
        }
    };

    let page = paginate(repo, scope, visibility, page).await?;
    Ok(Listing { context, page })
}

/// find_visible_post
///
/// The `ById` scope: the post if `viewer` may see it now, `NotFound` otherwise.
pub async fn find_visible_post(
    repo: &dyn Repository,
    id: i64,
    viewer: &Viewer,
) -> AppResult<PostView> {
    visible_post(repo, id, VisibilityFilter::for_viewer(viewer)).await
}

async fn visible_post(
    repo: &dyn Repository,
    id: i64,
    visibility: VisibilityFilter,
) -> AppResult<PostView> {
    let query = PostQuery {
        scope: Scope::ById(id),
        visibility,
        window: None,
    };
    repo.query_posts(&query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("post", id))
}

/// A category page exists only while its category is published.
async fn published_category(repo: &dyn Repository, slug: &str) -> AppResult<Category> {
    repo.get_category_by_slug(slug)
        .await?
        .filter(|category| category.is_published)
        .ok_or_else(|| AppError::not_found("category", slug))
}

async fn existing_author(repo: &dyn Repository, username: &str) -> AppResult<User> {
    repo.get_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::not_found("user", username))
}

async fn paginate(
    repo: &dyn Repository,
    scope: Scope,
    visibility: VisibilityFilter,
    page: i64,
) -> AppResult<PostPage> {
    let mut query = PostQuery {
        scope,
        visibility,
        window: None,
    };

    let total_items = repo.count_posts(&query).await?;
    let total_pages = total_pages(total_items);
    if page < 1 || page > total_pages {
        return Err(AppError::not_found("page", page));
    }

    query.window = Some(Window {
        limit: POSTS_PER_PAGE,
        offset: (page - 1) * POSTS_PER_PAGE,
    });
    let posts = repo.query_posts(&query).await?;

    Ok(PostPage {
        posts,
        page,
        page_size: POSTS_PER_PAGE,
        total_items,
        total_pages,
    })
}

/// An empty listing still has one (empty) page.
fn total_pages(total_items: i64) -> i64 {
    ((total_items + POSTS_PER_PAGE - 1) / POSTS_PER_PAGE).max(1)
}
