use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Maximum length of a post or category title.
pub const TITLE_MAX_LENGTH: usize = 256;
/// Maximum length of a username.
pub const USERNAME_MAX_LENGTH: usize = 150;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A profile row in `profiles`. The `id` is the subject issued by the external identity
/// provider; `username` is unique and immutable through the profile edit path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Category
///
/// A topical grouping of posts. The `slug` is globally unique and addresses the category page.
/// An unpublished category hides the category page and every post filed under it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Location
///
/// Optional place attached to a post. Its publication flag is informational only and
/// never affects post visibility.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// The raw `posts` row, as returned by write operations.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    // May lie in the future: the post stays hidden from everyone but its author until then.
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    // Object key of the uploaded image (see `storage`).
    pub image: Option<String>,
    pub author_id: Uuid,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// A row of `comments`, augmented with the author's username (a join).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub author_username: Option<String>,
}

// --- Listing Schemas (Output) ---

/// Author reference embedded in a `PostView`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
}

/// Category reference embedded in a `PostView`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CategorySummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

/// Location reference embedded in a `PostView`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct LocationSummary {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
}

/// PostView
///
/// A post joined with its author, category and location, annotated with the number of
/// comments at query time. This is the element type of every listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub image: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
    pub category: Option<CategorySummary>,
    pub location: Option<LocationSummary>,
    pub comment_count: i64,
}

/// PostRow
///
/// Flat shape of the joined listing query. The LEFT JOINed columns are nullable.
#[derive(Debug, Clone, FromRow, Default)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author_id: Uuid,
    pub author_username: String,
    pub category_id: Option<i64>,
    pub category_title: Option<String>,
    pub category_slug: Option<String>,
    pub category_is_published: Option<bool>,
    pub location_id: Option<i64>,
    pub location_name: Option<String>,
    pub location_is_published: Option<bool>,
    pub comment_count: i64,
}

impl From<PostRow> for PostView {
    fn from(row: PostRow) -> Self {
        let category = row.category_id.map(|id| CategorySummary {
            id,
            title: row.category_title.unwrap_or_default(),
            slug: row.category_slug.unwrap_or_default(),
            is_published: row.category_is_published.unwrap_or(false),
        });
        let location = row.location_id.map(|id| LocationSummary {
            id,
            name: row.location_name.unwrap_or_default(),
            is_published: row.location_is_published.unwrap_or(false),
        });

        PostView {
            id: row.id,
            title: row.title,
            text: row.text,
            pub_date: row.pub_date,
            is_published: row.is_published,
            image: row.image,
            created_at: row.created_at,
            author: AuthorSummary {
                id: row.author_id,
                username: row.author_username,
            },
            category,
            location,
            comment_count: row.comment_count,
        }
    }
}

/// PostPage
///
/// One page of a multi-post listing. Pages are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostPage {
    pub posts: Vec<PostView>,
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

/// PostDetail
///
/// Output of the single-post view: the post and its comments, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostDetail {
    pub post: PostView,
    pub comments: Vec<Comment>,
}

/// Output of the category page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryPosts {
    pub category: Category,
    pub page: PostPage,
}

/// Output of the profile page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfilePosts {
    pub profile: User,
    pub page: PostPage,
}

/// StaticPage
///
/// Informational page served by the `pages` routes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StaticPage {
    pub slug: String,
    pub title: String,
    pub body: String,
}

// --- Request Payloads (Input Schemas) ---

fn default_published() -> bool {
    true
}

/// CreatePostRequest
///
/// Input payload for POST /posts. There is no author field: the author is always the
/// authenticated viewer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    #[serde(default = "default_published")]
    pub is_published: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub location_id: Option<i64>,
    pub category_id: i64,
}

/// Reads a field that distinguishes "absent" (`None`, via `#[serde(default)]`) from an
/// explicit `null` (`Some(None)`).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// UpdatePostRequest
///
/// Partial update payload for PUT /posts/{post_id}. Absent fields keep their stored value.
/// `image` and `location_id` may also be sent as `null` to clear them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub pub_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "number | null")]
    #[schema(value_type = Option<i64>)]
    pub location_id: Option<Option<i64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
}

/// Input payload for posting a new comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub text: String,
}

/// Input payload for editing a comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCommentRequest {
    pub text: String,
}

/// UpdateProfileRequest
///
/// Partial update payload for PUT /profile/{username}. Username and password are not
/// part of this payload and cannot be changed here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// RegisterUserRequest
///
/// Input payload for POST /register. The password is forwarded to the identity provider and
/// never persisted or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a post image.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
///
/// The upload URL and the object key to store in the post's `image` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}
