use crate::{
    AppState,
    auth::{AuthUser, Viewer},
    config::Env,
    error::{AppError, AppResult},
    guard::{self, Decision},
    listing::{self, Scope, ScopeContext},
    models::{
        Category, CategoryPosts, Comment, CreateCommentRequest, CreatePostRequest, Location, Post,
        PostDetail, PostPage, PresignedUrlRequest, PresignedUrlResponse, ProfilePosts,
        RegisterUserRequest, StaticPage, TITLE_MAX_LENGTH, USERNAME_MAX_LENGTH,
        UpdateCommentRequest, UpdatePostRequest, UpdateProfileRequest, User,
    },
    storage::image_object_key,
};
use axum::{
    Json,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// PageQuery
///
/// `?page=N` for paginated listings. Pages are 1-based; absent means the first page.
/// Extracted directly so a malformed query string is reported as a validation error.
#[derive(Deserialize, utoipa::IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
}

impl PageQuery {
    fn number(&self) -> i64 {
        self.page.unwrap_or(1)
    }
}

impl<S> FromRequestParts<S> for PageQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<PageQuery>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(query)
    }
}

/// Minimal view of the identity provider's signup response.
#[derive(Deserialize)]
struct AuthProviderResponse {
    id: Uuid,
}

// --- Guard Resolution ---

/// Maps a hard guard refusal to `Forbidden`.
fn require(decision: Decision) -> AppResult<()> {
    match decision {
        Decision::Allowed => Ok(()),
        refused => {
            tracing::info!(decision = ?refused, "Mutation refused");
            Err(AppError::Forbidden)
        }
    }
}

// --- Validation ---

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > TITLE_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "title must be at most {} characters",
            TITLE_MAX_LENGTH
        )));
    }
    Ok(())
}

fn validate_text(field: &str, text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn validate_username(username: &str) -> AppResult<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || "@.+-_".contains(c);
    if username.is_empty()
        || username.chars().count() > USERNAME_MAX_LENGTH
        || !username.chars().all(allowed)
    {
        return Err(AppError::Validation(format!(
            "username must be 1-{} characters of letters, digits and @/./+/-/_",
            USERNAME_MAX_LENGTH
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    if !email.is_empty() && !email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }
    Ok(())
}

// --- Listings ---

/// get_index
///
/// [Public Route] The global post feed, newest first, 10 per page.
#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of visible posts", body = PostPage),
        (status = 404, description = "Page out of range")
    )
)]
pub async fn get_index(
    viewer: Viewer,
    State(state): State<AppState>,
    query: PageQuery,
) -> AppResult<Json<PostPage>> {
    let listing =
        listing::build_listing(state.repo.as_ref(), Scope::All, &viewer, query.number()).await?;
    Ok(Json(listing.page))
}

/// get_category_posts
///
/// [Public Route] Posts of one category. An unpublished category is not found, whatever
/// its posts look like.
#[utoipa::path(
    get,
    path = "/category/{slug}",
    params(("slug" = String, Path, description = "Category slug"), PageQuery),
    responses(
        (status = 200, description = "Category and a page of its posts", body = CategoryPosts),
        (status = 404, description = "Category absent or unpublished")
    )
)]
pub async fn get_category_posts(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    query: PageQuery,
) -> AppResult<Json<CategoryPosts>> {
    let listing = listing::build_listing(
        state.repo.as_ref(),
        Scope::ByCategory(slug.clone()),
        &viewer,
        query.number(),
    )
    .await?;

    match listing.context {
        ScopeContext::Category(category) => Ok(Json(CategoryPosts {
            category,
            page: listing.page,
        })),
        _ => Err(AppError::not_found("category", slug)),
    }
}

/// get_profile
///
/// [Public Route] A user's profile and posts. The owner also sees their unpublished and
/// scheduled posts.
#[utoipa::path(
    get,
    path = "/profile/{username}",
    params(("username" = String, Path, description = "Username"), PageQuery),
    responses(
        (status = 200, description = "Profile and a page of its posts", body = ProfilePosts),
        (status = 404, description = "No such user")
    )
)]
pub async fn get_profile(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(username): Path<String>,
    query: PageQuery,
) -> AppResult<Json<ProfilePosts>> {
    let listing = listing::build_listing(
        state.repo.as_ref(),
        Scope::ByAuthor(username.clone()),
        &viewer,
        query.number(),
    )
    .await?;

    match listing.context {
        ScopeContext::Author(profile) => Ok(Json(ProfilePosts {
            profile,
            page: listing.page,
        })),
        _ => Err(AppError::not_found("user", username)),
    }
}

/// get_post_detail
///
/// [Public Route] One post with its comments, oldest comment first.
#[utoipa::path(
    get,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 404, description = "Absent or not visible to the viewer")
    )
)]
pub async fn get_post_detail(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<PostDetail>> {
    let post = listing::find_visible_post(state.repo.as_ref(), post_id, &viewer).await?;
    let comments = state.repo.list_comments(post_id).await?;
    Ok(Json(PostDetail { post, comments }))
}

/// get_categories
///
/// [Public Route] Published categories, for post forms.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Published categories", body = [Category]))
)]
pub async fn get_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.repo.list_categories().await?))
}

/// get_locations
///
/// [Public Route] Published locations, for post forms.
#[utoipa::path(
    get,
    path = "/locations",
    responses((status = 200, description = "Published locations", body = [Location]))
)]
pub async fn get_locations(State(state): State<AppState>) -> AppResult<Json<Vec<Location>>> {
    Ok(Json(state.repo.list_locations().await?))
}

// --- Posts ---

/// create_post
///
/// [Authenticated Route] Publishes a new post. The author is always the viewer.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 400, description = "Invalid input or unknown category/location")
    )
)]
pub async fn create_post(
    viewer: Viewer,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    require(guard::post_create(&viewer))?;
    let author_id = viewer.id().ok_or(AppError::Forbidden)?;

    validate_title(&payload.title)?;
    validate_text("text", &payload.text)?;

    let post = state.repo.create_post(author_id, payload).await?;
    tracing::info!(post_id = post.id, author = %author_id, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Public Route] Edits a post. Anyone but the author, including anonymous visitors, is
/// redirected to the post's detail view and nothing is changed.
#[utoipa::path(
    put,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 303, description = "Not the author: redirected to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<Response> {
    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::not_found("post", post_id))?;

    match guard::post_update(&viewer, &post) {
        Decision::Allowed => {}
        Decision::SoftRedirect(target) => {
            tracing::debug!(post_id, viewer = ?viewer.id(), "Post update redirected");
            return Ok(Redirect::to(&target).into_response());
        }
        Decision::Forbidden => return Err(AppError::Forbidden),
    }

    if let Some(title) = &payload.title {
        validate_title(title)?;
    }
    if let Some(text) = &payload.text {
        validate_text("text", text)?;
    }

    let updated = state
        .repo
        .update_post(post_id, payload)
        .await?
        .ok_or_else(|| AppError::not_found("post", post_id))?;
    Ok(Json(updated).into_response())
}

/// delete_post
///
/// [Authenticated Route] Deletes a post and its comments. Only the author may do this.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<StatusCode> {
    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::not_found("post", post_id))?;

    require(guard::post_delete(&viewer, &post))?;

    if !state.repo.delete_post(post_id).await? {
        return Err(AppError::not_found("post", post_id));
    }
    tracing::info!(post_id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Comments ---

/// add_comment
///
/// [Authenticated Route] Comments on an existing post. The post's visibility is not checked.
#[utoipa::path(
    post,
    path = "/posts/{post_id}/comments",
    params(("post_id" = i64, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 404, description = "No such post")
    )
)]
pub async fn add_comment(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    require(guard::comment_create(&viewer))?;
    let author_id = viewer.id().ok_or(AppError::Forbidden)?;

    if state.repo.get_post(post_id).await?.is_none() {
        return Err(AppError::not_found("post", post_id));
    }
    validate_text("text", &payload.text)?;

    let comment = state
        .repo
        .add_comment(post_id, author_id, payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn find_comment(state: &AppState, post_id: i64, comment_id: i64) -> AppResult<Comment> {
    state
        .repo
        .get_comment(post_id, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("comment", comment_id))
}

/// update_comment
///
/// [Authenticated Route] Edits a comment. Only its author may do this.
#[utoipa::path(
    put,
    path = "/posts/{post_id}/comments/{comment_id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    viewer: Viewer,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateCommentRequest>,
) -> AppResult<Json<Comment>> {
    let comment = find_comment(&state, post_id, comment_id).await?;
    require(guard::comment_update(&viewer, &comment))?;
    validate_text("text", &payload.text)?;

    let updated = state
        .repo
        .update_comment(comment_id, payload.text)
        .await?
        .ok_or_else(|| AppError::not_found("comment", comment_id))?;
    Ok(Json(updated))
}

/// delete_comment
///
/// [Authenticated Route] Deletes a comment. Only its author may do this.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}/comments/{comment_id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    viewer: Viewer,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    let comment = find_comment(&state, post_id, comment_id).await?;
    require(guard::comment_delete(&viewer, &comment))?;

    if !state.repo.delete_comment(comment_id).await? {
        return Err(AppError::not_found("comment", comment_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Profiles ---

/// update_profile
///
/// [Public Route] Edits name and contact fields of a profile. Anyone but the owner is
/// redirected to the public profile.
#[utoipa::path(
    put,
    path = "/profile/{username}",
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 303, description = "Not the owner: redirected to the profile"),
        (status = 404, description = "No such user")
    )
)]
pub async fn update_profile(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Response> {
    let target = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::not_found("user", &username))?;

    match guard::profile_update(&viewer, &target) {
        Decision::Allowed => {}
        Decision::SoftRedirect(location) => {
            tracing::debug!(%username, viewer = ?viewer.id(), "Profile update redirected");
            return Ok(Redirect::to(&location).into_response());
        }
        Decision::Forbidden => return Err(AppError::Forbidden),
    }

    if let Some(email) = &payload.email {
        validate_email(email)?;
    }

    let updated = state
        .repo
        .update_profile(target.id, payload)
        .await?
        .ok_or_else(|| AppError::not_found("user", &username))?;
    Ok(Json(updated).into_response())
}

/// get_me
///
/// [Authenticated Route] The authenticated user's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<User>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;
    Ok(Json(user))
}

/// register_user
///
/// [Public Route] Signs up with the external identity provider and mirrors the returned id
/// into a local profile. In local mode without a configured provider, a fresh id is used.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    validate_username(&payload.username)?;
    validate_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(AppError::Validation("password must not be empty".to_string()));
    }

    if state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "username {} is taken",
            payload.username
        )));
    }

    let config = &state.config;
    let id = match (&config.auth_provider_url, &config.auth_provider_key) {
        (Some(url), Some(key)) => signup_with_provider(url, key, &payload).await?,
        _ if config.env == Env::Local => Uuid::new_v4(),
        _ => {
            return Err(AppError::Upstream(
                "identity provider is not configured".to_string(),
            ));
        }
    };

    let user = state
        .repo
        .create_user(User {
            id,
            username: payload.username,
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn signup_with_provider(
    base_url: &str,
    api_key: &str,
    payload: &RegisterUserRequest,
) -> AppResult<Uuid> {
    let response = reqwest::Client::new()
        .post(format!("{}/auth/v1/signup", base_url))
        .header("apikey", api_key)
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    if !response.status().is_success() {
        // The provider rejects duplicate emails and weak passwords.
        return Err(AppError::Validation(format!(
            "identity provider rejected the signup ({})",
            response.status()
        )));
    }

    let body = response
        .json::<AuthProviderResponse>()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;
    Ok(body.id)
}

// --- Uploads ---

/// get_presigned_url
///
/// [Authenticated Route] A 10-minute upload URL for a post image. The returned key goes into
/// the post's `image` field.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "Not an image content type")
    )
)]
pub async fn get_presigned_url(
    AuthUser { .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    if !payload.file_type.starts_with("image/") {
        return Err(AppError::Validation(
            "only image uploads are accepted".to_string(),
        ));
    }

    let object_key = image_object_key(&payload.filename);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(AppError::Upstream)?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

// --- Static Pages ---

/// about_page
///
/// [Public Route] What this site is.
#[utoipa::path(
    get,
    path = "/pages/about",
    responses((status = 200, description = "About", body = StaticPage))
)]
pub async fn about_page() -> Json<StaticPage> {
    Json(StaticPage {
        slug: "about".to_string(),
        title: "About".to_string(),
        body: "Blogicum is a place to write about your days: publish posts, schedule them \
               for later, file them under categories and discuss them in the comments."
            .to_string(),
    })
}

/// rules_page
///
/// [Public Route] House rules.
#[utoipa::path(
    get,
    path = "/pages/rules",
    responses((status = 200, description = "Rules", body = StaticPage))
)]
pub async fn rules_page() -> Json<StaticPage> {
    Json(StaticPage {
        slug: "rules".to_string(),
        title: "Rules".to_string(),
        body: "Be kind to other authors. Post only content you have the right to publish. \
               Posts and comments that break these rules are removed."
            .to_string(),
    })
}
