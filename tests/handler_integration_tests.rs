use assert_matches::assert_matches;
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use blogicum::{
    AppError, AppState, InMemoryRepository, Viewer,
    auth::AuthUser,
    config::{AppConfig, Env},
    handlers::{self, PageQuery},
    models::{
        Category, CreateCommentRequest, CreatePostRequest, Post, RegisterUserRequest,
        UpdateCommentRequest, UpdatePostRequest, UpdateProfileRequest, User,
    },
    repository::Repository,
    storage::MockStorageService,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Harness ---

struct Harness {
    repo: Arc<InMemoryRepository>,
    state: AppState,
    alice: User,
    bob: User,
    travel: Category,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    async fn with_config(config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let alice = repo.create_user(user("alice")).await.unwrap();
        let bob = repo.create_user(user("bob")).await.unwrap();
        let travel = repo.insert_category("Travel", "travel", true).await;

        let state = AppState {
            repo: repo.clone(),
            storage: Arc::new(MockStorageService::new()),
            config,
        };

        Self {
            repo,
            state,
            alice,
            bob,
            travel,
        }
    }

    fn alice(&self) -> Viewer {
        viewer(&self.alice)
    }

    fn bob(&self) -> Viewer {
        viewer(&self.bob)
    }

    fn post_request(&self, title: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            text: "Some text".to_string(),
            pub_date: Utc::now() - Duration::hours(1),
            is_published: true,
            category_id: self.travel.id,
            ..Default::default()
        }
    }

    /// Alice's published post, created through the handler.
    async fn alices_post(&self) -> Post {
        let (_, Json(post)) = handlers::create_post(
            self.alice(),
            State(self.state.clone()),
            Json(self.post_request("Alice's trip")),
        )
        .await
        .unwrap();
        post
    }
}

fn user(username: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        ..Default::default()
    }
}

fn viewer(user: &User) -> Viewer {
    Viewer::User(AuthUser {
        id: user.id,
        username: user.username.clone(),
    })
}

fn location_of(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

// --- Posts ---

#[tokio::test]
async fn test_create_post_sets_viewer_as_author() {
    let h = Harness::new().await;

    let (status, Json(post)) = handlers::create_post(
        h.bob(),
        State(h.state.clone()),
        Json(h.post_request("Bob's post")),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post.author_id, h.bob.id);
    assert_eq!(post.category_id, Some(h.travel.id));
}

#[tokio::test]
async fn test_create_post_anonymous_forbidden() {
    let h = Harness::new().await;

    let result = handlers::create_post(
        Viewer::Anonymous,
        State(h.state.clone()),
        Json(h.post_request("Nope")),
    )
    .await;
    assert_matches!(result, Err(AppError::Forbidden));
}

#[tokio::test]
async fn test_create_post_validates_title() {
    let h = Harness::new().await;

    let empty = handlers::create_post(h.alice(), State(h.state.clone()), Json(h.post_request("  ")))
        .await;
    assert_matches!(empty, Err(AppError::Validation(_)));

    let long_title = "x".repeat(257);
    let long = handlers::create_post(
        h.alice(),
        State(h.state.clone()),
        Json(h.post_request(&long_title)),
    )
    .await;
    assert_matches!(long, Err(AppError::Validation(_)));
}

#[tokio::test]
async fn test_create_post_with_unknown_category_is_rejected() {
    let h = Harness::new().await;
    let request = CreatePostRequest {
        category_id: 9999,
        ..h.post_request("Lost")
    };

    let result = handlers::create_post(h.alice(), State(h.state.clone()), Json(request)).await;
    assert_matches!(result, Err(AppError::Validation(_)));
}

#[tokio::test]
async fn test_update_post_by_non_author_redirects_and_changes_nothing() {
    let h = Harness::new().await;
    let post = h.alices_post().await;

    for intruder in [h.bob(), Viewer::Anonymous] {
        let response = handlers::update_post(
            intruder,
            State(h.state.clone()),
            Path(post.id),
            Json(UpdatePostRequest {
                title: Some("Hijacked".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location_of(&response), Some(format!("/posts/{}", post.id).as_str()));
    }

    let stored = h.repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Alice's trip");
}

#[tokio::test]
async fn test_update_post_by_author_applies_changes() {
    let h = Harness::new().await;
    let post = h.alices_post().await;

    let response = handlers::update_post(
        h.alice(),
        State(h.state.clone()),
        Path(post.id),
        Json(UpdatePostRequest {
            title: Some("Edited".to_string()),
            is_published: Some(false),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = h.repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Edited");
    assert!(!stored.is_published);
    assert_eq!(stored.text, "Some text");
}

#[tokio::test]
async fn test_update_post_null_clears_image_and_location() {
    let h = Harness::new().await;
    let harbour = h.repo.insert_location("Harbour", true).await;
    let (_, Json(post)) = handlers::create_post(
        h.alice(),
        State(h.state.clone()),
        Json(CreatePostRequest {
            image: Some("posts_images/a.jpg".to_string()),
            location_id: Some(harbour.id),
            ..h.post_request("With extras")
        }),
    )
    .await
    .unwrap();

    // Absent fields keep their stored values.
    let keep: UpdatePostRequest =
        serde_json::from_value(serde_json::json!({ "title": "Renamed" })).unwrap();
    handlers::update_post(h.alice(), State(h.state.clone()), Path(post.id), Json(keep))
        .await
        .unwrap();
    let stored = h.repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Renamed");
    assert_eq!(stored.image.as_deref(), Some("posts_images/a.jpg"));
    assert_eq!(stored.location_id, Some(harbour.id));

    // Explicit nulls clear them.
    let clear: UpdatePostRequest =
        serde_json::from_value(serde_json::json!({ "image": null, "location_id": null }))
            .unwrap();
    let response =
        handlers::update_post(h.alice(), State(h.state.clone()), Path(post.id), Json(clear))
            .await
            .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = h.repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.image, None);
    assert_eq!(stored.location_id, None);
    assert_eq!(stored.title, "Renamed");
    assert_eq!(stored.category_id, Some(h.travel.id));
}

#[tokio::test]
async fn test_update_missing_post_is_not_found() {
    let h = Harness::new().await;
    let result = handlers::update_post(
        h.alice(),
        State(h.state.clone()),
        Path(404),
        Json(UpdatePostRequest::default()),
    )
    .await;
    assert_matches!(result, Err(AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_delete_post_by_non_author_forbidden() {
    let h = Harness::new().await;
    let post = h.alices_post().await;

    let result = handlers::delete_post(h.bob(), State(h.state.clone()), Path(post.id)).await;
    assert_matches!(result, Err(AppError::Forbidden));
    assert!(h.repo.get_post(post.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_post_by_author_removes_comments() {
    let h = Harness::new().await;
    let post = h.alices_post().await;
    h.repo
        .add_comment(post.id, h.bob.id, "Nice".to_string())
        .await
        .unwrap();

    let status = handlers::delete_post(h.alice(), State(h.state.clone()), Path(post.id))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(h.repo.get_post(post.id).await.unwrap().is_none());
    assert!(h.repo.list_comments(post.id).await.unwrap().is_empty());
}

// --- Detail & Listings ---

#[tokio::test]
async fn test_post_detail_lists_comments_oldest_first() {
    let h = Harness::new().await;
    let post = h.alices_post().await;
    for text in ["first", "second"] {
        h.repo
            .add_comment(post.id, h.bob.id, text.to_string())
            .await
            .unwrap();
    }

    let Json(detail) =
        handlers::get_post_detail(Viewer::Anonymous, State(h.state.clone()), Path(post.id))
            .await
            .unwrap();

    assert_eq!(detail.post.id, post.id);
    assert_eq!(detail.post.comment_count, 2);
    let texts: Vec<&str> = detail.comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(detail.comments[0].author_username.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_post_detail_of_draft_only_for_author() {
    let h = Harness::new().await;
    let request = CreatePostRequest {
        is_published: false,
        ..h.post_request("Draft")
    };
    let (_, Json(post)) = handlers::create_post(h.alice(), State(h.state.clone()), Json(request))
        .await
        .unwrap();

    let as_bob = handlers::get_post_detail(h.bob(), State(h.state.clone()), Path(post.id)).await;
    assert_matches!(as_bob, Err(AppError::NotFound { .. }));

    let as_alice = handlers::get_post_detail(h.alice(), State(h.state.clone()), Path(post.id)).await;
    assert!(as_alice.is_ok());
}

#[tokio::test]
async fn test_index_page_query() {
    let h = Harness::new().await;
    h.alices_post().await;

    let Json(page) = handlers::get_index(
        Viewer::Anonymous,
        State(h.state.clone()),
        PageQuery::default(),
    )
    .await
    .unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.posts.len(), 1);

    let beyond = handlers::get_index(
        Viewer::Anonymous,
        State(h.state.clone()),
        PageQuery { page: Some(2) },
    )
    .await;
    assert_matches!(beyond, Err(AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_category_page_for_unpublished_category_is_not_found() {
    let h = Harness::new().await;
    h.alices_post().await;
    h.repo.set_category_published(h.travel.id, false).await;

    let result = handlers::get_category_posts(
        h.alice(),
        State(h.state.clone()),
        Path("travel".to_string()),
        PageQuery::default(),
    )
    .await;
    assert_matches!(result, Err(AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_profile_page_returns_profile_and_posts() {
    let h = Harness::new().await;
    h.alices_post().await;

    let Json(profile) = handlers::get_profile(
        Viewer::Anonymous,
        State(h.state.clone()),
        Path("alice".to_string()),
        PageQuery::default(),
    )
    .await
    .unwrap();

    assert_eq!(profile.profile.id, h.alice.id);
    assert_eq!(profile.page.total_items, 1);
}

// --- Comments ---

#[tokio::test]
async fn test_comment_on_invisible_post_is_accepted() {
    let h = Harness::new().await;
    let request = CreatePostRequest {
        is_published: false,
        ..h.post_request("Hidden")
    };
    let (_, Json(post)) = handlers::create_post(h.alice(), State(h.state.clone()), Json(request))
        .await
        .unwrap();

    let (status, Json(comment)) = handlers::add_comment(
        h.bob(),
        State(h.state.clone()),
        Path(post.id),
        Json(CreateCommentRequest {
            text: "Found it".to_string(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment.author_id, h.bob.id);
    assert_eq!(comment.post_id, post.id);
}

#[tokio::test]
async fn test_comment_on_missing_post_is_not_found() {
    let h = Harness::new().await;
    let result = handlers::add_comment(
        h.bob(),
        State(h.state.clone()),
        Path(12345),
        Json(CreateCommentRequest {
            text: "Hello?".to_string(),
        }),
    )
    .await;
    assert_matches!(result, Err(AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_empty_comment_is_rejected() {
    let h = Harness::new().await;
    let post = h.alices_post().await;
    let result = handlers::add_comment(
        h.bob(),
        State(h.state.clone()),
        Path(post.id),
        Json(CreateCommentRequest {
            text: "   ".to_string(),
        }),
    )
    .await;
    assert_matches!(result, Err(AppError::Validation(_)));
}

#[tokio::test]
async fn test_comment_edit_and_delete_by_other_user_forbidden() {
    let h = Harness::new().await;
    let post = h.alices_post().await;
    let comment = h
        .repo
        .add_comment(post.id, h.bob.id, "Bob's words".to_string())
        .await
        .unwrap();

    // Even the post's author may not touch Bob's comment.
    let edit = handlers::update_comment(
        h.alice(),
        State(h.state.clone()),
        Path((post.id, comment.id)),
        Json(UpdateCommentRequest {
            text: "Alice's words".to_string(),
        }),
    )
    .await;
    assert_matches!(edit, Err(AppError::Forbidden));

    let delete = handlers::delete_comment(
        h.alice(),
        State(h.state.clone()),
        Path((post.id, comment.id)),
    )
    .await;
    assert_matches!(delete, Err(AppError::Forbidden));

    let stored = h.repo.get_comment(post.id, comment.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "Bob's words");
}

#[tokio::test]
async fn test_comment_edit_and_delete_by_author() {
    let h = Harness::new().await;
    let post = h.alices_post().await;
    let comment = h
        .repo
        .add_comment(post.id, h.bob.id, "typo".to_string())
        .await
        .unwrap();

    let Json(edited) = handlers::update_comment(
        h.bob(),
        State(h.state.clone()),
        Path((post.id, comment.id)),
        Json(UpdateCommentRequest {
            text: "fixed".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(edited.text, "fixed");

    let status = handlers::delete_comment(h.bob(), State(h.state.clone()), Path((post.id, comment.id)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(h.repo.get_comment(post.id, comment.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_comment_under_wrong_post_is_not_found() {
    let h = Harness::new().await;
    let post = h.alices_post().await;
    let other = h.alices_post().await;
    let comment = h
        .repo
        .add_comment(post.id, h.bob.id, "here".to_string())
        .await
        .unwrap();

    let result = handlers::delete_comment(
        h.bob(),
        State(h.state.clone()),
        Path((other.id, comment.id)),
    )
    .await;
    assert_matches!(result, Err(AppError::NotFound { .. }));
}

// --- Profiles ---

#[tokio::test]
async fn test_update_profile_by_other_user_redirects() {
    let h = Harness::new().await;

    let response = handlers::update_profile(
        h.bob(),
        State(h.state.clone()),
        Path("alice".to_string()),
        Json(UpdateProfileRequest {
            first_name: Some("Mallory".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location_of(&response), Some("/profile/alice"));
    let stored = h.repo.get_user(h.alice.id).await.unwrap().unwrap();
    assert_eq!(stored.first_name, "");
}

#[tokio::test]
async fn test_update_own_profile() {
    let h = Harness::new().await;

    let response = handlers::update_profile(
        h.alice(),
        State(h.state.clone()),
        Path("alice".to_string()),
        Json(UpdateProfileRequest {
            first_name: Some("Alice".to_string()),
            last_name: Some("Liddell".to_string()),
            email: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = h.repo.get_user(h.alice.id).await.unwrap().unwrap();
    assert_eq!(stored.first_name, "Alice");
    assert_eq!(stored.last_name, "Liddell");
    assert_eq!(stored.email, "alice@example.com");
}

#[tokio::test]
async fn test_get_me_returns_own_profile() {
    let h = Harness::new().await;
    let Json(me) = handlers::get_me(
        AuthUser {
            id: h.bob.id,
            username: "bob".to_string(),
        },
        State(h.state.clone()),
    )
    .await
    .unwrap();
    assert_eq!(me.username, "bob");
}

// --- Registration ---

fn registration(username: &str) -> RegisterUserRequest {
    RegisterUserRequest {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: "hunter22".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_register_user_locally() {
    let h = Harness::new().await;

    let (status, Json(user)) =
        handlers::register_user(State(h.state.clone()), Json(registration("carol")))
            .await
            .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user.username, "carol");
    assert!(
        h.repo
            .get_user_by_username("carol")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let h = Harness::new().await;
    let result = handlers::register_user(State(h.state.clone()), Json(registration("alice"))).await;
    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn test_register_rejects_invalid_username() {
    let h = Harness::new().await;
    for username in ["", "with space", "slash/name"] {
        let result =
            handlers::register_user(State(h.state.clone()), Json(registration(username))).await;
        assert_matches!(result, Err(AppError::Validation(_)));
    }
}

#[tokio::test]
async fn test_register_without_provider_in_production_fails() {
    let h = Harness::with_config(AppConfig {
        env: Env::Production,
        ..Default::default()
    })
    .await;

    let result = handlers::register_user(State(h.state.clone()), Json(registration("dave"))).await;
    assert_matches!(result, Err(AppError::Upstream(_)));
}

// --- Static pages & reference data ---

#[tokio::test]
async fn test_static_pages() {
    let Json(about) = handlers::about_page().await;
    let Json(rules) = handlers::rules_page().await;
    assert_eq!(about.slug, "about");
    assert_eq!(rules.slug, "rules");
    assert!(!rules.body.is_empty());
}

#[tokio::test]
async fn test_reference_lists_only_published_entries() {
    let h = Harness::new().await;
    h.repo.insert_category("Drafts", "drafts", false).await;
    h.repo.insert_location("Paris", true).await;
    h.repo.insert_location("Atlantis", false).await;

    let Json(categories) = handlers::get_categories(State(h.state.clone())).await.unwrap();
    let Json(locations) = handlers::get_locations(State(h.state.clone())).await.unwrap();

    let slugs: Vec<&str> = categories.iter().map(|c| c.slug.as_str()).collect();
    assert_eq!(slugs, vec!["travel"]);
    let names: Vec<&str> = locations.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Paris"]);
}
