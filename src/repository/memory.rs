//! In-memory Entity Store.
//!
//! Mirrors the Postgres schema rules (unique usernames and slugs, foreign keys, cascades and
//! SET NULL on delete) so that handler and listing behavior can be exercised without a
//! database. Data is lost when the process exits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RepoError, RepoResult, Repository};
use crate::{
    listing::{PostQuery, Scope},
    models::{
        AuthorSummary, Category, CategorySummary, Comment, CreatePostRequest, Location,
        LocationSummary, Post, PostView, UpdatePostRequest, UpdateProfileRequest, User,
    },
};

#[derive(Default)]
struct Store {
    users: BTreeMap<Uuid, User>,
    categories: BTreeMap<i64, Category>,
    locations: BTreeMap<i64, Location>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    last_id: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn check_post_refs(
        &self,
        category_id: Option<i64>,
        location_id: Option<i64>,
    ) -> RepoResult<()> {
        if let Some(id) = category_id {
            if !self.categories.contains_key(&id) {
                return Err(RepoError::Constraint(format!("unknown category {id}")));
            }
        }
        if let Some(id) = location_id {
            if !self.locations.contains_key(&id) {
                return Err(RepoError::Constraint(format!("unknown location {id}")));
            }
        }
        Ok(())
    }

    fn with_username(&self, mut comment: Comment) -> Comment {
        comment.author_username = self
            .users
            .get(&comment.author_id)
            .map(|user| user.username.clone());
        comment
    }

    /// Joins a post with its author, category and location and counts its comments.
    fn view(&self, post: &Post) -> Option<PostView> {
        let author = self.users.get(&post.author_id)?;
        let category = post
            .category_id
            .and_then(|id| self.categories.get(&id))
            .map(|c| CategorySummary {
                id: c.id,
                title: c.title.clone(),
                slug: c.slug.clone(),
                is_published: c.is_published,
            });
        let location = post
            .location_id
            .and_then(|id| self.locations.get(&id))
            .map(|l| LocationSummary {
                id: l.id,
                name: l.name.clone(),
                is_published: l.is_published,
            });
        let comment_count = self
            .comments
            .values()
            .filter(|comment| comment.post_id == post.id)
            .count() as i64;

        Some(PostView {
            id: post.id,
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date,
            is_published: post.is_published,
            image: post.image.clone(),
            created_at: post.created_at,
            author: AuthorSummary {
                id: author.id,
                username: author.username.clone(),
            },
            category,
            location,
            comment_count,
        })
    }

    /// Every post selected by the query, ordered, before windowing.
    fn select(&self, query: &PostQuery) -> Vec<PostView> {
        let mut views: Vec<PostView> = self
            .posts
            .values()
            .filter_map(|post| self.view(post))
            .filter(|view| match &query.scope {
                Scope::All => true,
                Scope::ByCategory(slug) => view
                    .category
                    .as_ref()
                    .is_some_and(|category| &category.slug == slug),
                Scope::ByAuthor(username) => &view.author.username == username,
                Scope::ById(id) => view.id == *id,
            })
            .filter(|view| query.visibility.matches(view))
            .collect();

        views.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        views
    }
}

/// InMemoryRepository
///
/// `Repository` over process memory, guarded by an async `RwLock`.
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store::default()),
        }
    }

    pub async fn insert_category(&self, title: &str, slug: &str, is_published: bool) -> Category {
        let mut store = self.store.write().await;
        let category = Category {
            id: store.next_id(),
            title: title.to_string(),
            description: String::new(),
            slug: slug.to_string(),
            is_published,
            created_at: Utc::now(),
        };
        store.categories.insert(category.id, category.clone());
        category
    }

    pub async fn insert_location(&self, name: &str, is_published: bool) -> Location {
        let mut store = self.store.write().await;
        let location = Location {
            id: store.next_id(),
            name: name.to_string(),
            is_published,
            created_at: Utc::now(),
        };
        store.locations.insert(location.id, location.clone());
        location
    }

    pub async fn set_category_published(&self, id: i64, is_published: bool) {
        if let Some(category) = self.store.write().await.categories.get_mut(&id) {
            category.is_published = is_published;
        }
    }

    /// Deletes a user together with their posts and comments (and the comments on those posts).
    pub async fn delete_user(&self, id: Uuid) -> bool {
        let mut store = self.store.write().await;
        if store.users.remove(&id).is_none() {
            return false;
        }
        store.posts.retain(|_, post| post.author_id != id);
        let Store {
            posts, comments, ..
        } = &mut *store;
        comments.retain(|_, comment| comment.author_id != id && posts.contains_key(&comment.post_id));
        true
    }

    /// Deletes a category; its posts stay, uncategorised.
    pub async fn delete_category(&self, id: i64) -> bool {
        let mut store = self.store.write().await;
        if store.categories.remove(&id).is_none() {
            return false;
        }
        for post in store.posts.values_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
            }
        }
        true
    }

    /// Deletes a location; its posts stay, without a location.
    pub async fn delete_location(&self, id: i64) -> bool {
        let mut store = self.store.write().await;
        if store.locations.remove(&id).is_none() {
            return false;
        }
        for post in store.posts.values_mut() {
            if post.location_id == Some(id) {
                post.location_id = None;
            }
        }
        true
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .store
            .read()
            .await
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, mut user: User) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if store.users.contains_key(&user.id) {
            return Err(RepoError::Conflict("profiles_pkey".to_string()));
        }
        if store.users.values().any(|u| u.username == user.username) {
            return Err(RepoError::Conflict("profiles_username_key".to_string()));
        }
        user.created_at = Utc::now();
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = req.email {
            user.email = email;
        }
        Ok(Some(user.clone()))
    }

    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>> {
        Ok(self
            .store
            .read()
            .await
            .categories
            .values()
            .find(|category| category.slug == slug)
            .cloned())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let store = self.store.read().await;
        let mut categories: Vec<Category> = store
            .categories
            .values()
            .filter(|category| category.is_published)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn list_locations(&self) -> RepoResult<Vec<Location>> {
        let store = self.store.read().await;
        let mut locations: Vec<Location> = store
            .locations
            .values()
            .filter(|location| location.is_published)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn query_posts(&self, query: &PostQuery) -> RepoResult<Vec<PostView>> {
        let views = self.store.read().await.select(query);
        Ok(match query.window {
            Some(window) => views
                .into_iter()
                .skip(window.offset.max(0) as usize)
                .take(window.limit.max(0) as usize)
                .collect(),
            None => views,
        })
    }

    async fn count_posts(&self, query: &PostQuery) -> RepoResult<i64> {
        Ok(self.store.read().await.select(query).len() as i64)
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        Ok(self.store.read().await.posts.get(&id).cloned())
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> RepoResult<Post> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(&author_id) {
            return Err(RepoError::Constraint(format!("unknown author {author_id}")));
        }
        store.check_post_refs(Some(req.category_id), req.location_id)?;

        let post = Post {
            id: store.next_id(),
            title: req.title,
            text: req.text,
            pub_date: req.pub_date,
            is_published: req.is_published,
            image: req.image,
            author_id,
            location_id: req.location_id,
            category_id: Some(req.category_id),
            created_at: Utc::now(),
        };
        store.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>> {
        let mut store = self.store.write().await;
        store.check_post_refs(req.category_id, req.location_id.flatten())?;

        let Some(post) = store.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            post.title = title;
        }
        if let Some(text) = req.text {
            post.text = text;
        }
        if let Some(pub_date) = req.pub_date {
            post.pub_date = pub_date;
        }
        if let Some(is_published) = req.is_published {
            post.is_published = is_published;
        }
        if let Some(image) = req.image {
            post.image = image;
        }
        if let Some(location_id) = req.location_id {
            post.location_id = location_id;
        }
        if req.category_id.is_some() {
            post.category_id = req.category_id;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.posts.remove(&id).is_none() {
            return Ok(false);
        }
        store.comments.retain(|_, comment| comment.post_id != id);
        Ok(true)
    }

    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        let store = self.store.read().await;
        let mut comments: Vec<Comment> = store
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| store.with_username(comment.clone()))
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn get_comment(&self, post_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        let store = self.store.read().await;
        Ok(store
            .comments
            .get(&comment_id)
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| store.with_username(comment.clone())))
    }

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Comment> {
        let mut store = self.store.write().await;
        if !store.posts.contains_key(&post_id) {
            return Err(RepoError::Constraint(format!("unknown post {post_id}")));
        }
        if !store.users.contains_key(&author_id) {
            return Err(RepoError::Constraint(format!("unknown author {author_id}")));
        }

        let comment = Comment {
            id: store.next_id(),
            post_id,
            author_id,
            text,
            created_at: Utc::now(),
            author_username: None,
        };
        store.comments.insert(comment.id, comment.clone());
        Ok(store.with_username(comment))
    }

    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>> {
        let mut store = self.store.write().await;
        let Some(comment) = store.comments.get_mut(&id) else {
            return Ok(None);
        };
        comment.text = text;
        let updated = comment.clone();
        Ok(Some(store.with_username(updated)))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        Ok(self.store.write().await.comments.remove(&id).is_some())
    }
}
