use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{RepoResult, Repository};
use crate::{
    listing::{PostQuery, Scope},
    models::{
        Category, Comment, CreatePostRequest, Location, Post, PostRow, PostView,
        UpdatePostRequest, UpdateProfileRequest, User,
    },
};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, created_at";
const POST_COLUMNS: &str =
    "id, title, text, pub_date, is_published, image, author_id, location_id, category_id, created_at";

/// Joined listing source. Comments are LEFT JOINed and counted per post with GROUP BY.
const POST_VIEW_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.is_published, p.image, p.created_at,
        u.id AS author_id, u.username AS author_username,
        c.id AS category_id, c.title AS category_title, c.slug AS category_slug,
        c.is_published AS category_is_published,
        l.id AS location_id, l.name AS location_name, l.is_published AS location_is_published,
        COUNT(cm.id) AS comment_count
    FROM posts p
    JOIN profiles u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
    LEFT JOIN comments cm ON cm.post_id = p.id
    WHERE TRUE"#;

const POST_COUNT_SELECT: &str = r#"
    SELECT COUNT(*)
    FROM posts p
    JOIN profiles u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    WHERE TRUE"#;

/// Comments joined with their author's username.
const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, c.text, c.created_at, u.username AS author_username
    FROM comments c
    JOIN profiles u ON u.id = c.author_id"#;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. All dynamic queries go through `QueryBuilder` with
/// bound parameters.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the scope's row selector and the visibility rule.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &PostQuery) {
    match &query.scope {
        Scope::All => {}
        Scope::ByCategory(slug) => {
            builder.push(" AND c.slug = ");
            builder.push_bind(slug.clone());
        }
        Scope::ByAuthor(username) => {
            builder.push(" AND u.username = ");
            builder.push_bind(username.clone());
        }
        Scope::ById(id) => {
            builder.push(" AND p.id = ");
            builder.push_bind(*id);
        }
    }
    query.visibility.push_sql(builder);
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM profiles WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM profiles WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO profiles (id, username, email, first_name, last_name, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(user.username)
            .bind(user.email)
            .bind(user.first_name)
            .bind(user.last_name)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE profiles \
             SET first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 email = COALESCE($4, email) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(req.first_name)
            .bind(req.last_name)
            .bind(req.email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, title, description, slug, is_published, created_at \
             FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, title, description, slug, is_published, created_at \
             FROM categories WHERE is_published = TRUE ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_locations(&self) -> RepoResult<Vec<Location>> {
        Ok(sqlx::query_as::<_, Location>(
            "SELECT id, name, is_published, created_at \
             FROM locations WHERE is_published = TRUE ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// query_posts
    ///
    /// One round trip: eager joins, visibility pushed into WHERE, aggregate comment count,
    /// deterministic order, optional LIMIT/OFFSET.
    async fn query_posts(&self, query: &PostQuery) -> RepoResult<Vec<PostView>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_VIEW_SELECT);
        push_filters(&mut builder, query);
        builder.push(" GROUP BY p.id, u.id, c.id, l.id ORDER BY p.pub_date DESC, p.id DESC");

        if let Some(window) = query.window {
            builder.push(" LIMIT ");
            builder.push_bind(window.limit);
            builder.push(" OFFSET ");
            builder.push_bind(window.offset);
        }

        let rows = builder
            .build_query_as::<PostRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PostView::from).collect())
    }

    async fn count_posts(&self, query: &PostQuery) -> RepoResult<i64> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_COUNT_SELECT);
        push_filters(&mut builder, query);

        Ok(builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> RepoResult<Post> {
        let sql = format!(
            "INSERT INTO posts \
                (title, text, pub_date, is_published, image, author_id, location_id, category_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) RETURNING {POST_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(req.title)
            .bind(req.text)
            .bind(req.pub_date)
            .bind(req.is_published)
            .bind(req.image)
            .bind(author_id)
            .bind(req.location_id)
            .bind(req.category_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>> {
        let sql = format!(
            "UPDATE posts \
             SET title = COALESCE($2, title), \
                 text = COALESCE($3, text), \
                 pub_date = COALESCE($4, pub_date), \
                 is_published = COALESCE($5, is_published), \
                 category_id = COALESCE($6, category_id), \
                 image = CASE WHEN $7 THEN $8 ELSE image END, \
                 location_id = CASE WHEN $9 THEN $10 ELSE location_id END \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        // Clearable columns bind a "present" flag alongside the (possibly NULL) value.
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.text)
            .bind(req.pub_date)
            .bind(req.is_published)
            .bind(req.category_id)
            .bind(req.image.is_some())
            .bind(req.image.flatten())
            .bind(req.location_id.is_some())
            .bind(req.location_id.flatten())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        let sql = format!("{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id ASC");
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_comment(&self, post_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        let sql = format!("{COMMENT_SELECT} WHERE c.post_id = $1 AND c.id = $2");
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// add_comment
    ///
    /// Inserts and joins the author's username in one statement.
    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Comment> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, text, created_at)
                VALUES ($1, $2, $3, NOW())
                RETURNING id, post_id, author_id, text, created_at
            )
            SELECT i.id, i.post_id, i.author_id, i.text, i.created_at, u.username AS author_username
            FROM inserted i JOIN profiles u ON u.id = i.author_id
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments SET text = $2 WHERE id = $1
                RETURNING id, post_id, author_id, text, created_at
            )
            SELECT d.id, d.post_id, d.author_id, d.text, d.created_at, u.username AS author_username
            FROM updated d JOIN profiles u ON u.id = d.author_id
            "#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
