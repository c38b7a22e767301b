//! Which posts a viewer may see.
//!
//! A non-author sees a post only when it is published, its publication date has been
//! reached, and it is filed under a published category. Authors always see their own posts.
//! Location publication never hides a post.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{auth::Viewer, models::PostView};

/// VisibilityFilter
///
/// The visibility rule bound to one viewer and one instant. It renders either as a row
/// predicate (`matches`) or as a SQL fragment pushed into the bulk listing query (`push_sql`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityFilter {
    /// The viewer granted the author bypass, if authenticated.
    pub viewer: Option<Uuid>,
    pub now: DateTime<Utc>,
}

impl VisibilityFilter {
    pub fn new(viewer: &Viewer, now: DateTime<Utc>) -> Self {
        Self {
            viewer: viewer.id(),
            now,
        }
    }

    /// Binds the filter to the current time.
    pub fn for_viewer(viewer: &Viewer) -> Self {
        Self::new(viewer, Utc::now())
    }

    pub fn matches(&self, post: &PostView) -> bool {
        if self.viewer == Some(post.author.id) {
            return true;
        }

        post.is_published
            && post.pub_date <= self.now
            && post
                .category
                .as_ref()
                .is_some_and(|category| category.is_published)
    }

    /// Appends ` AND (<rule>)` to a query selecting from `posts p` LEFT JOIN `categories c`.
    pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" AND (");
        if let Some(viewer_id) = self.viewer {
            builder.push("p.author_id = ");
            builder.push_bind(viewer_id);
            builder.push(" OR ");
        }
        builder.push("(p.is_published = TRUE AND p.pub_date <= ");
        builder.push_bind(self.now);
        // A NULL category fails the comparison, which excludes uncategorised posts.
        builder.push(" AND c.is_published = TRUE))");
    }
}

/// is_visible
///
/// Whether `post` appears in listings and detail views for `viewer` right now.
pub fn is_visible(post: &PostView, viewer: &Viewer) -> bool {
    VisibilityFilter::for_viewer(viewer).matches(post)
}

/// Same as `is_visible`, evaluated at `now`.
pub fn is_visible_at(post: &PostView, viewer: &Viewer, now: DateTime<Utc>) -> bool {
    VisibilityFilter::new(viewer, now).matches(post)
}
