//! Authorization Guard.
//!
//! One stateless check per mutating operation, taking the current viewer and the target
//! record. Every call re-derives the answer from the viewer's identity.
//!
//! Refusals differ per operation: editing someone else's post or profile soft-redirects to
//! its public view, while deleting a post and editing or deleting a comment are `Forbidden`.

use crate::{
    auth::Viewer,
    models::{Comment, Post, User},
};

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Skip the mutation and send the viewer to this path instead.
    SoftRedirect(String),
    Forbidden,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    fn allow_if(condition: bool, otherwise: Decision) -> Decision {
        if condition { Decision::Allowed } else { otherwise }
    }
}

pub fn post_detail_path(post_id: i64) -> String {
    format!("/posts/{}", post_id)
}

pub fn profile_path(username: &str) -> String {
    format!("/profile/{}", username)
}

/// Any authenticated viewer may write a post. The author is set from the viewer by the caller.
pub fn post_create(viewer: &Viewer) -> Decision {
    Decision::allow_if(viewer.is_authenticated(), Decision::Forbidden)
}

/// Only the author may edit; anyone else, anonymous included, is sent back to the post.
pub fn post_update(viewer: &Viewer, post: &Post) -> Decision {
    Decision::allow_if(
        viewer.is(post.author_id),
        Decision::SoftRedirect(post_detail_path(post.id)),
    )
}

pub fn post_delete(viewer: &Viewer, post: &Post) -> Decision {
    Decision::allow_if(viewer.is(post.author_id), Decision::Forbidden)
}

/// Any authenticated viewer may comment on any existing post, visible to them or not.
pub fn comment_create(viewer: &Viewer) -> Decision {
    Decision::allow_if(viewer.is_authenticated(), Decision::Forbidden)
}

pub fn comment_update(viewer: &Viewer, comment: &Comment) -> Decision {
    Decision::allow_if(viewer.is(comment.author_id), Decision::Forbidden)
}

pub fn comment_delete(viewer: &Viewer, comment: &Comment) -> Decision {
    Decision::allow_if(viewer.is(comment.author_id), Decision::Forbidden)
}

/// Profiles are matched by username.
pub fn profile_update(viewer: &Viewer, target: &User) -> Decision {
    Decision::allow_if(
        viewer.username() == Some(target.username.as_str()),
        Decision::SoftRedirect(profile_path(&target.username)),
    )
}
