// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use model::*;
pub use pg::PgStore;

mod memory;
mod model;
mod pg;
#[cfg(test)]
mod testing;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

pub(crate) const DUPLICATE_USERNAME: &str = "Username is already taken";
pub(crate) const DUPLICATE_EMAIL: &str = "Email already registered";
pub(crate) const DUPLICATE_FOLLOW: &str = "You are already following this author";
pub(crate) const DUPLICATE_LIKE: &str = "You have already liked this post";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Persistence for every entity of the blog. Each method is one logical operation: a method that
/// touches a relation and the counter derived from it applies both or neither.
#[async_trait]
pub trait BlogStore: Send + Sync + 'static {
    /// Fails with [StoreError::Conflict] when the username or email is taken.
    async fn insert_user(&self, user: User) -> Result<User>;

    async fn user(&self, id: Uuid) -> Result<Option<User>>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// The user holding an unexpired password reset token with this hash.
    async fn user_by_reset_token(&self, hash: &str, now: DateTime<Utc>) -> Result<Option<User>>;

    /// The user holding an unexpired verification token with this hash.
    async fn user_by_verify_token(&self, hash: &str, now: DateTime<Utc>)
        -> Result<Option<User>>;

    /// Writes only the columns set in `patch` and returns the account as stored afterwards.
    /// Fails with [StoreError::Conflict] when a new username is taken.
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User>;

    /// Newest accounts first.
    async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<User>>;

    /// Case-insensitive substring match on username or email.
    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<User>>;

    /// Active accounts with the most followers.
    async fn popular_authors(&self, limit: i64) -> Result<Vec<User>>;

    /// Removes the account with everything it owns: its posts (and their comments, likes and
    /// resources), its own comments, likes, follows in both directions and resources. Counters
    /// of posts it liked and authors it followed are decremented.
    async fn delete_user(&self, id: Uuid) -> Result<AccountCascade>;

    async fn insert_post(&self, post: Post) -> Result<Post>;

    async fn post(&self, id: Uuid) -> Result<Option<Post>>;

    /// Writes only the columns set in `patch` and returns the post as stored afterwards.
    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<Post>;

    /// Newest first. Unpublished posts are included only when `include_drafts` is set.
    async fn posts_by_author(
        &self,
        author: Uuid,
        include_drafts: bool,
        limit: i64,
    ) -> Result<Vec<Post>>;

    async fn count_posts_by_author(&self, author: Uuid, include_drafts: bool) -> Result<i64>;

    /// Published posts of active authors, most liked first.
    async fn trending_posts(&self, limit: i64) -> Result<Vec<Post>>;

    /// Published posts written by any of `authors`, newest first.
    async fn published_posts_by_authors(&self, authors: &[Uuid], limit: i64) -> Result<Vec<Post>>;

    /// Published posts of active authors whose title or one of whose tags contains `query`,
    /// ignoring case. Newest first.
    async fn search_posts(&self, query: &str, skip: i64, limit: i64) -> Result<Vec<Post>>;

    /// Removes the post with its comments, likes and attached resources.
    async fn delete_post(&self, id: Uuid) -> Result<PostCascade>;

    /// Fails with [StoreError::NotFound] when the post does not exist.
    async fn insert_comment(&self, comment: Comment) -> Result<Comment>;

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>>;

    async fn update_comment(&self, comment: &Comment) -> Result<Comment>;

    async fn delete_comment(&self, id: Uuid) -> Result<()>;

    /// Oldest first.
    async fn comments_for_post(&self, blog: Uuid) -> Result<Vec<CommentThread>>;

    /// Records the relation and increments the author's follower counter.
    async fn follow(&self, follow: Follow) -> Result<Follow>;

    async fn follow_by_id(&self, id: Uuid) -> Result<Option<Follow>>;

    async fn follow_between(&self, follower: Uuid, author: Uuid) -> Result<Option<Follow>>;

    /// Removes the relation and decrements the author's follower counter.
    async fn unfollow(&self, id: Uuid) -> Result<()>;

    /// Newest followers first.
    async fn followers(&self, author: Uuid, skip: i64, limit: i64) -> Result<Vec<FollowerEntry>>;

    /// Records the like and returns the post's new like count.
    async fn like(&self, like: Like) -> Result<i64>;

    /// Removes the like and returns the post's new like count.
    async fn unlike(&self, user: Uuid, blog: Uuid) -> Result<i64>;

    async fn has_liked(&self, user: Uuid, blog: Uuid) -> Result<bool>;

    async fn insert_resource(&self, resource: Resource) -> Result<Resource>;

    async fn resource(&self, id: Uuid) -> Result<Option<Resource>>;

    async fn delete_resource(&self, id: Uuid) -> Result<()>;
}

/// Escapes `%`, `_` and `\` so `query` only ever matches literally inside a LIKE pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
